//! Alert message formatting.
//!
//! Produces Telegram-flavoured HTML:
//!
//! ```text
//! 🟢 <b>BUY (Long)</b> | BTC
//! 👤 <code>0x1234...5678</code>
//! 💰 Price: <b>50000 $</b>
//! 📊 Size: 0.1
//! 💵 Realized PnL: 0 $
//! ```

use fw_core::{Side, TradeFill, short_address};

use crate::error::DeliveryError;

/// Telegram's hard limit on message text, in characters.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Format a fill for `user` as an HTML alert.
///
/// Fails with [`DeliveryError::MalformedFill`] when the fill is not a JSON
/// object, and with [`DeliveryError::MessageTooLong`] when the result would
/// not fit in one message.
pub fn format_fill_message(fill: &TradeFill, user: &str) -> Result<String, DeliveryError> {
    if !fill.is_object() {
        return Err(DeliveryError::MalformedFill(format!("expected a JSON object, got {}", fill.0)));
    }

    let coin = escape_html(&fill.coin());
    let header = match fill.side() {
        Side::Buy => "🟢 <b>BUY (Long)</b>".to_string(),
        Side::Sell => "🔴 <b>SELL (Short)</b>".to_string(),
        Side::Other(s) => format!("⚪ <b>{}</b>", escape_html(&s)),
    };

    let text = format!(
        "{header} | {coin}\n\
         👤 <code>{}</code>\n\
         💰 Price: <b>{} $</b>\n\
         📊 Size: {}\n\
         💵 Realized PnL: {} $",
        escape_html(&short_address(user)),
        escape_html(&fill.price()),
        escape_html(&fill.size()),
        escape_html(&fill.closed_pnl()),
    );

    let len = text.chars().count();
    if len > MAX_MESSAGE_LEN {
        return Err(DeliveryError::MessageTooLong { len, max: MAX_MESSAGE_LEN });
    }
    Ok(text)
}

/// Escape the three characters Telegram's HTML parse mode treats specially.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
