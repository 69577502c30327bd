//! Logging initialization using the `tracing` ecosystem.
//!
//! Console output is always on. When a log directory is configured, a second
//! layer writes daily-rotated files through a non-blocking writer so that a
//! slow disk never stalls the WebSocket reader. `RUST_LOG` overrides the
//! configured level.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Options for [`init_logging`].
#[derive(Debug, Clone)]
pub struct LogOptions<'a> {
    /// Default level if `RUST_LOG` is not set (e.g. `"info"`).
    pub level: &'a str,
    /// Optional directory for daily-rotating log files.
    pub dir: Option<&'a str>,
    /// Log file prefix (e.g. `"fillwatch"`).
    pub file_prefix: &'a str,
    /// Emit one JSON object per line instead of human-readable text.
    pub json: bool,
}

/// Initialize the global tracing subscriber.
///
/// Must be called once at program start. The returned guard flushes the file
/// writer on drop and has to be kept alive for the lifetime of the process.
pub fn init_logging(opts: &LogOptions<'_>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(opts.level));

    let console_layer = if opts.json {
        fmt::layer().json().with_target(true).with_thread_ids(true).boxed()
    } else {
        fmt::layer().with_target(true).with_thread_ids(true).with_ansi(true).boxed()
    };

    let Some(dir) = opts.dir else {
        tracing_subscriber::registry().with(env_filter).with(console_layer).init();
        return None;
    };

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, opts.file_prefix));
    let file_layer = if opts.json {
        fmt::layer().json().with_writer(writer).with_target(true).boxed()
    } else {
        fmt::layer().with_writer(writer).with_ansi(false).with_target(true).with_thread_ids(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();
    Some(guard)
}
