//! # fw-runner
//!
//! Entry point for the fillwatch listener.
//!
//! Loads `.env` (if present), an optional JSON config file and environment
//! overrides, then runs the Hyperliquid fill listener until a signal arrives
//! or reconnection gives up.
//!
//! # Usage
//!
//! ```bash
//! fw-runner config.json --log-level info
//! USERS_LISTENED=0xabc,0xdef TELEGRAM_BOT_TOKEN=... TELEGRAM_CHAT_ID=... fw-runner
//! ```
//!
//! # Exit codes
//!
//! | Code | Meaning                                   |
//! |------|-------------------------------------------|
//! | 0    | stopped by signal                         |
//! | 1    | initial connect failed / reconnects exhausted |
//! | 2    | configuration error                       |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use fw_core::config::{AppConfig, TelegramConfig};
use fw_core::logging::{LogOptions, init_logging};
use fw_listener::hyperliquid::HyperliquidFeed;
use fw_listener::{Listener, ListenerExit, ListenerSettings};
use fw_notify::{LogTransport, NotificationSink, NotifyTransport, RetryPolicy, TelegramTransport};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// Hyperliquid fill listener with Telegram alerts.
#[derive(Parser, Debug)]
#[command(name = "fw-runner", about = "Hyperliquid fill listener with Telegram alerts")]
struct Cli {
    /// Configuration file path (JSON). Defaults plus environment if omitted.
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output. Overrides `service.log_path`.
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // A missing .env is normal in production.
    let dotenv = dotenvy::dotenv();

    let config = load_app_config(cli.config.as_deref());

    let defaults = AppConfig::default();
    let service = config.as_ref().map_or(&defaults.service, |c| &c.service);
    let log_dir = cli.log_dir.clone().or_else(|| service.log_path.clone());
    let guard = init_logging(&LogOptions {
        level: &cli.log_level,
        dir: log_dir.as_deref(),
        file_prefix: &service.module_name,
        json: service.log_json,
    });

    if let Ok(path) = &dotenv {
        info!("[runner] loaded environment from {}", path.display());
    }

    let config = match config {
        Ok(c) => c,
        Err(e) => {
            error!("[runner] configuration error: {e:#}");
            exit_with(ListenerExit::ConfigError, guard);
        }
    };

    let sink = match build_sink(&config.telegram) {
        Ok(s) => s,
        Err(e) => {
            error!("[runner] cannot set up notifications: {e:#}");
            exit_with(ListenerExit::ConfigError, guard);
        }
    };

    let topics = config.feed.topics();
    info!(
        "[runner] {} starting: feed={}, users={}, notifier={}",
        config.service.module_name,
        config.feed.ws_url,
        topics.len(),
        sink.transport_name()
    );

    let feed = Arc::new(HyperliquidFeed::new(&config.feed));
    let listener = Arc::new(Listener::new(feed, topics, sink, ListenerSettings::from_config(&config.listener)));

    let signal_listener = Arc::clone(&listener);
    tokio::spawn(async move {
        let state = signal_listener.state();
        tokio::select! {
            name = shutdown_signal() => {
                info!("[runner] {name} received, stopping");
                signal_listener.stop();
            }
            _ = state.stopped() => {}
        }
    });

    let exit = listener.run().await;
    info!("[runner] listener exited: {exit:?}");
    exit_with(exit, guard);
}

/// Read the config file (or start from defaults) and apply env overrides.
fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(p) => fw_core::config::load_config(p)?,
        None => AppConfig::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Telegram when credentials are present, log-only otherwise.
fn build_sink(cfg: &TelegramConfig) -> Result<Arc<NotificationSink>> {
    let transport: Arc<dyn NotifyTransport> = match TelegramTransport::from_config(cfg)? {
        Some(t) => Arc::new(t),
        None => {
            warn!("[runner] Telegram not configured, alerts will only be logged");
            Arc::new(LogTransport)
        }
    };
    Ok(Arc::new(NotificationSink::new(transport, RetryPolicy::from_config(cfg))))
}

/// Resolve on SIGINT / Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c() => "SIGINT",
                    _ = term.recv() => "SIGTERM",
                }
            }
            Err(e) => {
                warn!("[runner] cannot install SIGTERM handler: {e}");
                ctrl_c().await;
                "SIGINT"
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c().await;
        "Ctrl-C"
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("[runner] cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Flush logs and terminate the process without waiting for leftover tasks.
fn exit_with(exit: ListenerExit, guard: Option<WorkerGuard>) -> ! {
    drop(guard);
    std::process::exit(exit.exit_code())
}
