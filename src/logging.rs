//! Logging setup. Generalizes the teacher's `tracing`/`tracing-subscriber`
//! usage into an env-filter controlled console sink, plus an optional file
//! sink when `ENABLE_FILE_LOGGING` is set (spec §6).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Installs the global tracing subscriber. Safe to call once at startup.
pub fn init(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false));

    if config.enable_file_logging {
        let file_appender = tracing_appender::rolling::never(".", &config.log_file);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        registry
            .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
            .init();
        tracing::info!(file = %config.log_file, "file logging enabled");
        Some(guard)
    } else {
        registry.init();
        tracing::info!("file logging disabled, console only");
        None
    }
}
