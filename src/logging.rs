use crate::config::LogConfig;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use std::fs::File;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub struct LogGuard {
    _guard: WorkerGuard,
}

pub fn init(config: &LogConfig) -> Result<LogGuard> {
    let path = config.log_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("failed to create log directory {}", dir.display()))?;
    }
    let file = File::create(&path)
        .wrap_err_with(|| format!("failed to create log file {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    // RUST_LOG takes precedence over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .wrap_err("failed to install log subscriber")?;

    tracing::info!("logging to {}", path.display());
    Ok(LogGuard { _guard: guard })
}
