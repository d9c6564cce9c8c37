use crate::config::Config;
use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt::Layer, prelude::*, EnvFilter, Registry};

/// Installs the global subscriber: stdout always, plus a daily rolling file
/// when `logging.file` names a directory. `RUST_LOG` overrides the configured
/// level.
///
/// The returned guards flush buffered lines on drop and must be held for the
/// life of the process.
pub fn init_logging(config: &Config, name: &str) -> Result<Vec<WorkerGuard>> {
    let mut guards = vec![];

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let stdout_layer = Layer::new().with_writer(stdout_writer);
    guards.push(stdout_guard);

    let file_layer = match &config.logging.file {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, format!("{name}.log"));
            let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
            guards.push(file_guard);
            Some(Layer::new().with_writer(file_writer).with_ansi(false))
        }
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.effective_log_level()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = Registry::default()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("failed to set global subscriber: {e}"))?;

    Ok(guards)
}
