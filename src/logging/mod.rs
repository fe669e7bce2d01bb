pub mod config;
mod filters;
mod formatter;
pub mod handle;

pub use config::{LogFormat, LoggingConfig};
pub use handle::LoggingHandle;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),
    #[error("Unknown log format: {0}")]
    UnknownFormat(String),
    #[error("Failed to prepare log directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Installs the global subscriber: env filter, console layer and, when a
/// directory is configured, a daily-rolling file layer.
pub fn init_logging(config: LoggingConfig) -> Result<LoggingHandle, LoggingError> {
    config.validate()?;
    config.ensure_log_dir()?;

    let env_filter = filters::build_filter_from_config(&config);
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> =
        vec![formatter::console_layer(&config)];

    let file_guard = match &config.directory {
        Some(dir) => {
            let (file_layer, guard) = formatter::file_layer(dir, &config.file_name);
            layers.push(file_layer);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.level,
        format = %config.format,
        log_dir = ?config.directory,
        "Logging system initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}
