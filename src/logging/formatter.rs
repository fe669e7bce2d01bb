use std::{
    io::{self, Stdout},
    path::Path,
};

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::Layer,
    registry::LookupSpan,
};

use super::config::{LogFormat, LoggingConfig};

/// Console layer in the configured format, boxed so the three formats share
/// one type.
pub fn console_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let writer: fn() -> Stdout = io::stdout;

    match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(writer)
            .with_ansi(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .event_format(fmt::format().pretty())
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(writer)
            .with_ansi(config.with_ansi)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .event_format(fmt::format().compact())
            .with_writer(writer)
            .with_ansi(config.with_ansi)
            .with_target(true)
            .boxed(),
    }
}

/// Daily-rolling, non-blocking file layer. The guard must outlive logging.
pub fn file_layer<S>(
    directory: &Path,
    file_name: &str,
) -> (Box<dyn Layer<S> + Send + Sync>, WorkerGuard)
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let appender = rolling::daily(directory, file_name);
    let (writer, guard) = non_blocking(appender);

    let layer = fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .boxed();
    (layer, guard)
}

#[cfg(test)]
mod tests {
    use tracing::info;
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;

    #[test]
    fn test_console_layer_for_every_format() {
        for format in [LogFormat::Pretty, LogFormat::Compact, LogFormat::Json] {
            let cfg = LoggingConfig {
                format,
                with_ansi: false,
                ..Default::default()
            };
            let subscriber = Registry::default().with(console_layer(&cfg));
            tracing::subscriber::with_default(subscriber, || {
                info!(%format, "console layer smoke test");
            });
        }
    }

    #[test]
    fn test_file_layer_writes_events() {
        let dir = tempfile::tempdir().unwrap();
        let (layer, guard) = file_layer(dir.path(), "credir.log");

        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            info!(users = 2, "Credential directory loaded");
        });
        // Dropping the guard flushes the background writer
        drop(guard);

        let contents: String = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
            .collect();
        assert!(contents.contains("Credential directory loaded"));
        assert!(contents.contains("users=2"));
    }
}
