use tracing_appender::non_blocking::WorkerGuard;

/// Keeps the logging pipeline alive.
///
/// Dropping the handle flushes and stops the background file writer, so it
/// must live until the process is done logging.
#[derive(Debug)]
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self { file_guard }
    }

    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Flushes pending file output.
    pub fn shutdown(mut self) {
        if let Some(guard) = self.file_guard.take() {
            tracing::info!("Flushing log file");
            drop(guard);
        }
    }
}
