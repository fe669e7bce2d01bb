use std::{fmt, path::PathBuf, sync::Arc};

use crate::{
    config::DatabaseConfig,
    directory::{ErrorReporter, TracingReporter},
};

/// Construction-time inputs of a [`DirectoryBackend`](super::DirectoryBackend).
#[derive(Clone)]
pub struct BackendOptions {
    /// Credential file to load and watch.
    pub database_path: PathBuf,
    /// Register the `$plaintext$` and `$base64$` pass-through schemes.
    pub allow_plaintext: bool,
    /// Sink for non-fatal errors (failed reloads, watch errors).
    pub reporter: Arc<dyn ErrorReporter>,
}

impl BackendOptions {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            allow_plaintext: true,
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(config.path.clone()).allow_plaintext(config.allow_plaintext)
    }

    pub fn allow_plaintext(
        mut self,
        allow: bool,
    ) -> Self {
        self.allow_plaintext = allow;
        self
    }

    pub fn with_reporter(
        mut self,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        self.reporter = reporter;
        self
    }
}

impl fmt::Debug for BackendOptions {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("BackendOptions")
            .field("database_path", &self.database_path)
            .field("allow_plaintext", &self.allow_plaintext)
            .finish_non_exhaustive()
    }
}
