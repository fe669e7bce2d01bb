use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use credir_error::{DirectoryError, ErrorExt, LogLevel};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::{
    model::Snapshot,
    parser::parse_snapshot,
    watch::{WatchSource, WatchStreams},
};

/// Receives non-fatal errors (failed reloads, watch errors).
pub trait ErrorReporter: Send + Sync {
    fn report(
        &self,
        error: &DirectoryError,
    );
}

/// Default reporter: logs through `tracing` at the level the error's status
/// code calls for.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

/// Owner of the live snapshot.
///
/// A single mutex guards the snapshot pointer and the installed watch
/// resource. Readers hold it only long enough to clone the `Arc`; parsing
/// happens before the lock is taken, so a reload blocks readers for the
/// pointer swap alone.
pub struct DirectoryStore {
    path: PathBuf,
    state: Mutex<StoreState>,
    reporter: Arc<dyn ErrorReporter>,
    counters: ReloadCounters,
}

struct StoreState {
    snapshot: Arc<Snapshot>,
    watch: Option<Box<dyn WatchSource>>,
}

#[derive(Debug, Default)]
struct ReloadCounters {
    reloads: AtomicU64,
    failed_reloads: AtomicU64,
}

/// Reload statistics of one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReloadStats {
    pub reloads: u64,
    pub failed_reloads: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl DirectoryStore {
    /// Loads `path` synchronously and returns a ready store.
    ///
    /// A store is never created without a successfully parsed snapshot.
    pub fn open(
        path: impl Into<PathBuf>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self, DirectoryError> {
        let path = path.into();
        let bytes = read_file(&path)?;
        let snapshot = parse_snapshot(&bytes)?;

        info!(
            path = %path.display(),
            users = snapshot.user_count(),
            groups = snapshot.group_count(),
            "Credential directory loaded"
        );

        Ok(Self {
            path,
            state: Mutex::new(StoreState {
                snapshot: Arc::new(snapshot),
                watch: None,
            }),
            reporter,
            counters: ReloadCounters::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the live snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.state.lock().snapshot)
    }

    /// Parses `bytes` and, on success, replaces the live snapshot.
    ///
    /// On failure the previous snapshot stays in place.
    pub fn reload(
        &self,
        bytes: &[u8],
    ) -> Result<(), DirectoryError> {
        let snapshot = match parse_snapshot(bytes) {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                self.counters.failed_reloads.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };
        let (users, groups) = (snapshot.user_count(), snapshot.group_count());

        let previous = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.snapshot, snapshot)
        };
        // The old snapshot is released outside the lock
        drop(previous);

        self.counters.reloads.fetch_add(1, Ordering::Relaxed);
        info!(users, groups, "Credential directory updated");
        Ok(())
    }

    /// Re-reads the credential file and reloads it.
    ///
    /// Read and parse failures are reported and leave the previous snapshot
    /// in place; the next change event is the retry.
    pub async fn refresh(&self) -> bool {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.counters.failed_reloads.fetch_add(1, Ordering::Relaxed);
                self.report(&io_error(&self.path, &e));
                return false;
            }
        };

        match self.reload(&bytes) {
            Ok(()) => true,
            Err(e) => {
                self.report(&e);
                false
            }
        }
    }

    /// Establishes a watch on the credential file and keeps the source until
    /// [`close_watch`](Self::close_watch).
    pub fn install_watch(
        &self,
        mut source: Box<dyn WatchSource>,
    ) -> Result<WatchStreams, DirectoryError> {
        let streams = source.watch(&self.path)?;
        let replaced = self.state.lock().watch.replace(source);
        if let Some(mut old) = replaced {
            if let Err(e) = old.close() {
                self.report(&e);
            }
        }
        Ok(streams)
    }

    /// Releases the watch resource. Returns `false` if none was installed.
    pub fn close_watch(&self) -> Result<bool, DirectoryError> {
        let source = self.state.lock().watch.take();
        match source {
            Some(mut source) => source.close().map(|()| true),
            None => Ok(false),
        }
    }

    pub fn is_watching(&self) -> bool {
        self.state.lock().watch.is_some()
    }

    pub fn report(
        &self,
        error: &DirectoryError,
    ) {
        self.reporter.report(error);
    }

    pub fn stats(&self) -> ReloadStats {
        ReloadStats {
            reloads: self.counters.reloads.load(Ordering::Relaxed),
            failed_reloads: self.counters.failed_reloads.load(Ordering::Relaxed),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Trait implementations
////////////////////////////////////////////////////////////////////////////////

impl ErrorReporter for TracingReporter {
    fn report(
        &self,
        err: &DirectoryError,
    ) {
        let code = err.status_code();
        match code.log_level() {
            LogLevel::Debug => debug!(%code, error = %err, "Credential directory error"),
            LogLevel::Info => info!(%code, error = %err, "Credential directory error"),
            LogLevel::Warn => warn!(%code, error = %err, "Credential directory error"),
            LogLevel::Error => error!(%code, error = %err, "Credential directory error"),
        }
    }
}

impl<F> ErrorReporter for F
where
    F: Fn(&DirectoryError) + Send + Sync,
{
    fn report(
        &self,
        error: &DirectoryError,
    ) {
        self(error)
    }
}

impl fmt::Debug for DirectoryStore {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DirectoryStore")
            .field("path", &self.path)
            .field("users", &state.snapshot.user_count())
            .field("groups", &state.snapshot.group_count())
            .field("watching", &state.watch.is_some())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Internal functions
////////////////////////////////////////////////////////////////////////////////

fn read_file(path: &Path) -> Result<Vec<u8>, DirectoryError> {
    std::fs::read(path).map_err(|e| io_error(path, &e))
}

fn io_error(
    path: &Path,
    err: &std::io::Error,
) -> DirectoryError {
    DirectoryError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
