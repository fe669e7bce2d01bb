//! File-watch facility and the background reload loop.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use credir_error::DirectoryError;
use notify::{
    event::{AccessKind, AccessMode, ModifyKind},
    Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use tokio::{
    runtime::Handle,
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        Notify,
    },
    task::JoinHandle,
};
use tracing::{debug, info, trace, warn};

use super::store::DirectoryStore;

/// Normalized kind of a file-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Write,
    Create,
    Remove,
    Rename,
    Other,
}

/// Which platform notification marks a finished write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteSignal {
    /// Only the close of a file opened for writing. inotify reports it once
    /// per save, after the data is complete.
    CloseWrite,
    /// Every data modification. For watchers without close events.
    Modify,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub paths: Vec<PathBuf>,
}

/// Change and error streams produced by an established watch.
#[derive(Debug)]
pub struct WatchStreams {
    pub events: UnboundedReceiver<WatchEvent>,
    pub errors: UnboundedReceiver<DirectoryError>,
}

/// A file-watch facility.
///
/// `watch` establishes the watch and hands out the event streams; `close`
/// releases the underlying resource. Both streams end once the source is
/// closed or dropped.
pub trait WatchSource: Send {
    fn watch(
        &mut self,
        path: &Path,
    ) -> Result<WatchStreams, DirectoryError>;

    fn close(&mut self) -> Result<(), DirectoryError>;
}

/// [`WatchSource`] backed by the platform watcher from `notify`.
#[derive(Debug)]
pub struct NotifyWatcher {
    inner: Option<RecommendedWatcher>,
    watched: Option<PathBuf>,
    signal: WriteSignal,
}

/// [`WatchSource`] fed by hand through a [`WatchFeed`].
///
/// Lets an embedding application (or a test) drive reloads from its own
/// change detection.
#[derive(Debug)]
pub struct ChannelWatch {
    streams: Option<WatchStreams>,
    closed: Arc<AtomicBool>,
}

/// Sending half of a [`ChannelWatch`].
#[derive(Debug, Clone)]
pub struct WatchFeed {
    events: UnboundedSender<WatchEvent>,
    errors: UnboundedSender<DirectoryError>,
    closed: Arc<AtomicBool>,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl WatchEvent {
    pub fn new(
        kind: WatchEventKind,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            kind,
            paths: vec![path.into()],
        }
    }

    pub fn is_write(&self) -> bool {
        self.kind == WatchEventKind::Write
    }
}

impl WatchEventKind {
    fn from_notify(
        kind: &EventKind,
        signal: WriteSignal,
    ) -> Self {
        match kind {
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => Self::Write,
            EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => match signal {
                WriteSignal::Modify => Self::Write,
                // The close that ends this write triggers the reload
                WriteSignal::CloseWrite => Self::Other,
            },
            EventKind::Modify(ModifyKind::Name(_)) => Self::Rename,
            EventKind::Create(_) => Self::Create,
            EventKind::Remove(_) => Self::Remove,
            _ => Self::Other,
        }
    }
}

impl WriteSignal {
    /// `CloseWrite` where the recommended watcher is inotify.
    pub fn platform() -> Self {
        if cfg!(any(target_os = "linux", target_os = "android")) {
            Self::CloseWrite
        } else {
            Self::Modify
        }
    }
}

impl NotifyWatcher {
    pub fn new() -> Self {
        Self::with_write_signal(WriteSignal::platform())
    }

    pub fn with_write_signal(signal: WriteSignal) -> Self {
        Self {
            inner: None,
            watched: None,
            signal,
        }
    }
}

impl ChannelWatch {
    pub fn new() -> (Self, WatchFeed) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let source = Self {
            streams: Some(WatchStreams {
                events: events_rx,
                errors: errors_rx,
            }),
            closed: Arc::clone(&closed),
        };
        let feed = WatchFeed {
            events: events_tx,
            errors: errors_tx,
            closed,
        };
        (source, feed)
    }
}

impl WatchFeed {
    /// Queues a write event for `path`. Returns `false` once nobody listens.
    pub fn write(
        &self,
        path: impl Into<PathBuf>,
    ) -> bool {
        self.send(WatchEvent::new(WatchEventKind::Write, path))
    }

    pub fn send(
        &self,
        event: WatchEvent,
    ) -> bool {
        self.events.send(event).is_ok()
    }

    /// Queues an error event.
    pub fn error(
        &self,
        reason: impl Into<String>,
    ) -> bool {
        self.errors
            .send(DirectoryError::Watch {
                reason: reason.into(),
            })
            .is_ok()
    }

    /// Whether the owning source has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Trait implementations
////////////////////////////////////////////////////////////////////////////////

impl Default for NotifyWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchSource for NotifyWatcher {
    fn watch(
        &mut self,
        path: &Path,
    ) -> Result<WatchStreams, DirectoryError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let signal = self.signal;

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    let kind = WatchEventKind::from_notify(&event.kind, signal);
                    // Unbounded channel: never blocks the notify thread
                    let _ = events_tx.send(WatchEvent {
                        kind,
                        paths: event.paths,
                    });
                }
                Err(e) => {
                    let _ = errors_tx.send(DirectoryError::Watch {
                        reason: e.to_string(),
                    });
                }
            },
            Config::default(),
        )
        .map_err(|e| DirectoryError::Watch {
            reason: format!("failed to create file watcher: {e}"),
        })?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| DirectoryError::Watch {
                reason: format!("failed to watch {}: {e}", path.display()),
            })?;

        debug!(path = %path.display(), signal = ?self.signal, "File watch established");
        self.inner = Some(watcher);
        self.watched = Some(path.to_path_buf());

        Ok(WatchStreams {
            events: events_rx,
            errors: errors_rx,
        })
    }

    fn close(&mut self) -> Result<(), DirectoryError> {
        let Some(mut watcher) = self.inner.take() else {
            return Ok(());
        };
        let result = match self.watched.take() {
            Some(path) => watcher.unwatch(&path).map_err(|e| DirectoryError::Watch {
                reason: format!("failed to unwatch {}: {e}", path.display()),
            }),
            None => Ok(()),
        };
        // Dropping the watcher drops the senders and ends both streams
        drop(watcher);
        result
    }
}

impl WatchSource for ChannelWatch {
    fn watch(
        &mut self,
        _path: &Path,
    ) -> Result<WatchStreams, DirectoryError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DirectoryError::Watch {
                reason: "watch source already closed".into(),
            });
        }
        self.streams.take().ok_or_else(|| DirectoryError::Watch {
            reason: "watch source already in use".into(),
        })
    }

    fn close(&mut self) -> Result<(), DirectoryError> {
        self.streams = None;
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// External functions
////////////////////////////////////////////////////////////////////////////////

/// Spawns the background loop that turns write events into reloads.
///
/// The loop exits when `shutdown` is notified or when either stream ends.
/// Error events are reported and do not stop the loop.
pub fn spawn_watch_task(
    runtime: &Handle,
    store: Arc<DirectoryStore>,
    mut streams: WatchStreams,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = shutdown.notified() => {
                    info!("Stop watching credential file");
                    break;
                }

                event = streams.events.recv() => match event {
                    Some(event) if event.is_write() => {
                        info!(path = %store.path().display(), "Got update event for credential file");
                        store.refresh().await;
                    }
                    Some(event) => {
                        trace!(kind = ?event.kind, "Ignoring file watch event");
                    }
                    None => {
                        debug!("File watch event stream closed");
                        break;
                    }
                },

                error = streams.errors.recv() => match error {
                    Some(error) => {
                        warn!(%error, "Error during file watching");
                        store.report(&error);
                    }
                    None => {
                        debug!("File watch error stream closed");
                        break;
                    }
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_kind_mapping() {
        use notify::event::{CreateKind, MetadataKind, RemoveKind, RenameMode};

        for signal in [WriteSignal::CloseWrite, WriteSignal::Modify] {
            let map = |kind: EventKind| WatchEventKind::from_notify(&kind, signal);
            assert_eq!(
                map(EventKind::Access(AccessKind::Close(AccessMode::Write))),
                WatchEventKind::Write
            );
            assert_eq!(
                map(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))),
                WatchEventKind::Other
            );
            assert_eq!(
                map(EventKind::Modify(ModifyKind::Name(RenameMode::From))),
                WatchEventKind::Rename
            );
            assert_eq!(map(EventKind::Create(CreateKind::File)), WatchEventKind::Create);
            assert_eq!(map(EventKind::Remove(RemoveKind::File)), WatchEventKind::Remove);
        }
    }

    #[test]
    fn test_one_reload_per_save_with_close_write() {
        use notify::event::DataChange;

        // inotify sequence for a single save: modify, then close
        let save = [
            EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            EventKind::Access(AccessKind::Close(AccessMode::Write)),
        ];
        let writes = |signal| {
            save.iter()
                .filter(|kind| WatchEventKind::from_notify(kind, signal) == WatchEventKind::Write)
                .count()
        };
        assert_eq!(writes(WriteSignal::CloseWrite), 1);
        assert_eq!(writes(WriteSignal::Modify), 3);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_inotify_reloads_on_close_write() {
        assert_eq!(WriteSignal::platform(), WriteSignal::CloseWrite);
    }

    #[test]
    fn test_channel_watch_hands_out_streams_once() {
        let (mut source, _feed) = ChannelWatch::new();
        assert!(source.watch(Path::new("/tmp/users.yml")).is_ok());
        assert!(matches!(
            source.watch(Path::new("/tmp/users.yml")),
            Err(DirectoryError::Watch { .. })
        ));
    }

    #[tokio::test]
    async fn test_channel_watch_feed_delivers_events() {
        let (mut source, feed) = ChannelWatch::new();
        let mut streams = source.watch(Path::new("users.yml")).unwrap();

        assert!(feed.write("users.yml"));
        assert!(feed.error("queue overflow"));

        let event = streams.events.recv().await.unwrap();
        assert!(event.is_write());
        assert_eq!(event.paths, vec![PathBuf::from("users.yml")]);

        let error = streams.errors.recv().await.unwrap();
        assert_eq!(
            error,
            DirectoryError::Watch {
                reason: "queue overflow".into()
            }
        );
    }

    #[test]
    fn test_channel_watch_close_is_visible_to_feed() {
        let (mut source, feed) = ChannelWatch::new();
        assert!(!feed.is_closed());
        source.close().unwrap();
        assert!(feed.is_closed());
        assert!(source.watch(Path::new("users.yml")).is_err());
    }

    #[test]
    fn test_notify_watcher_rejects_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = NotifyWatcher::new();
        let err = watcher.watch(&dir.path().join("missing.yml")).unwrap_err();
        assert!(matches!(err, DirectoryError::Watch { .. }));
        // Closing a watcher that never started is a no-op
        assert!(watcher.close().is_ok());
    }
}
