//! Entry point used by the directory-protocol layer.
//!
//! [`DirectoryBackend`] composes the [`DirectoryStore`] with the
//! [`CredentialVerifier`] and owns the lifecycle of the background watch
//! task. Lookups are synchronous and may be called from any number of
//! threads; reloads happen on the watch task.

use std::{
    fmt,
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use credir_error::{CredentialError, CredirResult, DirectoryError, ResultExt};
use parking_lot::Mutex;
use tokio::{runtime::Handle, sync::Notify, task::JoinHandle};
use tracing::{debug, error, info, warn};

use super::{options::BackendOptions, result_code::ResultCode};
use crate::{
    auth::CredentialVerifier,
    directory::{spawn_watch_task, DirectoryStore, Group, PosixAccount, Snapshot, User, WatchSource},
};

/// Read-only directory backend over a hot-reloaded credential file.
pub struct DirectoryBackend {
    store: Arc<DirectoryStore>,
    verifier: CredentialVerifier,
    shutdown: Arc<Notify>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
    counters: BackendCounters,
}

#[derive(Debug, Default)]
struct BackendCounters {
    binds: AtomicU64,
    failed_binds: AtomicU64,
    closes: AtomicU64,
}

/// Operation counters of one backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendStats {
    pub binds: u64,
    pub failed_binds: u64,
    pub closes: u64,
    pub reloads: u64,
    pub failed_reloads: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl DirectoryBackend {
    /// Loads the credential file, establishes the watch and spawns the
    /// reload task on the current tokio runtime.
    ///
    /// Fails without leaving anything running when there is no runtime,
    /// when the first load fails, or when the watch cannot be established.
    pub fn start(
        options: BackendOptions,
        watch: Box<dyn WatchSource>,
    ) -> CredirResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|_| DirectoryError::RuntimeUnavailable)
            .context("Cannot start directory backend")?;

        let store = DirectoryStore::open(options.database_path.clone(), options.reporter)
            .context("Initial load of the credential file failed")?;
        let store = Arc::new(store);

        let streams = store.install_watch(watch).with_context(|| {
            format!(
                "Failed to watch credential file {}",
                options.database_path.display()
            )
        })?;

        let shutdown = Arc::new(Notify::new());
        let task = spawn_watch_task(
            &runtime,
            Arc::clone(&store),
            streams,
            Arc::clone(&shutdown),
        );

        let verifier = CredentialVerifier::with_defaults(options.allow_plaintext);
        info!(
            path = %store.path().display(),
            schemes = ?verifier.scheme_names(),
            "Directory backend started"
        );

        Ok(Self {
            store,
            verifier,
            shutdown,
            watch_task: Mutex::new(Some(task)),
            stopped: AtomicBool::new(false),
            counters: BackendCounters::default(),
        })
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Live snapshot. Holding it pins a consistent view across several
    /// lookups.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.current()
    }

    pub fn resolve_user(
        &self,
        username: &str,
    ) -> Result<User, DirectoryError> {
        debug!(username, "Trying to find user");
        self.store
            .current()
            .user(username)
            .cloned()
            .ok_or_else(|| {
                debug!(username, "User does not exist");
                DirectoryError::UserNotFound {
                    username: username.to_string(),
                }
            })
    }

    pub fn resolve_group(
        &self,
        name: &str,
    ) -> Result<Arc<Group>, DirectoryError> {
        debug!(group = name, "Trying to find group");
        self.store
            .current()
            .group(name)
            .cloned()
            .ok_or_else(|| DirectoryError::GroupNotFound {
                group: name.to_string(),
            })
    }

    /// `Ok(())` when `password` matches the stored digest of `username`.
    pub fn verify_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(), CredentialError> {
        let snapshot = self.store.current();
        self.check_password(&snapshot, username, password)
            .map(|_| ())
    }

    /// Simple bind. `bind_dn` is either a bare user name or a DN whose first
    /// RDN is `cn=` or `uid=`.
    pub fn bind(
        &self,
        bind_dn: &str,
        password: &str,
    ) -> ResultCode {
        self.counters.binds.fetch_add(1, Ordering::Relaxed);
        debug!(bind_dn, "Binding user");

        let username = bind_name(bind_dn);
        let snapshot = self.store.current();
        let code = match self.check_password(&snapshot, username, password) {
            Ok(user) if user.disabled => {
                debug!(username, "Bind refused for disabled account");
                ResultCode::InvalidCredentials
            }
            Ok(_) => ResultCode::Success,
            Err(e) if e.is_rejection() => {
                debug!(username, reason = %e, "Bind rejected");
                ResultCode::InvalidCredentials
            }
            Err(e) => {
                error!(bind_dn, error = %e, "Binding user failed");
                ResultCode::OperationsError
            }
        };

        if !code.is_success() {
            self.counters.failed_binds.fetch_add(1, Ordering::Relaxed);
        }
        debug!(bind_dn, result = %code, "Bind finished");
        code
    }

    /// Connection close notification from the protocol layer.
    pub fn close(
        &self,
        bound_dn: &str,
    ) {
        self.counters.closes.fetch_add(1, Ordering::Relaxed);
        debug!(bound_dn, "Connection closed");
    }

    pub fn add(
        &self,
        bound_dn: &str,
        entry_dn: &str,
    ) -> ResultCode {
        deny_write("add", bound_dn, entry_dn)
    }

    pub fn modify(
        &self,
        bound_dn: &str,
        entry_dn: &str,
    ) -> ResultCode {
        deny_write("modify", bound_dn, entry_dn)
    }

    pub fn delete(
        &self,
        bound_dn: &str,
        entry_dn: &str,
    ) -> ResultCode {
        deny_write("delete", bound_dn, entry_dn)
    }

    pub fn find_posix_accounts(
        &self,
        hierarchy: &str,
    ) -> Result<Vec<PosixAccount>, DirectoryError> {
        Err(not_implemented("find_posix_accounts", hierarchy))
    }

    pub fn find_posix_groups(
        &self,
        hierarchy: &str,
    ) -> Result<Vec<Arc<Group>>, DirectoryError> {
        Err(not_implemented("find_posix_groups", hierarchy))
    }

    pub fn stats(&self) -> BackendStats {
        let reload = self.store.stats();
        BackendStats {
            binds: self.counters.binds.load(Ordering::Relaxed),
            failed_binds: self.counters.failed_binds.load(Ordering::Relaxed),
            closes: self.counters.closes.load(Ordering::Relaxed),
            reloads: reload.reloads,
            failed_reloads: reload.failed_reloads,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    /// Stops the watch task and releases the watch resource.
    ///
    /// Only the first call does anything. Lookups keep answering from the
    /// last snapshot afterwards.
    pub fn shutdown(&self) -> Result<(), DirectoryError> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!(path = %self.store.path().display(), "Shutting down directory backend");

        // notify_one keeps a permit if the task is not parked in select! yet
        self.shutdown.notify_one();
        self.store.close_watch().map(|_| ())
    }

    /// Waits for the watch task to exit. Call after [`shutdown`](Self::shutdown).
    pub async fn wait_for_shutdown(&self) {
        let task = self.watch_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Watch task terminated abnormally");
            }
        }
    }

    fn check_password<'a>(
        &self,
        snapshot: &'a Snapshot,
        username: &str,
        password: &str,
    ) -> Result<&'a User, CredentialError> {
        let user = snapshot
            .user(username)
            .ok_or_else(|| CredentialError::UserDoesNotExist {
                username: username.to_string(),
            })?;

        if self.verifier.verify(&user.password, password)? {
            Ok(user)
        } else {
            Err(CredentialError::InvalidPassword {
                username: username.to_string(),
            })
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Trait implementations
////////////////////////////////////////////////////////////////////////////////

impl Drop for DirectoryBackend {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "Failed to release file watch on drop");
        }
    }
}

impl fmt::Debug for DirectoryBackend {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("DirectoryBackend")
            .field("store", &self.store)
            .field("verifier", &self.verifier)
            .field("running", &self.is_running())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Internal functions
////////////////////////////////////////////////////////////////////////////////

/// Extracts the account name from a bind DN.
fn bind_name(bind_dn: &str) -> &str {
    let first_rdn = bind_dn.split(',').next().unwrap_or_default().trim();
    match first_rdn.split_once('=') {
        Some((attr, value))
            if attr.trim().eq_ignore_ascii_case("cn") || attr.trim().eq_ignore_ascii_case("uid") =>
        {
            value.trim()
        }
        _ => first_rdn,
    }
}

fn deny_write(
    operation: &'static str,
    bound_dn: &str,
    entry_dn: &str,
) -> ResultCode {
    debug!(operation, bound_dn, entry_dn, "Write refused on read-only directory");
    ResultCode::InsufficientAccessRights
}

fn not_implemented(
    operation: &'static str,
    hierarchy: &str,
) -> DirectoryError {
    warn!(operation, hierarchy, "Unimplemented function called");
    DirectoryError::NotImplemented {
        operation: operation.to_string(),
    }
}
