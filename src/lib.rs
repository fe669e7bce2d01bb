/// Password digests: scheme registry, verifier and Argon2id hashing.
pub mod auth;
/// Directory facade consumed by the protocol layer.
pub mod backend;
/// Settings loading (file + environment).
pub mod config;
/// Credential file model, parser, hot-reloading store and file watching.
pub mod directory;
/// Logging setup (filters, console and file sinks).
pub mod logging;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Digest verification and hashing.
pub use auth::{hash_password, CredentialVerifier, Digest, DigestScheme};
/// Backend facade and its result codes.
pub use backend::{BackendOptions, BackendStats, DirectoryBackend, ResultCode};
/// config
pub use config::{DatabaseConfig, Settings};
/// Directory data and reload machinery.
pub use directory::{
    parse_snapshot, ChannelWatch, DirectoryStore, ErrorReporter, Group, NotifyWatcher,
    PosixAccount, Snapshot, TracingReporter, User, WatchFeed, WatchSource, WriteSignal,
};
/// Error types shared with the protocol layer.
pub use credir_error::{CredentialError, CredirResult, DirectoryError, StackError, StatusCode};
/// Logging entry point.
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingHandle};
