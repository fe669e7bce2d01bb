use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Errors raised while loading, watching or querying the directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The credential file is structurally invalid or misses a mandatory field.
    #[error("Malformed credential file: {reason}")]
    MalformedInput { reason: String },
    /// Lookup miss on a user name.
    #[error("User not found: {username}")]
    UserNotFound { username: String },
    /// Lookup miss on a group name.
    #[error("Group not found: {group}")]
    GroupNotFound { group: String },
    /// The credential file could not be read.
    #[error("Failed to read {path}: {reason}")]
    Io { path: String, reason: String },
    /// The file-watch facility failed or reported an error event.
    #[error("File watch error: {reason}")]
    Watch { reason: String },
    /// Operation permanently unsupported by a read-only file backend.
    #[error("Not implemented: {operation}")]
    NotImplemented { operation: String },
    /// No async runtime to host the background watch task.
    #[error("No tokio runtime available for the watch task")]
    RuntimeUnavailable,
}

impl DirectoryError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            reason: reason.into(),
        }
    }

    /// `true` for lookup misses, which are structured absences rather than
    /// failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UserNotFound { .. } | Self::GroupNotFound { .. })
    }
}

impl ErrorExt for DirectoryError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedInput { .. } => StatusCode::MalformedInput,
            Self::UserNotFound { .. } => StatusCode::UserNotFound,
            Self::GroupNotFound { .. } => StatusCode::GroupNotFound,
            Self::Io { .. } => StatusCode::Io,
            Self::Watch { .. } => StatusCode::WatchFailed,
            Self::NotImplemented { .. } => StatusCode::NotImplemented,
            Self::RuntimeUnavailable => StatusCode::Internal,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            // File paths and parser details stay in the logs
            Self::MalformedInput { .. } | Self::Io { .. } | Self::Watch { .. } => {
                "Directory unavailable".to_string()
            }
            Self::RuntimeUnavailable => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(DirectoryError::UserNotFound {
            username: "felix".into()
        }
        .is_not_found());
        assert!(DirectoryError::GroupNotFound {
            group: "files".into()
        }
        .is_not_found());
        assert!(!DirectoryError::malformed("bad yaml").is_not_found());
    }

    #[test]
    fn test_client_message_hides_paths() {
        let err = DirectoryError::Io {
            path: "/secret/users.yml".into(),
            reason: "permission denied".into(),
        };
        assert_eq!(err.status_code(), StatusCode::Io);
        assert!(!err.client_message().contains("/secret"));
    }
}
