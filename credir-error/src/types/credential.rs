use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Password verification errors.
///
/// A wrong password against a well-formed digest is `InvalidPassword`; the
/// digest-level variants mean the verification itself could not be carried
/// out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// No registered scheme can decode the stored digest.
    #[error("Unsupported digest format: {reason}")]
    UnsupportedDigestFormat { reason: String },
    /// The digest decoded but the comparison could not complete.
    #[error("Digest match failed: {reason}")]
    MatchFailure { reason: String },
    /// Verification requested for an unknown user.
    #[error("User does not exist: {username}")]
    UserDoesNotExist { username: String },
    /// Candidate password does not match the stored digest.
    #[error("Invalid password for user {username}")]
    InvalidPassword { username: String },
}

impl CredentialError {
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedDigestFormat {
            reason: reason.into(),
        }
    }

    pub fn match_failure(reason: impl Into<String>) -> Self {
        Self::MatchFailure {
            reason: reason.into(),
        }
    }

    /// `true` when the caller simply supplied bad credentials.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::UserDoesNotExist { .. } | Self::InvalidPassword { .. }
        )
    }
}

impl ErrorExt for CredentialError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedDigestFormat { .. } => StatusCode::UnsupportedDigest,
            Self::MatchFailure { .. } => StatusCode::DigestMatchFailed,
            Self::UserDoesNotExist { .. } => StatusCode::UserNotFound,
            Self::InvalidPassword { .. } => StatusCode::InvalidCredentials,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn client_message(&self) -> String {
        // Same answer for unknown user and wrong password
        match self {
            Self::UserDoesNotExist { .. } | Self::InvalidPassword { .. } => {
                "Invalid username or password".to_string()
            }
            Self::UnsupportedDigestFormat { .. } | Self::MatchFailure { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_share_client_message() {
        let missing = CredentialError::UserDoesNotExist {
            username: "mallory".into(),
        };
        let wrong = CredentialError::InvalidPassword {
            username: "felix".into(),
        };
        assert!(missing.is_rejection());
        assert!(wrong.is_rejection());
        assert_eq!(missing.client_message(), wrong.client_message());
    }

    #[test]
    fn test_digest_errors_are_not_rejections() {
        let err = CredentialError::unsupported("unknown prefix $md5$");
        assert!(!err.is_rejection());
        assert_eq!(err.status_code(), StatusCode::UnsupportedDigest);
        assert_eq!(
            CredentialError::match_failure("argon2 params").status_code(),
            StatusCode::DigestMatchFailed
        );
    }
}
