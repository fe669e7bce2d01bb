use std::fmt;

/// Status codes attached to every credir error.
///
/// # Ranges:
/// - 1xxx: General errors
/// - 2xxx: Credential file content
/// - 3xxx: Authentication and lookups
/// - 6xxx: I/O and file watching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 1xxx: General errors ===
    Internal = 1003,
    NotImplemented = 1005,

    // === 2xxx: Data errors ===
    MalformedInput = 2010,

    // === 3xxx: Authentication ===
    UserNotFound = 3004,
    InvalidCredentials = 3006,
    GroupNotFound = 3010,
    UnsupportedDigest = 3011,
    DigestMatchFailed = 3012,

    // === 6xxx: IO ===
    Io = 6000,
    WatchFailed = 6010,
}

/// Severity an error is logged at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Lookup misses and rejected passwords are routine; a broken file or
    /// watch needs an operator.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::UserNotFound | Self::GroupNotFound => LogLevel::Debug,
            Self::InvalidCredentials => LogLevel::Info,
            Self::MalformedInput | Self::Io | Self::NotImplemented | Self::UnsupportedDigest => {
                LogLevel::Warn
            }
            Self::Internal | Self::WatchFailed | Self::DigestMatchFailed => LogLevel::Error,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_fall_in_their_ranges() {
        assert_eq!(StatusCode::MalformedInput.code(), 2010);
        assert!((3000..4000).contains(&StatusCode::UnsupportedDigest.code()));
        assert!((6000..7000).contains(&StatusCode::WatchFailed.code()));
    }

    #[test]
    fn test_log_level_mappings() {
        assert_eq!(StatusCode::UserNotFound.log_level(), LogLevel::Debug);
        assert_eq!(StatusCode::InvalidCredentials.log_level(), LogLevel::Info);
        assert_eq!(StatusCode::MalformedInput.log_level(), LogLevel::Warn);
        assert_eq!(StatusCode::WatchFailed.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_display_contains_name_and_code() {
        let s = StatusCode::MalformedInput.to_string();
        assert!(s.contains("2010"), "got: {s}");
        assert!(s.contains("MalformedInput"), "got: {s}");
    }
}
