use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use super::LoggingError;

/// Console output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Logging configuration (the `[logging]` section of the settings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// A level (`info`) or a full filter directive (`credir=debug,warn`).
    pub level: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    /// Directory of the daily-rolling log file; no file sink when unset.
    pub directory: Option<PathBuf>,
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            with_ansi: true,
            directory: None,
            file_name: "credir.log".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), LoggingError> {
        EnvFilter::try_new(self.build_filter_directive())
            .map(|_| ())
            .map_err(|e| LoggingError::InvalidLevel(format!("{}: {e}", self.level)))?;
        if self.directory.is_some() && self.file_name.trim().is_empty() {
            return Err(LoggingError::InvalidLevel(
                "file_name must not be empty when a log directory is set".into(),
            ));
        }
        Ok(())
    }

    /// A bare level applies to this crate, everything else stays at `warn`.
    pub fn build_filter_directive(&self) -> String {
        let level = self.level.trim();
        if LevelFilter::from_str(level).is_ok() {
            format!("warn,credir={level}")
        } else {
            level.to_string()
        }
    }

    pub fn ensure_log_dir(&self) -> Result<(), LoggingError> {
        if let Some(dir) = &self.directory {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(LoggingError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        let cfg = LoggingConfig::default();
        assert_eq!(cfg.build_filter_directive(), "warn,credir=info");

        let cfg = LoggingConfig {
            level: "credir::directory=trace,info".into(),
            ..Default::default()
        };
        assert_eq!(cfg.build_filter_directive(), "credir::directory=trace,info");
    }

    #[test]
    fn test_validate_rejects_bad_level() {
        let cfg = LoggingConfig {
            level: "credir=loud".into(),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(LoggingError::InvalidLevel(_))));
        assert!(LoggingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Pretty.to_string(), "pretty");
    }

    #[test]
    fn test_ensure_log_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            directory: Some(tmp.path().join("nested/logs")),
            ..Default::default()
        };
        cfg.ensure_log_dir().unwrap();
        assert!(tmp.path().join("nested/logs").is_dir());
    }
}
