use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "credir";
pub const DEFAULT_DATABASE_PATH: &str = "users_database.yml";
/// Environment prefix: `CREDIR_DATABASE__PATH`, `CREDIR_LOGGING__LEVEL`, ...
pub const ENV_PREFIX: &str = "CREDIR";

/// Credential file settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Accept `$plaintext$` and `$base64$` digests.
    pub allow_plaintext: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    /// Loads defaults, then the config file, then `CREDIR_*` environment
    /// variables. An explicit `file` must exist; the default one is optional.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("database.path", DEFAULT_DATABASE_PATH)?
            .set_default("database.allow_plaintext", true)?;

        let builder = match file {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let cfg = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        cfg.try_deserialize()
    }

    /// Existence check only; the content is validated by the first load.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.database.path.is_file() {
            return Err(ConfigError::Message(format!(
                "credential file {} does not exist",
                self.database.path.display()
            )));
        }
        Ok(())
    }
}
