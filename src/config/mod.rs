pub mod settings;

pub use settings::{DatabaseConfig, Settings, DEFAULT_CONFIG_FILE, DEFAULT_DATABASE_PATH};
