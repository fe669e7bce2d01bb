use tracing_subscriber::EnvFilter;

use super::config::LoggingConfig;

/// `RUST_LOG` wins over the configured level when it is set.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    let directive = config.build_filter_directive();

    match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => match EnvFilter::try_new(&directive) {
            Ok(filter) => filter,
            Err(e) => {
                eprintln!("Invalid log filter directive from config ('{directive}'): {e}; falling back to 'info'");
                EnvFilter::new("info")
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_env_overrides_config() {
        env::set_var("RUST_LOG", "debug");
        let filter = build_filter_from_config(&LoggingConfig::default());
        env::remove_var("RUST_LOG");
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    #[serial]
    fn test_config_directive_used_without_env() {
        env::remove_var("RUST_LOG");
        let cfg = LoggingConfig {
            level: "trace".into(),
            ..Default::default()
        };
        let filter = build_filter_from_config(&cfg);
        let rendered = filter.to_string();
        assert!(rendered.contains("credir=trace"), "got {rendered}");
    }
}
