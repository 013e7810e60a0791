//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `HERALD_ENDPOINT` - chat platform WebSocket endpoint
//! - `HERALD_ACCESS_TOKEN` - bearer token for the connection
//! - `HERALD_CONFIG` - path of the configuration file

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "HERALD";

/// Apply environment variable overrides to a config.
///
/// This allows sensitive values like access tokens to be provided via
/// environment variables instead of the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(endpoint) = env::var(format!("{}_ENDPOINT", ENV_PREFIX)) {
        config.connection.endpoint = endpoint;
    }
    if let Ok(token) = env::var(format!("{}_ACCESS_TOKEN", ENV_PREFIX)) {
        config.connection.access_token = Some(token);
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `HERALD_CONFIG`, otherwise returns "herald.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "herald.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::load_config_str;

    #[test]
    fn test_env_prefix() {
        assert_eq!(ENV_PREFIX, "HERALD");
    }

    #[test]
    fn test_apply_env_overrides_no_vars() {
        env::remove_var("HERALD_ENDPOINT");
        env::remove_var("HERALD_ACCESS_TOKEN");

        let config = load_config_str(
            r#"
            connection { endpoint = "ws://localhost:6700" }
            chat { groups = [1] }
            "#,
        )
        .expect("test config should parse");
        let result = apply_env_overrides(config);

        assert_eq!(result.connection.endpoint, "ws://localhost:6700");
        assert_eq!(result.connection.access_token, None);
    }
}
