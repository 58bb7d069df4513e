//! Process configuration, assembled from environment variables once at
//! startup, each with a hard-coded fallback.

use std::env;

/// Reads `key` from the environment, falling back to `default` if unset or
/// empty.
fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).ok().filter(|value| !value.is_empty()).unwrap_or_else(|| default.to_string())
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub storage_path: String,
    pub tenant: String,
    pub domain: String,
    pub username: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            database_path: env_or_default("DATABASE_PATH", "./swift.db"),
            storage_path: env_or_default("STORAGE_PATH", "./storage"),
            tenant: env_or_default("SWIFT_STORAGE_TENANT", "test"),
            domain: env_or_default("SWIFT_STORAGE_DOMAIN", "Default"),
            username: env_or_default("SWIFT_STORAGE_USERNAME", "tester"),
            password: env_or_default("SWIFT_STORAGE_PASSWORD", "testing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_default_falls_back_when_unset() {
        env::remove_var("SWIFTLITE_TEST_VAR_UNSET");
        assert_eq!(env_or_default("SWIFTLITE_TEST_VAR_UNSET", "fallback"), "fallback");
    }

    #[test]
    fn env_or_default_uses_set_value() {
        env::set_var("SWIFTLITE_TEST_VAR_SET", "explicit");
        assert_eq!(env_or_default("SWIFTLITE_TEST_VAR_SET", "fallback"), "explicit");
        env::remove_var("SWIFTLITE_TEST_VAR_SET");
    }
}
