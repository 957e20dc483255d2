use std::env;
use std::fmt::Display;
use std::str::FromStr;

use tracing::warn;

pub const DEFAULT_DB_URL: &str = "sqlite:compagnon.sqlite3";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

/// Where the server listens and which database it opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub db_url: String,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `COMPAGNON_DB_URL`, `COMPAGNON_HOST` and
    /// `COMPAGNON_PORT`. Unparsable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            db_url: load("COMPAGNON_DB_URL", defaults.db_url),
            host: load("COMPAGNON_HOST", defaults.host),
            port: load("COMPAGNON_PORT", defaults.port),
        }
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn load<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().unwrap_or_else(|err| {
            warn!(key, value = raw, error = %err, "invalid environment value, using default");
            default
        }),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_to_loopback() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.db_url, DEFAULT_DB_URL);
    }

    #[test]
    fn load_falls_back_on_missing_variable() {
        let port: u16 = load("COMPAGNON_TEST_UNSET_PORT", 9000);
        assert_eq!(port, 9000);
    }
}
