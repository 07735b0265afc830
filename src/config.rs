use chrono::Duration;
use log::warn;
use std::env;

pub const DEFAULT_DATABASE: &str = "./clearconnect.db";
pub const DEFAULT_DEVICE_STORAGE: &str = "./device.db";
pub const DEFAULT_FUNCTIONS_URL: &str = "http://127.0.0.1:5001";
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: String,
    pub device_storage_path: String,
    pub functions_url: String,
    pub session_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: DEFAULT_DATABASE.to_string(),
            device_storage_path: DEFAULT_DEVICE_STORAGE.to_string(),
            functions_url: DEFAULT_FUNCTIONS_URL.to_string(),
            session_ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
        }
    }
}

impl Config {
    /// Reads the process environment. Call `dotenv()` first to pick up `.env`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let session_ttl = match lookup("CLEARCONNECT_SESSION_TTL_HOURS") {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(hours) if hours > 0 => Duration::hours(hours),
                _ => {
                    warn!("[Config] Ignoring invalid session TTL {:?}", raw);
                    defaults.session_ttl
                }
            },
            None => defaults.session_ttl,
        };

        Config {
            database_path: lookup("CLEARCONNECT_DATABASE").unwrap_or(defaults.database_path),
            device_storage_path: lookup("CLEARCONNECT_DEVICE_STORAGE")
                .unwrap_or(defaults.device_storage_path),
            functions_url: lookup("CLEARCONNECT_FUNCTIONS_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.functions_url),
            session_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[]));
        assert_eq!(config, Config::default());
        assert_eq!(config.session_ttl, Duration::days(7));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("CLEARCONNECT_DATABASE", "/tmp/cc.db"),
            ("CLEARCONNECT_FUNCTIONS_URL", "https://functions.example/"),
            ("CLEARCONNECT_SESSION_TTL_HOURS", "12"),
        ]));
        assert_eq!(config.database_path, "/tmp/cc.db");
        assert_eq!(config.functions_url, "https://functions.example");
        assert_eq!(config.session_ttl, Duration::hours(12));
    }

    #[test]
    fn test_bad_ttl_falls_back() {
        let config = Config::from_lookup(lookup_from(&[("CLEARCONNECT_SESSION_TTL_HOURS", "soon")]));
        assert_eq!(config.session_ttl, Duration::hours(DEFAULT_SESSION_TTL_HOURS));
    }
}
