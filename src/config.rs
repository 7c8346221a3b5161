// src/config.rs
use crate::errors::AppError;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite file backing the store.
    pub db_path: String,
    /// How often the feed polls for changed requests.
    pub poll_interval: Duration,
    /// Brevo API key. Without one, notifications are only logged.
    pub brevo_api_key: Option<String>,
    pub sender_email: String,
    pub sender_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "servicemart.sqlite3".to_string(),
            poll_interval: Duration::from_millis(1000),
            brevo_api_key: None,
            sender_email: "no-reply@servicemart.local".to_string(),
            sender_name: "ServiceMart".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, falling back to defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();

        if let Some(path) = lookup("SERVICEMART_DB").filter(|s| !s.trim().is_empty()) {
            cfg.db_path = path;
        }

        if let Some(ms) = lookup("SERVICEMART_POLL_MS") {
            let ms: u64 = ms.trim().parse().map_err(|e| {
                AppError::Config(format!("SERVICEMART_POLL_MS must be an integer: {e}"))
            })?;
            if ms == 0 {
                return Err(AppError::Config("SERVICEMART_POLL_MS must be > 0".into()));
            }
            cfg.poll_interval = Duration::from_millis(ms);
        }

        cfg.brevo_api_key = lookup("BREVO_API_KEY").filter(|s| !s.trim().is_empty());

        if let Some(email) = lookup("SERVICEMART_SENDER_EMAIL") {
            cfg.sender_email = email;
        }
        if let Some(name) = lookup("SERVICEMART_SENDER_NAME") {
            cfg.sender_name = name;
        }

        Ok(cfg)
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
    fn defaults_when_nothing_set() {
        let cfg = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.db_path, "servicemart.sqlite3");
        assert_eq!(cfg.poll_interval, Duration::from_millis(1000));
        assert!(cfg.brevo_api_key.is_none());
    }

    #[test]
    fn reads_overrides() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("SERVICEMART_DB", "/tmp/x.sqlite"),
            ("SERVICEMART_POLL_MS", "250"),
            ("BREVO_API_KEY", "key-123"),
        ]))
        .unwrap();
        assert_eq!(cfg.db_path, "/tmp/x.sqlite");
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.brevo_api_key.as_deref(), Some("key-123"));
    }

    #[test]
    fn bad_poll_interval_is_a_config_error() {
        let err = Config::from_lookup(lookup_from(&[("SERVICEMART_POLL_MS", "soon")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = Config::from_lookup(lookup_from(&[("SERVICEMART_POLL_MS", "0")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
