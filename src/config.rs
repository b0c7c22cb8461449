use std::path::PathBuf;

use envconfig::Envconfig;

#[derive(Envconfig, Debug, Clone)]
pub struct Config {
    /// PostgreSQL URL. Without it the service runs on a seeded in-memory store.
    #[envconfig(from = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[envconfig(from = "BIND_ADDRESS", default = "0.0.0.0:5000")]
    pub bind_address: String,

    #[envconfig(from = "SESSION_TTL_SECS", default = "86400")]
    pub session_ttl_secs: i64,

    #[envconfig(from = "UPLOAD_DIR", default = "uploads")]
    pub upload_dir: PathBuf,

    #[envconfig(from = "MAX_UPLOAD_BYTES", default = "5242880")]
    pub max_upload_bytes: usize,

    #[envconfig(from = "EXPIRY_ALERT_DAYS", default = "30")]
    pub expiry_alert_days: i64,

    #[envconfig(from = "ALERT_SCHEDULE", default = "0 0 8 * * *")]
    pub alert_schedule: String,

    #[envconfig(from = "ADMIN_PASSWORD", default = "admin123")]
    pub admin_password: String,
}

/// The part of the configuration request handlers need at runtime.
#[derive(Debug, Clone)]
pub struct Settings {
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub expiry_alert_days: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 5 * 1024 * 1024,
            expiry_alert_days: 30,
        }
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
            expiry_alert_days: config.expiry_alert_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_when_variables_are_missing() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.bind_address, "0.0.0.0:5000");
        assert_eq!(config.session_ttl_secs, 86_400);
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(config.alert_schedule, "0 0 8 * * *");
    }

    #[test]
    fn overrides_are_read() {
        let vars = HashMap::from([
            ("DATABASE_URL".to_string(), "postgres://localhost/meditrack".to_string()),
            ("EXPIRY_ALERT_DAYS".to_string(), "60".to_string()),
        ]);
        let config = Config::init_from_hashmap(&vars).unwrap();
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/meditrack")
        );
        assert_eq!(Settings::from(&config).expiry_alert_days, 60);
    }
}
