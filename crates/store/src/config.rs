use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_url: String,
    pub write_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl StoreConfig {
    /// Environment variables win over the optional env file named by
    /// `PENMARK_CONFIG_PATH`.
    pub fn load() -> Result<Self, ConfigError> {
        let mut merged = HashMap::new();

        if let Ok(config_path) = std::env::var("PENMARK_CONFIG_PATH") {
            let config_path = config_path.trim();
            if !config_path.is_empty() {
                let file_kv = parse_env_file(config_path)?;
                merged.extend(file_kv);
            }
        }

        merged.extend(std::env::vars());

        Self::from_kv(&merged)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let db_url = require_nonempty(kv, "PENMARK_DB_URL")?;
        let write_timeout_ms = parse_u64(
            kv.get("PENMARK_STORE_WRITE_TIMEOUT_MS"),
            500,
            "PENMARK_STORE_WRITE_TIMEOUT_MS",
        )?;
        if write_timeout_ms == 0 {
            return Err(ConfigError {
                code: "ERR_INVALID_CONFIG",
                message: "PENMARK_STORE_WRITE_TIMEOUT_MS must be positive".to_string(),
            });
        }

        Ok(Self {
            db_url,
            write_timeout: Duration::from_millis(write_timeout_ms),
        })
    }
}

fn parse_env_file(path: &str) -> Result<HashMap<String, String>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|_| ConfigError {
        code: "ERR_CONFIG_FILE_READ",
        message: format!("failed to read config file at {}", path),
    })?;

    let mut kv = HashMap::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| ConfigError {
            code: "ERR_CONFIG_FILE_PARSE",
            message: format!("invalid config line {} (expected KEY=VALUE)", idx + 1),
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError {
                code: "ERR_CONFIG_FILE_PARSE",
                message: format!("invalid config line {} (empty key)", idx + 1),
            });
        }

        let value = strip_quotes(value.trim());
        kv.insert(key.to_string(), value);
    }

    Ok(kv)
}

fn strip_quotes(s: &str) -> String {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return s[1..bytes.len() - 1].to_string();
        }
    }
    s.to_string()
}

fn require_nonempty(kv: &HashMap<String, String>, key: &'static str) -> Result<String, ConfigError> {
    let Some(value) = kv.get(key) else {
        return Err(ConfigError {
            code: "ERR_MISSING_CONFIG",
            message: format!("missing required config key {}", key),
        });
    };

    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError {
            code: "ERR_MISSING_CONFIG",
            message: format!("missing required config key {}", key),
        });
    }

    Ok(value.to_string())
}

fn parse_u64(value: Option<&String>, default: u64, key: &'static str) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v.parse::<u64>().map_err(|_| ConfigError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be an integer", key),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_kv_requires_db_url() {
        let err = StoreConfig::from_kv(&HashMap::new()).unwrap_err();
        assert_eq!(err.code, "ERR_MISSING_CONFIG");
    }

    #[test]
    fn from_kv_applies_timeout_default_and_override() {
        let mut kv = HashMap::new();
        kv.insert(
            "PENMARK_DB_URL".to_string(),
            "postgres://localhost/penmark".to_string(),
        );

        let config = StoreConfig::from_kv(&kv).expect("config should load");
        assert_eq!(config.write_timeout, Duration::from_millis(500));

        kv.insert(
            "PENMARK_STORE_WRITE_TIMEOUT_MS".to_string(),
            "1500".to_string(),
        );
        let config = StoreConfig::from_kv(&kv).expect("config should load");
        assert_eq!(config.write_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn from_kv_rejects_zero_and_garbage_timeouts() {
        let mut kv = HashMap::new();
        kv.insert(
            "PENMARK_DB_URL".to_string(),
            "postgres://localhost/penmark".to_string(),
        );
        kv.insert(
            "PENMARK_STORE_WRITE_TIMEOUT_MS".to_string(),
            "0".to_string(),
        );
        let err = StoreConfig::from_kv(&kv).unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");

        kv.insert(
            "PENMARK_STORE_WRITE_TIMEOUT_MS".to_string(),
            "soon".to_string(),
        );
        let err = StoreConfig::from_kv(&kv).unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
    }
}
