use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_address: String,
    pub port: u16,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub model_path: Option<PathBuf>,
    pub jwt_secret: String,
    pub max_upload_bytes: usize,
    pub inference_timeout_secs: u64,
    pub password_iterations: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8081,
            database_url: "sqlite://litscan.db".to_string(),
            upload_dir: PathBuf::from("static/uploads"),
            model_path: None,
            jwt_secret: String::new(),
            max_upload_bytes: 10 * 1024 * 1024,
            inference_timeout_secs: 30,
            password_iterations: 600_000,
        }
    }
}

impl AppConfig {
    /// Reads the optional YAML file named by `LITSCAN_CONFIG`, then applies
    /// environment overrides on top.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env::var("LITSCAN_CONFIG") {
            Ok(path) => Self::from_yaml_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml_str(&config_str)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BIND_ADDRESS") {
            self.bind_address = v;
        }
        if let Some(v) = lookup("PORT") {
            self.port = parse_value("PORT", &v)?;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = lookup("UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MODEL_PATH") {
            self.model_path = if v.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(v))
            };
        }
        if let Some(v) = lookup("JWT_SECRET") {
            self.jwt_secret = v;
        }
        if let Some(v) = lookup("MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = parse_value("MAX_UPLOAD_BYTES", &v)?;
        }
        if let Some(v) = lookup("INFERENCE_TIMEOUT_SECS") {
            self.inference_timeout_secs = parse_value("INFERENCE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("PASSWORD_ITERATIONS") {
            self.password_iterations = parse_value("PASSWORD_ITERATIONS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAX_UPLOAD_BYTES",
                value: "0".to_string(),
            });
        }
        if self.inference_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "INFERENCE_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }
        if self.password_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PASSWORD_ITERATIONS",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
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
    fn yaml_fills_only_given_keys() {
        let config = AppConfig::from_yaml_str("port: 9000\nupload_dir: /tmp/up\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/up"));
        assert_eq!(config.inference_timeout_secs, 30);
        assert!(config.model_path.is_none());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = AppConfig::from_yaml_str("port: 9000\n").unwrap();
        config
            .apply_overrides(lookup_from(&[
                ("PORT", "7000"),
                ("JWT_SECRET", "s3cret"),
                ("MODEL_PATH", "model.pt"),
            ]))
            .unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.model_path, Some(PathBuf::from("model.pt")));
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_addr(), "0.0.0.0:7000");
    }

    #[test]
    fn bad_numbers_are_reported_with_their_key() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(lookup_from(&[("MAX_UPLOAD_BYTES", "lots")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: "MAX_UPLOAD_BYTES", .. }
        ));
    }

    #[test]
    fn missing_secret_fails_validation() {
        let config = AppConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("JWT_SECRET"))));
    }
}
