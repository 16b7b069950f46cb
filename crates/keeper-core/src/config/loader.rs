//! Configuration loading and persistence.

use super::{Config, LogLevel};
use crate::env;
use crate::error::ConfigError;
use crate::paths;
use crate::protocol::MAX_CHUNK_SIZE;
use crate::secret::SecretString;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use tracing::warn;

/// Lowest PBKDF2 iteration count accepted.
const MIN_KDF_ITERATIONS: u32 = 4096;

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Load from `path` (or the default path), falling back to defaults when
    /// the file does not exist, then apply environment overrides.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let loaded = match path {
            Some(p) => Self::load(p),
            None => Self::load_default(),
        };

        let mut config = match loaded {
            Ok(config) => config,
            Err(ConfigError::NotFound(p)) => {
                if path.is_some() {
                    warn!(path = %p.display(), "config file not found, using defaults");
                }
                Self::default()
            }
            Err(e) => return Err(e),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Overlay `KEEPER_*` environment variables on top of the loaded values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(addr) = env::get_var(env::vars::KEEPER_SERVER_ADDRESS) {
            self.client.server_address = addr;
        }
        if let Some(addr) = env::get_var(env::vars::KEEPER_LISTEN_ADDRESS) {
            self.server.listen_address = addr;
        }
        if let Some(key) = env::get_var(env::vars::KEEPER_SECRET_KEY) {
            self.server.secret_key = Some(SecretString::new(key));
        }
        if let Some(dir) = env::get_var(env::vars::KEEPER_DOWNLOAD_DIR) {
            self.client.download_dir = Some(paths::expand_tilde(&dir));
        }
        if let Some(secs) = env::get_u64(env::vars::KEEPER_REQUEST_TIMEOUT) {
            self.client.request_timeout_secs = secs;
        }
        if let Some(level) = env::get_var(env::vars::KEEPER_LOG_LEVEL) {
            match level.parse::<LogLevel>() {
                Ok(level) => self.logging.level = level,
                Err(e) => warn!("ignoring {}: {}", env::vars::KEEPER_LOG_LEVEL, e),
            }
        }
    }

    /// Save configuration to the default path.
    pub fn save_default(&self) -> Result<(), ConfigError> {
        let path = paths::config_file()?;
        self.save(&path)
    }

    /// Save configuration to a file path.
    ///
    /// The file may hold the token signing key, so it is written 0600 on Unix.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 has no serializer; JSON is valid JSON5.
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.client.server_address.trim().is_empty() {
            errors.push("Client server_address must not be empty".to_string());
        }
        if self.client.request_timeout_secs == 0 {
            errors.push("Client request_timeout_secs must be greater than 0".to_string());
        }
        if self.client.chunk_size == 0 {
            errors.push("Client chunk_size must be greater than 0".to_string());
        }
        if self.client.chunk_size > MAX_CHUNK_SIZE {
            errors.push(format!(
                "Client chunk_size {} exceeds maximum of {}",
                self.client.chunk_size, MAX_CHUNK_SIZE
            ));
        }
        if self.client.kdf_iterations < MIN_KDF_ITERATIONS {
            errors.push(format!(
                "Client kdf_iterations must be at least {}, got {}",
                MIN_KDF_ITERATIONS, self.client.kdf_iterations
            ));
        }

        if self.server.listen_address.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "Server listen_address '{}' is not a valid socket address",
                self.server.listen_address
            ));
        }
        if let Some(key) = &self.server.secret_key {
            if key.is_empty() {
                errors.push("Server secret_key is set but empty".to_string());
            }
        }
        if self.server.token_lifetime_hours == 0 {
            errors.push("Server token_lifetime_hours must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_config() {
        let content = r#"{
            // comments are fine in json5
            client: { server_address: "10.0.0.5:50051" },
        }"#;

        let config = Config::parse(content).unwrap();
        assert_eq!(config.client.server_address, "10.0.0.5:50051");
        assert_eq!(config.client.request_timeout_secs, 5);
        assert_eq!(config.server.token_lifetime_hours, 24);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Config::parse("{ client: "),
            Err(ConfigError::Json5(_))
        ));
    }

    #[test]
    fn test_validate_default_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_listen_address() {
        let mut config = Config::default();
        config.server.listen_address = "nowhere".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("listen_address"), "unexpected error: {}", err);
    }

    #[test]
    fn test_validate_low_iterations() {
        let mut config = Config::default();
        config.client.kdf_iterations = 1000;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("kdf_iterations"), "unexpected error: {}", err);
    }

    #[test]
    fn test_validate_chunk_size_limit() {
        let mut config = Config::default();
        config.client.chunk_size = MAX_CHUNK_SIZE;
        assert!(config.validate().is_ok());

        config.client.chunk_size = 16 * 1024 * 1024;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("chunk_size"), "unexpected error: {}", err);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = Config::default();
        config.client.chunk_size = 0;
        config.client.request_timeout_secs = 0;
        config.server.token_lifetime_hours = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("chunk_size"), "missing chunk_size: {}", err);
        assert!(err.contains("request_timeout_secs"), "missing timeout: {}", err);
        assert!(err.contains("token_lifetime_hours"), "missing lifetime: {}", err);
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("keeper.json5");

        let mut config = Config::default();
        config.server.secret_key = Some(SecretString::new("signing-key"));
        config.logging.level = LogLevel::Debug;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.logging.level, LogLevel::Debug);
        assert_eq!(
            loaded.server.secret_key.as_ref().map(|k| k.expose_secret()),
            Some("signing-key")
        );
        assert!(!path.with_extension("tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keeper.json5");
        Config::default().save(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let result = Config::load(&tmp.path().join("absent.json5"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_or_default(Some(&tmp.path().join("absent.json5"))).unwrap();
        assert!(config.validate().is_ok());
    }
}
