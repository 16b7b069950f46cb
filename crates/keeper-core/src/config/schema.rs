//! Configuration schema definitions.

use crate::protocol::DEFAULT_CHUNK_SIZE;
use crate::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main Keeper configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Client-side settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// Server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Client configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server address, `host:port` or a full `http(s)://` URL.
    #[serde(default = "default_address")]
    pub server_address: String,

    /// Directory downloaded files are written to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,

    /// Local vault file used by `keeper local`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_file: Option<PathBuf>,

    /// Timeout for unary calls, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Delay between notification resubscribe attempts, in seconds.
    #[serde(default = "default_reconnect_backoff")]
    pub reconnect_backoff_secs: u64,

    /// File transfer chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// PBKDF2 iteration count for newly sealed data.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: default_address(),
            download_dir: None,
            vault_file: None,
            request_timeout_secs: default_request_timeout(),
            reconnect_backoff_secs: default_reconnect_backoff(),
            chunk_size: default_chunk_size(),
            kdf_iterations: default_kdf_iterations(),
        }
    }
}

impl ClientConfig {
    /// Base HTTP URL of the server.
    pub fn base_url(&self) -> String {
        let addr = self.server_address.trim_end_matches('/');
        if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.to_string()
        } else {
            format!("http://{}", addr)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_address")]
    pub listen_address: String,

    /// HMAC key for access tokens. A random key is generated at startup
    /// when unset, which invalidates tokens across restarts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<SecretString>,

    /// Access token lifetime in hours.
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_hours: u64,

    /// Upper bound on the graceful shutdown wait, in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_address(),
            secret_key: None,
            token_lifetime_hours: default_token_lifetime(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.token_lifetime_hours * 3600)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn default_address() -> String {
    "127.0.0.1:50051".to_string()
}

fn default_request_timeout() -> u64 {
    5
}

fn default_reconnect_backoff() -> u64 {
    2
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_kdf_iterations() -> u32 {
    4096
}

fn default_token_lifetime() -> u64 {
    24
}

fn default_shutdown_timeout() -> u64 {
    30
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults() {
        let client = ClientConfig::default();
        assert_eq!(client.server_address, "127.0.0.1:50051");
        assert_eq!(client.request_timeout(), Duration::from_secs(5));
        assert_eq!(client.reconnect_backoff(), Duration::from_secs(2));
        assert_eq!(client.chunk_size, 2 * 1024 * 1024);
        assert_eq!(client.kdf_iterations, 4096);
    }

    #[test]
    fn test_server_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.listen_address, "127.0.0.1:50051");
        assert_eq!(server.token_lifetime(), Duration::from_secs(24 * 3600));
        assert_eq!(server.shutdown_timeout(), Duration::from_secs(30));
        assert!(server.secret_key.is_none());
    }

    #[test]
    fn test_base_url() {
        let mut client = ClientConfig::default();
        assert_eq!(client.base_url(), "http://127.0.0.1:50051");

        client.server_address = "https://vault.example.com/".to_string();
        assert_eq!(client.base_url(), "https://vault.example.com");
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_serde() {
        let levels = [LogLevel::Trace, LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error];
        for level in levels {
            let json = serde_json::to_string(&level).unwrap();
            assert_eq!(json, format!("\"{}\"", level.as_str()));
            let parsed: LogLevel = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, level);
        }
    }
}
