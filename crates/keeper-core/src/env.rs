//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
pub fn get_var_or(name: &str, default: &str) -> String {
    get_var(name).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable as a u64.
pub fn get_u64(name: &str) -> Option<u64> {
    get_var(name).and_then(|v| v.parse().ok())
}

/// Environment variable names recognised by Keeper.
pub mod vars {
    /// Base directory override.
    pub const KEEPER_HOME: &str = "KEEPER_HOME";

    /// Config file override.
    pub const KEEPER_CONFIG: &str = "KEEPER_CONFIG";

    /// Address of the server the client talks to.
    pub const KEEPER_SERVER_ADDRESS: &str = "KEEPER_SERVER_ADDRESS";

    /// Address the server listens on.
    pub const KEEPER_LISTEN_ADDRESS: &str = "KEEPER_LISTEN_ADDRESS";

    /// Token signing key.
    pub const KEEPER_SECRET_KEY: &str = "KEEPER_SECRET_KEY";

    /// Where downloaded files land.
    pub const KEEPER_DOWNLOAD_DIR: &str = "KEEPER_DOWNLOAD_DIR";

    /// Log level (trace, debug, info, warn, error).
    pub const KEEPER_LOG_LEVEL: &str = "KEEPER_LOG_LEVEL";

    /// Unary request timeout in seconds.
    pub const KEEPER_REQUEST_TIMEOUT: &str = "KEEPER_REQUEST_TIMEOUT";
}
