//! Process configuration for the sentinel oracle.
//!
//! Everything is sourced from the environment once at startup via
//! [`Config::from_env`]. Mandatory variables cause a startup failure with a
//! message naming the variable; optional variables fall back to defaults.
//!
//! # Example
//!
//! ```rust,no_run
//! use agent_sentinel::sentinel::config::Config;
//!
//! let config = Config::from_env().expect("incomplete environment");
//! println!("monitoring every {:?}", config.cycle_interval);
//! ```

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Default monitoring cycle period (seconds) when `CYCLE_INTERVAL_SEC` is unset.
pub const DEFAULT_CYCLE_INTERVAL_SEC: u64 = 600;

/// Default LLM response cache TTL (seconds) when `CACHE_TTL_SEC` is unset.
pub const DEFAULT_CACHE_TTL_SEC: u64 = 300;

/// Default OpenAI-compatible chat completion endpoint.
pub const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1";

/// Default chat model used for diagnostics.
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Default content gateway tried first by the metadata resolver.
pub const DEFAULT_METADATA_GATEWAY: &str = "https://ipfs.io";

/// Error raised when a mandatory environment variable is absent or malformed.
#[derive(Debug, Clone)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    fn missing(var: &str) -> Self {
        ConfigError {
            message: format!("mandatory environment variable {} is not set", var),
        }
    }

    fn invalid(var: &str, detail: impl fmt::Display) -> Self {
        ConfigError {
            message: format!("environment variable {} is invalid: {}", var, detail),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl Error for ConfigError {}

/// Resolved process configuration.
///
/// Immutable once built; the binary constructs it on startup and hands
/// clones (or borrowed fields) to the components that need them.
#[derive(Debug, Clone)]
pub struct Config {
    /// Blockchain JSON-RPC endpoint.
    pub rpc_url: String,
    /// Hex private key used to sign on-chain writes.
    pub private_key: String,
    /// Indexer GraphQL endpoint.
    pub indexer_url: String,
    /// Credential for the chat-completion service.
    pub llm_api_key: String,
    /// Base URL of the OpenAI-compatible chat endpoint.
    pub llm_api_url: String,
    /// Model identifier sent with every diagnostic request.
    pub llm_model: String,
    /// State store location: local path, `:memory:`, or `libsql://` URL.
    pub state_store_uri: String,
    /// Auth token for a remote state store, when one is used.
    pub state_store_token: Option<String>,
    /// IdentityRegistry contract address.
    pub identity_registry: String,
    /// HealthMonitor contract address.
    pub health_monitor: String,
    /// ReputationRegistry contract address.
    pub reputation_registry: String,
    /// Oracle token contract address.
    pub oracle_token: String,
    /// Preferred content gateway, tried before the public fallbacks.
    pub metadata_gateway: String,
    /// Period between monitoring cycles.
    pub cycle_interval: Duration,
    /// TTL applied to LLM response cache rows.
    pub cache_ttl: Duration,
}

fn required(var: &str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::missing(var)),
    }
}

fn optional(var: &str, default: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn optional_secs(var: &str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::invalid(var, e)),
        _ => Ok(Duration::from_secs(default)),
    }
}

impl Config {
    /// Read the full configuration from the environment.
    ///
    /// Missing mandatory variables are fatal; the caller is expected to log
    /// the error and exit rather than continue half-configured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            rpc_url: required("RPC_URL")?,
            private_key: required("PRIVATE_KEY")?,
            indexer_url: required("INDEXER_URL")?,
            llm_api_key: required("LLM_API_KEY")?,
            llm_api_url: optional("LLM_API_URL", DEFAULT_LLM_API_URL),
            llm_model: optional("LLM_MODEL", DEFAULT_LLM_MODEL),
            state_store_uri: required("STATE_STORE_URI")?,
            state_store_token: std::env::var("STATE_STORE_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            identity_registry: required("IDENTITY_REGISTRY")?,
            health_monitor: required("HEALTH_MONITOR")?,
            reputation_registry: required("REPUTATION_REGISTRY")?,
            oracle_token: required("ORACLE_TOKEN")?,
            metadata_gateway: optional("METADATA_GATEWAY", DEFAULT_METADATA_GATEWAY),
            cycle_interval: optional_secs("CYCLE_INTERVAL_SEC", DEFAULT_CYCLE_INTERVAL_SEC)?,
            cache_ttl: optional_secs("CACHE_TTL_SEC", DEFAULT_CACHE_TTL_SEC)?,
        })
    }
}
