//! Client configuration and credentials.

use crate::error::{RelayError, Result};
use crate::protocol::constants::{
    DEFAULT_API_BASE, DEFAULT_KEEPALIVE_TIMEOUT_MS, DEFAULT_RECONNECT_INTERVAL_MS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SOCKET_URL, DEFAULT_USER_AGENT,
};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Environment variable holding the access key.
pub const ENV_KEY: &str = "RELAY_KEY";
/// Environment variable holding the access secret.
pub const ENV_SECRET: &str = "RELAY_SECRET";
/// Environment variable overriding the socket endpoint.
pub const ENV_SOCKET_URL: &str = "RELAY_SOCKET_URL";
/// Environment variable overriding the API base address.
pub const ENV_API_URL: &str = "RELAY_API_URL";

/// Access key and secret. Used for the socket handshake and as basic-auth
/// credentials on the side channel.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    key: String,
    secret: String,
}

impl Credentials {
    /// Create credentials from a key and secret.
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// Read credentials from `RELAY_KEY` and `RELAY_SECRET`.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(ENV_KEY).map_err(|_| RelayError::MissingEnv(ENV_KEY))?;
        let secret = std::env::var(ENV_SECRET).map_err(|_| RelayError::MissingEnv(ENV_SECRET))?;
        Ok(Self::new(key, secret))
    }

    /// Access key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Access secret.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Configuration for a [`RelayClient`](crate::RelayClient).
///
/// # Examples
///
/// ```
/// use webhookrelay_client::RelayConfig;
///
/// let config = RelayConfig {
///     reconnect_interval_ms: 5_000,
///     ..Default::default()
/// };
/// assert_eq!(config.keepalive_timeout_ms, 90_000);
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket endpoint of the relay service.
    pub socket_url: String,
    /// Base address of the relay HTTP API.
    pub api_base: String,
    /// Delay before reconnecting after the transport closes.
    pub reconnect_interval_ms: u64,
    /// Silence allowed on an authenticated connection before it is
    /// considered dead.
    pub keepalive_timeout_ms: u64,
    /// Timeout for side-channel requests.
    pub request_timeout_ms: u64,
    /// User agent for side-channel requests.
    pub user_agent: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            keepalive_timeout_ms: DEFAULT_KEEPALIVE_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl RelayConfig {
    /// Defaults, with endpoints overridden by `RELAY_SOCKET_URL` and
    /// `RELAY_API_URL` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(socket_url) = std::env::var(ENV_SOCKET_URL) {
            config.socket_url = socket_url;
        }
        if let Ok(api_base) = std::env::var(ENV_API_URL) {
            config.api_base = api_base;
        }
        config
    }

    /// Reconnect backoff as a duration.
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Keepalive deadline as a duration.
    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_millis(self.keepalive_timeout_ms)
    }

    /// Side-channel request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub(crate) fn parsed_socket_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.socket_url)?)
    }

    pub(crate) fn parsed_api_base(&self) -> Result<Url> {
        Ok(Url::parse(&self.api_base)?)
    }
}
