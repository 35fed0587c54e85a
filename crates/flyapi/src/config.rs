//! Client configuration.
//!
//! A [`ClientConfig`] is built once by the host and then shared read-only by
//! every request.

use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;

/// Default GraphQL endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.fly.io/graphql";

/// Upper bound for every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Environment variable holding the API token.
pub const TOKEN_ENV: &str = "FLY_API_TOKEN";

/// Environment variable that enables request tracing on the Fly side.
pub const DEBUG_ENV: &str = "DEBUG";

/// Immutable configuration for the API client.
#[derive(Clone)]
pub struct ClientConfig {
    /// Bearer token.
    pub token: String,
    /// GraphQL endpoint URL.
    pub endpoint: String,
    /// Global timeout per request.
    pub timeout: Duration,
    /// Send `Fly-Force-Trace: true` with every request.
    pub force_trace: bool,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a configuration with defaults and the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            force_trace: false,
            user_agent: format!("flyform/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Build a configuration from an optional explicit token and the environment.
    ///
    /// The explicit token wins over `FLY_API_TOKEN`. Setting `DEBUG` turns on
    /// force tracing.
    pub fn from_env(token: Option<String>) -> Result<Self> {
        let token = resolve_token(token, std::env::var(TOKEN_ENV).ok())?;
        let mut config = Self::new(token);
        config.force_trace = std::env::var_os(DEBUG_ENV).is_some();
        Ok(config)
    }

    /// Use a custom endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Use a custom timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable force tracing.
    pub fn with_force_trace(mut self, force_trace: bool) -> Self {
        self.force_trace = force_trace;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("force_trace", &self.force_trace)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Pick the explicit token, falling back to the environment value.
///
/// Empty strings count as unset.
pub fn resolve_token(explicit: Option<String>, env: Option<String>) -> Result<String> {
    explicit
        .filter(|t| !t.trim().is_empty())
        .or_else(|| env.filter(|t| !t.trim().is_empty()))
        .ok_or(Error::MissingToken)
}
