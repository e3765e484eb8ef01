//! Configuration types for the audit log client.

use std::time::Duration;

use crate::error::{ClientError, Result};

/// Configuration for the audit log client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the audit log service (e.g., "<https://audit.example.com/api>").
    pub url: String,

    /// Authentication configuration.
    pub auth: ClientAuth,

    /// Timeout for query and export requests.
    pub timeout: Duration,

    /// Live stream reconnection behavior.
    pub stream: StreamConfig,

    /// User agent string.
    pub user_agent: String,
}

impl ClientConfig {
    /// Creates a new client configuration with the given base URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use auditscope_client::ClientConfig;
    ///
    /// let config = ClientConfig::new("https://audit.example.com/api");
    /// assert_eq!(config.url, "https://audit.example.com/api");
    /// ```
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: ClientAuth::None,
            timeout: Duration::from_secs(30),
            stream: StreamConfig::default(),
            user_agent: format!("auditscope/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the authentication method.
    #[must_use]
    pub fn with_auth(mut self, auth: ClientAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the live stream configuration.
    #[must_use]
    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Parses the base URL, rejecting anything that is not http(s).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the URL does not parse or uses
    /// another scheme.
    pub fn base_url(&self) -> Result<url::Url> {
        let parsed = url::Url::parse(self.url.trim_end_matches('/')).map_err(|_| {
            ClientError::InvalidUrl {
                url: self.url.clone(),
            }
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl {
                url: self.url.clone(),
            });
        }

        Ok(parsed)
    }

    /// Checks the configuration for obviously unusable values.
    ///
    /// # Errors
    ///
    /// Returns an error for a bad URL, a zero timeout, or an inverted
    /// backoff window.
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;

        if self.timeout.is_zero() {
            return Err(ClientError::InvalidConfig {
                reason: "timeout must be greater than zero".to_string(),
            });
        }

        if self.stream.reconnect_base_delay > self.stream.reconnect_max_delay {
            return Err(ClientError::InvalidConfig {
                reason: "reconnect base delay exceeds max delay".to_string(),
            });
        }

        Ok(())
    }
}

/// Authentication methods for the audit log service.
#[derive(Debug, Clone, Default)]
pub enum ClientAuth {
    /// No authentication (for local development).
    #[default]
    None,

    /// Bearer token authentication.
    Bearer {
        /// Token value.
        token: String,
    },

    /// Basic authentication.
    Basic {
        /// Username.
        username: String,
        /// Password or token.
        password: String,
    },
}

impl ClientAuth {
    /// Creates bearer token authentication.
    ///
    /// # Examples
    ///
    /// ```
    /// use auditscope_client::ClientAuth;
    ///
    /// let auth = ClientAuth::bearer("my-token");
    /// ```
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Creates basic authentication.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Applies the credentials to a request.
    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::None => request,
            Self::Bearer { token } => request.bearer_auth(token),
            Self::Basic { username, password } => request.basic_auth(username, Some(password)),
        }
    }
}

/// Reconnection behavior for the live event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Base delay for reconnection attempts.
    pub reconnect_base_delay: Duration,
    /// Maximum delay for reconnection attempts.
    pub reconnect_max_delay: Duration,
    /// Maximum number of consecutive failed attempts (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Whether to use exponential backoff for reconnection.
    pub use_exponential_backoff: bool,
    /// Timeout for establishing the stream connection.
    pub connect_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            max_reconnect_attempts: 0,
            use_exponential_backoff: true,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl StreamConfig {
    /// Returns the delay before the next attempt after `consecutive_failures`.
    ///
    /// The first retry waits the base delay, and each further failure
    /// doubles it up to the maximum.
    #[must_use]
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        if !self.use_exponential_backoff {
            return self.reconnect_base_delay;
        }

        let exponent = consecutive_failures.saturating_sub(1).min(10);
        let factor = 2_u32.saturating_pow(exponent);
        self.reconnect_base_delay
            .saturating_mul(factor)
            .min(self.reconnect_max_delay)
    }

    /// Returns true once `consecutive_failures` exhausts the attempt budget.
    #[must_use]
    pub const fn attempts_exhausted(&self, consecutive_failures: u32) -> bool {
        self.max_reconnect_attempts > 0 && consecutive_failures >= self.max_reconnect_attempts
    }
}
