use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use upstream::{Capabilities, Credentials};
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Gradebook login and password are required")]
    MissingCredentials,

    #[error("Upstream timeout cannot be 0")]
    ZeroTimeout,

    #[error("Invalid student index: {0}")]
    InvalidStudentIndex(String),
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener serving the public API
    pub listener: Listener,
    /// Optional listener for health and readiness probes
    pub admin_listener: Option<Listener>,
    pub upstream: UpstreamConfig,
    /// Gradebook account. Usually supplied through the environment instead.
    #[serde(default)]
    pub credentials: Credentials,
    /// Student to select after login, for parent accounts with several
    /// children.
    pub student_index: Option<u32>,
    /// Shared secret required from callers. Unset or empty disables the
    /// check.
    pub api_key: Option<String>,
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// Base URL of the gradebook bridge
    pub base_url: Url,
    /// Per-request timeout. Requests are unbounded when unset.
    pub timeout_secs: Option<u64>,
    /// Optional bridge features. Everything is enabled by default.
    #[serde(default)]
    pub capabilities: Capabilities,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        if let Some(admin_listener) = &self.admin_listener {
            admin_listener.validate()?;
        }

        if self.upstream.timeout_secs == Some(0) {
            return Err(ValidationError::ZeroTimeout);
        }

        if self.credentials.login.is_empty() || self.credentials.password.is_empty() {
            return Err(ValidationError::MissingCredentials);
        }

        Ok(())
    }

    /// Overrides secrets with `LIBRUS_LOGIN`, `LIBRUS_PASSWORD`,
    /// `STUDENT_INDEX` and `API_KEY` from `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(login) = lookup("LIBRUS_LOGIN") {
            self.credentials.login = login;
        }
        if let Some(password) = lookup("LIBRUS_PASSWORD") {
            self.credentials.password = password;
        }
        if let Some(index) = lookup("STUDENT_INDEX") {
            let parsed = index
                .trim()
                .parse()
                .map_err(|_| ValidationError::InvalidStudentIndex(index.clone()))?;
            self.student_index = Some(parsed);
        }
        if let Some(api_key) = lookup("API_KEY") {
            self.api_key = Some(api_key);
        }
        Ok(())
    }
}
