//! Session configuration: backend base URL, optional bearer credential and
//! optional timeout override.
//!
//! A `Configuration` can only be built from a base URL that parses as an
//! `http`/`https` URL able to carry path segments, so every request built
//! from it has a valid target.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Base URL used when the operator does not supply one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8010";

/// Environment variable overriding [`DEFAULT_BASE_URL`].
pub const BASE_URL_ENV: &str = "API_BASE_URL";

/// Opaque bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps `token`, returning `None` for a blank string.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    base_url: Url,
    credential: Option<Credential>,
    timeout: Option<Duration>,
}

impl Configuration {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            credential: None,
            timeout: None,
        })
    }

    /// Configuration targeting `API_BASE_URL` when set, else the default.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new(&url),
            _ => Self::new(DEFAULT_BASE_URL),
        }
    }

    pub fn with_credential(mut self, token: impl Into<String>) -> Self {
        self.credential = Credential::new(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Replaces the base URL, leaving the configuration untouched on error.
    pub fn set_base_url(&mut self, base_url: &str) -> Result<(), ConfigError> {
        self.base_url = parse_base_url(base_url)?;
        Ok(())
    }

    /// A blank token clears the credential.
    pub fn set_credential(&mut self, token: Option<&str>) {
        self.credential = token.and_then(Credential::new);
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("DEFAULT_BASE_URL is a valid URL"),
            credential: None,
            timeout: None,
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ConfigError::EmptyBaseUrl);
    }
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConfigError::UnsupportedScheme {
                url: raw.to_string(),
                scheme: other.to_string(),
            })
        }
    }
    if url.cannot_be_a_base() || url.host().is_none() {
        return Err(ConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "URL has no host".to_string(),
        });
    }
    Ok(url)
}
