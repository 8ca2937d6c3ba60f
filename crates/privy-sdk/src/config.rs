//! Client configuration.

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::error::{PrivyError, Result};

/// Configuration for a Privy application.
#[derive(Debug, Clone, Deserialize)]
pub struct PrivyConfig {
    /// Base URL of the Privy API.
    #[serde(default = "PrivyConfig::default_api_url")]
    pub api_url: String,

    /// Application ID. Also the expected audience of identity tokens.
    pub application_id: String,

    /// Application secret used for basic authentication.
    pub application_secret: String,

    /// Page size requested from listing endpoints.
    #[serde(default = "PrivyConfig::default_max_page_size")]
    pub max_page_size: u32,

    /// Keep the token verification key after the first fetch.
    #[serde(default = "PrivyConfig::default_cache_verification_key")]
    pub cache_verification_key: bool,

    /// Request timeout in seconds.
    #[serde(default = "PrivyConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Webhook signing key (`whsec_...`), if webhooks are used.
    #[serde(default)]
    pub webhook_signing_key: Option<String>,
}

impl PrivyConfig {
    /// Create a configuration with default settings for the given credentials.
    #[must_use]
    pub fn new(application_id: impl Into<String>, application_secret: impl Into<String>) -> Self {
        Self {
            api_url: Self::default_api_url(),
            application_id: application_id.into(),
            application_secret: application_secret.into(),
            max_page_size: Self::default_max_page_size(),
            cache_verification_key: Self::default_cache_verification_key(),
            request_timeout_seconds: Self::default_request_timeout(),
            webhook_signing_key: None,
        }
    }

    fn default_api_url() -> String {
        "https://auth.privy.io".to_string()
    }

    const fn default_max_page_size() -> u32 {
        100
    }

    const fn default_cache_verification_key() -> bool {
        true
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    /// Load the configuration from `PRIVY_*` environment variables.
    ///
    /// `PRIVY_APPLICATION_ID` and `PRIVY_APPLICATION_SECRET` are required; every other
    /// variable falls back to its default.
    ///
    /// # Errors
    ///
    /// Returns `PrivyError::Config` if a required variable is missing, a value cannot be
    /// parsed, or the result fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name).ok_or_else(|| PrivyError::Config(format!("{name} is not set")))
        };

        let mut config = Self::new(
            required("PRIVY_APPLICATION_ID")?,
            required("PRIVY_APPLICATION_SECRET")?,
        );

        if let Some(api_url) = lookup("PRIVY_API_URL") {
            config.api_url = api_url;
        }
        if let Some(value) = lookup("PRIVY_MAX_PAGE_SIZE") {
            config.max_page_size = parse("PRIVY_MAX_PAGE_SIZE", &value)?;
        }
        if let Some(value) = lookup("PRIVY_CACHE_VERIFICATION_KEY") {
            config.cache_verification_key = parse("PRIVY_CACHE_VERIFICATION_KEY", &value)?;
        }
        if let Some(value) = lookup("PRIVY_REQUEST_TIMEOUT_SECONDS") {
            config.request_timeout_seconds = parse("PRIVY_REQUEST_TIMEOUT_SECONDS", &value)?;
        }
        config.webhook_signing_key = lookup("PRIVY_WEBHOOK_SIGNING_KEY");

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can be used.
    ///
    /// # Errors
    ///
    /// Returns `PrivyError::Config` if the credentials are blank, the API URL is empty or
    /// cannot be a base URL, or the page size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(PrivyError::Config("api_url is empty".to_string()));
        }
        self.endpoint(&[])?;
        if self.application_id.trim().is_empty() {
            return Err(PrivyError::Config("application_id is empty".to_string()));
        }
        if self.application_secret.trim().is_empty() {
            return Err(PrivyError::Config("application_secret is empty".to_string()));
        }
        if self.max_page_size == 0 {
            return Err(PrivyError::Config(
                "max_page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Build an endpoint URL under `api_url`. Each segment is percent-encoded, so a
    /// caller-supplied value always stays a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(self.api_url.trim())
            .map_err(|e| PrivyError::Config(format!("api_url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| PrivyError::Config("api_url cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Get the user listing endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns `PrivyError::Config` if `api_url` is not a valid base URL.
    pub fn users_url(&self) -> Result<Url> {
        self.endpoint(&["api", "v1", "users"])
    }

    /// Get the user search endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns `PrivyError::Config` if `api_url` is not a valid base URL.
    pub fn search_url(&self) -> Result<Url> {
        self.endpoint(&["api", "v1", "users", "search"])
    }

    /// Get the endpoint URL of a single user.
    ///
    /// # Errors
    ///
    /// Returns `PrivyError::Config` if `api_url` is not a valid base URL.
    pub fn user_url(&self, user_id: &str) -> Result<Url> {
        self.endpoint(&["api", "v1", "users", user_id])
    }

    /// Get the custom metadata endpoint URL of a user.
    ///
    /// # Errors
    ///
    /// Returns `PrivyError::Config` if `api_url` is not a valid base URL.
    pub fn custom_metadata_url(&self, user_id: &str) -> Result<Url> {
        self.endpoint(&["api", "v1", "users", user_id, "custom_metadata"])
    }

    /// Get a user lookup endpoint URL, e.g. `("email", "address")`.
    ///
    /// # Errors
    ///
    /// Returns `PrivyError::Config` if `api_url` is not a valid base URL.
    pub fn lookup_url(&self, kind: &str, key: &str) -> Result<Url> {
        self.endpoint(&["api", "v1", "users", kind, key])
    }

    /// Get the application settings endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns `PrivyError::Config` if `api_url` is not a valid base URL.
    pub fn settings_url(&self) -> Result<Url> {
        self.endpoint(&["api", "v1", "apps", &self.application_id])
    }
}

fn parse<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| PrivyError::Config(format!("{name}: {e}")))
}
