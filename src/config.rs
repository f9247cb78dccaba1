//! Gateway settings supplied by the caller.
//!
//! This crate does not load configuration; the embedding application builds a
//! [`GatewayConfig`] from wherever it keeps merchant settings and hands it over.

use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::error::{Error, ErrorKind, HttpErrorKind};

/// Production collect API base URL.
pub const PRODUCTION_BASE_URL: &str = "https://gw.dragonpay.ph/api/collect/v2";

/// Test (sandbox) collect API base URL.
pub const TEST_BASE_URL: &str = "https://test.dragonpay.ph/api/collect/v2";

/// Path of the key-distribution endpoint, relative to the base URL.
pub const KEYS_CALLBACK_PATH: &str = "keys/callback";

/// Recommended lifetime of a fetched public key set.
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on a single key refresh, including retries.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Retries after a failed key endpoint request, within the refresh timeout.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Merchant and gateway settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Merchant identifier issued by the gateway.
    pub merchant_id: String,
    /// API key used to authenticate against the key endpoint.
    pub api_key: SecretString,
    /// Shared secret: the HMAC key, or the merchant password on the legacy path.
    pub secret: SecretString,
    /// Selects the sandbox environment.
    #[serde(default = "default_test_mode")]
    pub test_mode: bool,
    /// Overrides the environment's base URL (useful against a mock server).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Overrides the default 24 hour key lifetime.
    #[serde(default, with = "optional_secs")]
    pub key_ttl: Option<Duration>,
    /// Overrides the default refresh timeout.
    #[serde(default, with = "optional_secs")]
    pub refresh_timeout: Option<Duration>,
    /// Overrides the default retry count for the key endpoint.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

fn default_test_mode() -> bool {
    true
}

impl GatewayConfig {
    /// Create a configuration for the test environment with default timings.
    pub fn new(merchant_id: String, api_key: SecretString, secret: SecretString) -> Self {
        Self {
            merchant_id,
            api_key,
            secret,
            test_mode: true,
            base_url: None,
            key_ttl: None,
            refresh_timeout: None,
            max_retries: None,
        }
    }

    /// Select production or test environment.
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// Point at a custom base URL.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Override the key lifetime.
    pub fn with_key_ttl(mut self, ttl: Duration) -> Self {
        self.key_ttl = Some(ttl);
        self
    }

    /// Override the refresh timeout.
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    /// Override the number of retries per key refresh.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Base URL for the configured environment.
    pub fn base_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url,
            None if self.test_mode => TEST_BASE_URL,
            None => PRODUCTION_BASE_URL,
        }
    }

    /// Full URL of the key-distribution endpoint.
    pub fn keys_endpoint(&self) -> Result<Url, Error> {
        let raw = format!("{}/{}", self.base_url().trim_end_matches('/'), KEYS_CALLBACK_PATH);
        Url::parse(&raw).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Http(HttpErrorKind::BuilderFailed),
        })
    }

    /// Effective key lifetime.
    pub fn key_ttl(&self) -> Duration {
        self.key_ttl.unwrap_or(DEFAULT_KEY_TTL)
    }

    /// Effective refresh timeout.
    pub fn refresh_timeout(&self) -> Duration {
        self.refresh_timeout.unwrap_or(DEFAULT_REFRESH_TIMEOUT)
    }

    /// Effective retry count.
    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    /// Timeout for one request to the key endpoint.
    ///
    /// Every attempt, the first and each retry, gets an equal share of the
    /// refresh timeout.
    pub fn request_timeout(&self) -> Duration {
        self.refresh_timeout() / (self.max_retries().saturating_add(1))
    }
}

mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}
