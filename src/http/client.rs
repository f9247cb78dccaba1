//! Key endpoint client sized to the refresh deadline.

use std::time::Duration;

use reqwest_middleware::ClientBuilder;
use reqwest_retry::RetryTransientMiddleware;

use super::DeadlineBackoff;
use crate::config::GatewayConfig;
use crate::error::Error;

const USER_AGENT: &str = concat!("callback-auth/", env!("CARGO_PKG_VERSION"));

/// HTTP client used to reach the gateway.
pub type GatewayClient = reqwest_middleware::ClientWithMiddleware;

/// Builds the key endpoint client from a [`GatewayConfig`].
///
/// Each attempt gets an equal share of the refresh timeout, and transient
/// failures are retried only while the backoff still ends inside it.
pub struct GatewayClientBuilder {
    request_timeout: Duration,
    max_retries: u32,
    retry_budget: Duration,
}

impl GatewayClientBuilder {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            max_retries: config.max_retries(),
            retry_budget: config.refresh_timeout(),
        }
    }

    pub fn build(self) -> Result<GatewayClient, Error> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let policy = DeadlineBackoff::new(self.max_retries, self.retry_budget);
        Ok(ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(policy))
            .build())
    }
}
