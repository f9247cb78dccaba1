//! Gateway public keys: fetching, parsing and TTL-bounded caching.

mod fetcher;
mod set;
mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use fetcher::{extract_pems, HttpKeyFetcher};
pub use set::{KeySet, TrustedKey};
pub use store::KeyTrustStore;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Error;

/// Source of the current time for cache expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Raw result of one call to the key-distribution endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedKeys {
    /// PEM-encoded public keys, primary key first.
    pub pems: Vec<String>,
    /// Lifetime advertised by the endpoint, if any.
    pub ttl: Option<Duration>,
}

/// Trait for retrieving the gateway's currently active public keys.
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    /// Fetch the active keys.
    ///
    /// # Returns
    ///
    /// At least one PEM block, or an error if the endpoint could not be
    /// reached or returned no keys.
    async fn fetch(&self) -> Result<FetchedKeys, Error>;
}
