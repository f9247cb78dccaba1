//! TTL-bounded public key cache with single-flight refresh.

use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{Clock, HttpKeyFetcher, KeyFetcher, KeySet, SystemClock};
use crate::config::{GatewayConfig, DEFAULT_KEY_TTL, DEFAULT_REFRESH_TIMEOUT};
use crate::http::GatewayClientBuilder;
use crate::error::{key_error, key_error_from, Error, ErrorKind, KeyErrorKind};

/// Outcome of the most recent refresh, shared with callers that waited on it.
struct RefreshRecord {
    generation: u64,
    failure: Option<Arc<Error>>,
}

/// A refresh failure handed to every caller that waited on that refresh.
///
/// Displays as the underlying cause and keeps its source chain.
#[derive(Debug)]
struct SharedFailure(Arc<Error>);

impl SharedFailure {
    fn error(failure: &Arc<Error>) -> Error {
        Error {
            source: Some(Box::new(SharedFailure(Arc::clone(failure)))),
            error_kind: failure.error_kind,
        }
    }
}

impl fmt::Display for SharedFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.0.source {
            Some(source) => write!(f, "{}", source),
            None => write!(f, "{}", self.0),
        }
    }
}

impl StdError for SharedFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source().and_then(|source| source.source())
    }
}

/// Cache of the gateway's public keys.
///
/// Concurrent callers that find the cache missing or expired collapse into a
/// single fetch: the first caller performs it while holding the refresh lock,
/// and every caller that queued behind it takes that refresh's outcome instead
/// of fetching again. A failed refresh never clears the cache.
pub struct KeyTrustStore {
    fetcher: Arc<dyn KeyFetcher>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    refresh_timeout: Duration,
    cache: RwLock<Option<Arc<KeySet>>>,
    // Number of completed refreshes. Read without the lock to detect whether a
    // refresh finished while a caller was queued.
    generation: AtomicU64,
    refresh_lock: Mutex<RefreshRecord>,
}

impl KeyTrustStore {
    /// Create a store that fetches through `fetcher`, using wall-clock time and
    /// the default TTL and timeout.
    pub fn new(fetcher: Arc<dyn KeyFetcher>) -> Self {
        Self::with_clock(fetcher, Arc::new(SystemClock))
    }

    /// Create a store backed by the gateway's key endpoint, with the TTL,
    /// timeout and retry count from `config`.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, Error> {
        let client = GatewayClientBuilder::from_config(config).build()?;
        let fetcher = HttpKeyFetcher::new(config, client)?;

        Ok(Self::new(Arc::new(fetcher))
            .with_default_ttl(config.key_ttl())
            .with_refresh_timeout(config.refresh_timeout()))
    }

    /// Create a store with an explicit clock.
    pub fn with_clock(fetcher: Arc<dyn KeyFetcher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            fetcher,
            clock,
            default_ttl: DEFAULT_KEY_TTL,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            cache: RwLock::new(None),
            generation: AtomicU64::new(0),
            refresh_lock: Mutex::new(RefreshRecord {
                generation: 0,
                failure: None,
            }),
        }
    }

    /// Set the TTL applied when the endpoint does not advertise one.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the deadline for a single refresh.
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Get the current trusted key set, refreshing first if it is missing or expired.
    ///
    /// # Returns
    ///
    /// The fresh key set. Fails with `Unavailable` when nothing was ever
    /// cached and the refresh failed, or with `FetchFailed` when an expired
    /// set could not be replaced.
    pub async fn current_keys(&self) -> Result<Arc<KeySet>, Error> {
        let observed = self.generation.load(Ordering::Acquire);

        if let Some(keys) = self.fresh_keys().await {
            return Ok(keys);
        }

        debug!("Gateway key cache is missing or expired, refreshing");
        let err = match self.refresh_after(observed).await {
            Ok(keys) => return Ok(keys),
            Err(err) => err,
        };

        if self.cache.read().await.is_none() {
            Err(key_error_from(KeyErrorKind::Unavailable, err))
        } else {
            Err(err)
        }
    }

    /// Fetch the active keys and replace the cache wholesale.
    ///
    /// Joins a refresh that is already in flight rather than starting another.
    /// On failure the existing cache entry is left untouched.
    pub async fn refresh(&self) -> Result<Arc<KeySet>, Error> {
        let observed = self.generation.load(Ordering::Acquire);
        self.refresh_after(observed).await
    }

    /// The cached key set, fresh or not, without triggering a refresh.
    pub async fn cached_keys(&self) -> Option<Arc<KeySet>> {
        self.cache.read().await.clone()
    }

    /// Drop the cached key set so the next lookup refetches.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
        debug!("Gateway key cache invalidated");
    }

    async fn fresh_keys(&self) -> Option<Arc<KeySet>> {
        let now = self.clock.now();
        self.cache
            .read()
            .await
            .as_ref()
            .filter(|keys| keys.is_fresh(now))
            .cloned()
    }

    async fn refresh_after(&self, observed: u64) -> Result<Arc<KeySet>, Error> {
        let mut record = self.refresh_lock.lock().await;

        // A refresh completed while this caller was queued: share its outcome,
        // unless the keys it produced have expired since.
        if record.generation != observed {
            if let Some(failure) = &record.failure {
                debug!("Joining failed result of concurrent gateway key refresh");
                return Err(SharedFailure::error(failure));
            }
            if let Some(keys) = self.fresh_keys().await {
                debug!("Joining result of concurrent gateway key refresh");
                return Ok(keys);
            }
        }

        let outcome = self.fetch_key_set().await;
        record.generation += 1;

        let result = match outcome {
            Ok(keys) => {
                let keys = Arc::new(keys);
                *self.cache.write().await = Some(Arc::clone(&keys));
                record.failure = None;
                info!(
                    "Refreshed {} gateway public key(s), valid until {}",
                    keys.keys().len(),
                    keys.expires_at()
                );
                Ok(keys)
            }
            Err(err) => {
                warn!("Gateway key refresh failed: {}", err);
                let failure = Arc::new(err);
                let shared = SharedFailure::error(&failure);
                record.failure = Some(failure);
                Err(shared)
            }
        };

        self.generation.store(record.generation, Ordering::Release);
        result
    }

    async fn fetch_key_set(&self) -> Result<KeySet, Error> {
        let fetched = tokio::time::timeout(self.refresh_timeout, self.fetcher.fetch())
            .await
            .map_err(|_| {
                key_error(
                    KeyErrorKind::FetchFailed,
                    &format!("Key refresh timed out after {:?}", self.refresh_timeout),
                )
            })?
            .map_err(|err| match err.error_kind {
                ErrorKind::Key(KeyErrorKind::FetchFailed) => err,
                _ => key_error_from(KeyErrorKind::FetchFailed, err),
            })?;

        let ttl = fetched.ttl.unwrap_or(self.default_ttl);
        KeySet::from_pems(&fetched.pems, self.clock.now(), ttl)
    }
}
