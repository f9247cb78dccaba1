//! Test doubles for the key store: a manual clock, a scripted fetcher and RSA helpers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::Sha256;

use super::{Clock, FetchedKeys, KeyFetcher};
use crate::error::{key_error, Error, KeyErrorKind};

pub(crate) fn generate_private_key() -> RsaPrivateKey {
    RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap()
}

pub(crate) fn public_pem(private_key: &RsaPrivateKey) -> String {
    private_key
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .unwrap()
}

/// RSA-SHA256 PKCS#1 v1.5 signature over `message`, base64-encoded.
pub(crate) fn sign_base64(private_key: &RsaPrivateKey, message: &str) -> String {
    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    STANDARD.encode(signing_key.sign(message.as_bytes()).to_bytes())
}

pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Fetcher that replays queued responses and counts calls.
pub(crate) struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<FetchedKeys, KeyErrorKind>>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn push_keys(&self, pems: Vec<String>, ttl: Option<Duration>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(FetchedKeys { pems, ttl }));
    }

    pub(crate) fn push_failure(&self) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(KeyErrorKind::FetchFailed));
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyFetcher for ScriptedFetcher {
    async fn fetch(&self) -> Result<FetchedKeys, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(keys)) => Ok(keys),
            Some(Err(kind)) => Err(key_error(kind, "scripted failure")),
            None => Err(key_error(KeyErrorKind::FetchFailed, "no scripted response")),
        }
    }
}
