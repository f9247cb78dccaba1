//! Parsed, time-stamped public key set.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::VerifyingKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use sha2::Sha256;
use tracing::warn;

use crate::error::{key_error, Error, KeyErrorKind};

/// One active gateway key, kept as received and as a ready verifier.
#[derive(Clone)]
pub struct TrustedKey {
    pem: String,
    verifying_key: VerifyingKey<Sha256>,
}

impl TrustedKey {
    /// Parse a SubjectPublicKeyInfo (`PUBLIC KEY`) or PKCS#1
    /// (`RSA PUBLIC KEY`) PEM block.
    pub fn from_pem(pem: &str) -> Result<Self, Error> {
        let public_key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| {
                key_error(
                    KeyErrorKind::InvalidKey,
                    &format!("Unparseable RSA public key: {}", e),
                )
            })?;

        Ok(Self {
            pem: pem.to_string(),
            verifying_key: VerifyingKey::new(public_key),
        })
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    pub fn verifying_key(&self) -> &VerifyingKey<Sha256> {
        &self.verifying_key
    }
}

impl fmt::Debug for TrustedKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TrustedKey").field("pem", &self.pem).finish()
    }
}

/// All keys from one successful refresh. Replaced wholesale, never edited.
#[derive(Debug, Clone)]
pub struct KeySet {
    keys: Vec<TrustedKey>,
    fetched_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl KeySet {
    /// Build a key set from PEM blocks, skipping blocks that do not parse.
    ///
    /// # Returns
    ///
    /// The key set, or a `FetchFailed` error if no block parsed.
    pub fn from_pems(pems: &[String], fetched_at: DateTime<Utc>, ttl: Duration) -> Result<Self, Error> {
        let keys: Vec<TrustedKey> = pems
            .iter()
            .filter_map(|pem| match TrustedKey::from_pem(pem) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!("Skipping gateway public key: {}", e);
                    None
                }
            })
            .collect();

        if keys.is_empty() {
            return Err(key_error(
                KeyErrorKind::FetchFailed,
                "Key endpoint returned no usable public keys",
            ));
        }

        Ok(Self::new(keys, fetched_at, ttl))
    }

    pub fn new(keys: Vec<TrustedKey>, fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| fetched_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            keys,
            fetched_at,
            expires_at,
        }
    }

    /// Keys in the order the endpoint listed them.
    pub fn keys(&self) -> &[TrustedKey] {
        &self.keys
    }

    /// The first listed key.
    pub fn primary(&self) -> Option<&TrustedKey> {
        self.keys.first()
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// True while `now` is before the expiry time.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::testing::{generate_private_key, public_pem};
    use rsa::pkcs1::EncodeRsaPublicKey;
    use rsa::pkcs8::LineEnding;

    #[test]
    fn test_parses_spki_and_pkcs1_pem() {
        let private_key = generate_private_key();
        let spki = public_pem(&private_key);
        let pkcs1 = private_key
            .to_public_key()
            .to_pkcs1_pem(LineEnding::LF)
            .unwrap();

        assert!(TrustedKey::from_pem(&spki).is_ok());
        assert!(TrustedKey::from_pem(&pkcs1).is_ok());
    }

    #[test]
    fn test_rejects_garbage_pem() {
        let err = TrustedKey::from_pem("-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n")
            .unwrap_err();
        assert_eq!(err.error_kind, crate::ErrorKind::Key(KeyErrorKind::InvalidKey));
    }

    #[test]
    fn test_from_pems_skips_unparseable_blocks() {
        let pem = public_pem(&generate_private_key());
        let pems = vec!["not a key".to_string(), pem.clone()];

        let set = KeySet::from_pems(&pems, Utc::now(), Duration::from_secs(60)).unwrap();
        assert_eq!(set.keys().len(), 1);
        assert_eq!(set.primary().map(TrustedKey::pem), Some(pem.as_str()));
    }

    #[test]
    fn test_from_pems_with_no_usable_keys_fails() {
        let err = KeySet::from_pems(&["junk".to_string()], Utc::now(), Duration::from_secs(60))
            .unwrap_err();
        assert_eq!(err.error_kind, crate::ErrorKind::Key(KeyErrorKind::FetchFailed));
    }

    #[test]
    fn test_freshness_window() {
        let pem = public_pem(&generate_private_key());
        let fetched_at = Utc::now();
        let set = KeySet::from_pems(&[pem], fetched_at, Duration::from_secs(60)).unwrap();

        assert!(set.is_fresh(fetched_at));
        assert!(set.is_fresh(fetched_at + chrono::Duration::seconds(59)));
        assert!(!set.is_fresh(fetched_at + chrono::Duration::seconds(60)));
        assert_eq!(set.fetched_at(), fetched_at);
    }
}
