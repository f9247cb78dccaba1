//! Legacy SHA-1 callback digest.
//!
//! Retained for integrations that still post a `digest` field. New
//! integrations sign with HMAC-SHA256 instead.

use secrecy::{ExposeSecret, SecretString};
use sha1::{Digest, Sha1};

use super::DigestAlgorithm;
use crate::error::Error;
use crate::validator::Algorithm;

/// SHA-1 over the fields concatenated with the merchant password, no separator.
pub struct LegacyDigest {
    password: SecretString,
}

impl LegacyDigest {
    pub fn new(password: SecretString) -> Self {
        Self { password }
    }
}

impl DigestAlgorithm for LegacyDigest {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Sha1Legacy
    }

    fn compute(&self, fields: &[&str]) -> Result<String, Error> {
        let mut hasher = Sha1::new();
        for field in fields {
            hasher.update(field.as_bytes());
        }
        hasher.update(self.password.expose_secret().as_bytes());

        Ok(hex::encode(hasher.finalize()))
    }
}
