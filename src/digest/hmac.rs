//! HMAC-SHA256 callback digest.

use std::borrow::Cow;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::DigestAlgorithm;
use crate::error::{key_error, Error, KeyErrorKind};
use crate::validator::Algorithm;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 digest over `:`-joined fields.
///
/// The output is uppercase hex. Gateways compare it against the uppercased
/// `signature` field, so the casing is part of the wire format.
pub struct HmacDigest {
    secret: SecretString,
}

impl HmacDigest {
    /// Create a new HMAC digest.
    ///
    /// # Arguments
    ///
    /// * `secret` - Merchant secret key, hex-encoded or raw
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }
}

/// Turn a secret key string into HMAC key bytes.
///
/// A non-empty, even-length string made only of hex digits (either case) is
/// hex-decoded; anything else is used as its raw UTF-8 bytes.
pub fn normalize_key(secret: &str) -> Cow<'_, [u8]> {
    let is_hex = !secret.is_empty()
        && secret.len() % 2 == 0
        && secret.bytes().all(|b| b.is_ascii_hexdigit());

    if is_hex {
        if let Ok(bytes) = hex::decode(secret) {
            return Cow::Owned(bytes);
        }
    }
    Cow::Borrowed(secret.as_bytes())
}

impl DigestAlgorithm for HmacDigest {
    fn algorithm(&self) -> Algorithm {
        Algorithm::HmacSha256
    }

    fn compute(&self, fields: &[&str]) -> Result<String, Error> {
        let message = fields.join(":");
        let key = normalize_key(self.secret.expose_secret());

        let mut mac = HmacSha256::new_from_slice(&key)
            .map_err(|_| key_error(KeyErrorKind::InvalidKey, "Invalid HMAC key"))?;
        mac.update(message.as_bytes());

        Ok(hex::encode_upper(mac.finalize().into_bytes()))
    }
}
