//! Callback validation facade.
//!
//! [`SignatureValidator::validate`] classifies a payload once by its shape and
//! always returns a verdict. The symmetric paths never fail: a missing field,
//! an unparseable amount or a mismatched digest all degrade to `valid: false`
//! so the callback endpoint can answer deterministically.

use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::digest::{constant_time_eq, DigestAlgorithm, HmacDigest, LegacyDigest};
use crate::error::Error;
use crate::payload::{CallbackPayload, SignatureKind, DIGEST, DIGEST_FIELDS, SIGNATURE, SIGNED_FIELDS};
use crate::verifier::AsymmetricVerifier;

/// Algorithm a verdict was reached with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "hmac-sha256")]
    HmacSha256,
    #[serde(rename = "sha1-legacy")]
    Sha1Legacy,
    #[serde(rename = "asymmetric")]
    Asymmetric,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::HmacSha256 => "hmac-sha256",
            Algorithm::Sha1Legacy => "sha1-legacy",
            Algorithm::Asymmetric => "asymmetric",
            Algorithm::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating one callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationVerdict {
    pub valid: bool,
    pub algorithm: Algorithm,
}

impl VerificationVerdict {
    pub fn new(valid: bool, algorithm: Algorithm) -> Self {
        Self { valid, algorithm }
    }
}

/// Fields that must all be present before an HMAC signature is checked.
const HMAC_REQUIRED: [&str; 6] = [
    SIGNED_FIELDS[0],
    SIGNED_FIELDS[1],
    SIGNED_FIELDS[2],
    SIGNED_FIELDS[3],
    SIGNED_FIELDS[4],
    SIGNATURE,
];

/// Validates callbacks signed with the merchant's shared secret.
pub struct SignatureValidator {
    hmac: HmacDigest,
    legacy: LegacyDigest,
}

impl SignatureValidator {
    /// Create a validator.
    ///
    /// # Arguments
    ///
    /// * `secret` - Merchant secret; the HMAC key and the legacy digest password
    pub fn new(secret: SecretString) -> Self {
        Self {
            hmac: HmacDigest::new(secret.clone()),
            legacy: LegacyDigest::new(secret),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.secret.clone())
    }

    /// Validate a callback, picking the algorithm from the payload shape.
    ///
    /// A `signature` field selects HMAC-SHA256 even when a `digest` is also
    /// present; a lone `digest` selects the legacy SHA-1 check; anything else
    /// is invalid with an unknown algorithm.
    pub fn validate(&self, payload: &CallbackPayload) -> VerificationVerdict {
        match payload.signature_kind() {
            SignatureKind::Hmac { .. } => {
                VerificationVerdict::new(self.validate_hmac_sha256(payload), Algorithm::HmacSha256)
            }
            SignatureKind::Legacy { .. } => {
                VerificationVerdict::new(self.validate_sha1_digest(payload), Algorithm::Sha1Legacy)
            }
            SignatureKind::Unknown => {
                warn!("Callback carries neither a signature nor a digest");
                VerificationVerdict::new(false, Algorithm::Unknown)
            }
        }
    }

    /// Check the `signature` field as an HMAC-SHA256 over
    /// `txnid:refno:status:message:amount`.
    pub fn validate_hmac_sha256(&self, payload: &CallbackPayload) -> bool {
        let missing = payload.missing(&HMAC_REQUIRED);
        if !missing.is_empty() {
            warn!("Rejecting signed callback, missing fields: {:?}", missing);
            return false;
        }

        let (fields, signature) = match (payload.signed_fields(), payload.require(SIGNATURE)) {
            (Ok(fields), Ok(signature)) => (fields, signature),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Rejecting signed callback: {}", e);
                return false;
            }
        };
        let fields: Vec<&str> = fields.iter().map(String::as_str).collect();

        check(&self.hmac, &fields, &signature.to_ascii_uppercase())
    }

    /// Check the `digest` field as the legacy SHA-1 digest. The comparison is
    /// case-sensitive against lowercase hex.
    pub fn validate_sha1_digest(&self, payload: &CallbackPayload) -> bool {
        let missing = payload.missing(&DIGEST_FIELDS);
        let Some(digest) = payload.get(DIGEST) else {
            warn!("Rejecting legacy callback without a digest");
            return false;
        };
        if !missing.is_empty() {
            warn!("Rejecting legacy callback, missing fields: {:?}", missing);
            return false;
        }

        let fields: Vec<&str> = DIGEST_FIELDS
            .iter()
            .filter_map(|name| payload.get(name))
            .collect();

        check(&self.legacy, &fields, digest)
    }

    /// Check the `signature` field as an RSA signature over the same canonical
    /// message as the HMAC path.
    ///
    /// # Returns
    ///
    /// A verdict tagged `asymmetric`, or an error when the callback could not be
    /// checked at all (missing or malformed fields, no trusted key).
    pub async fn validate_asymmetric(
        payload: &CallbackPayload,
        verifier: &dyn AsymmetricVerifier,
    ) -> Result<VerificationVerdict, Error> {
        let signature = payload.require(SIGNATURE)?;
        let message = payload.signed_message()?;

        let valid = verifier.verify(&message, signature).await?;
        Ok(VerificationVerdict::new(valid, Algorithm::Asymmetric))
    }
}

fn check(algorithm: &dyn DigestAlgorithm, fields: &[&str], received: &str) -> bool {
    match algorithm.compute(fields) {
        Ok(computed) => {
            let valid = constant_time_eq(&computed, received);
            if valid {
                debug!("Callback {} digest matched", algorithm.algorithm());
            } else {
                warn!("Callback {} digest mismatch", algorithm.algorithm());
            }
            valid
        }
        Err(e) => {
            warn!("Could not compute {} digest: {}", algorithm.algorithm(), e);
            false
        }
    }
}
