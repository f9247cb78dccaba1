//! RSA PKCS#1 v1.5 with SHA-256 signature verifier.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1v15::Signature;
use rsa::signature::Verifier;
use tracing::{debug, warn};

use super::AsymmetricVerifier;
use crate::error::{key_error, payload_error, Error, KeyErrorKind, PayloadErrorKind};
use crate::keys::KeyTrustStore;

/// Verifies RSA-SHA256 signatures against every key in the trust store.
///
/// Several keys may be active at once during a rotation, so a signature is
/// accepted as soon as any of them validates it.
pub struct RsaSha256Verifier {
    store: Arc<KeyTrustStore>,
}

impl RsaSha256Verifier {
    pub fn new(store: Arc<KeyTrustStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<KeyTrustStore> {
        &self.store
    }
}

fn decode_signature(signature: &str) -> Result<Signature, Error> {
    let bytes = STANDARD.decode(signature.trim()).map_err(|e| {
        payload_error(
            PayloadErrorKind::MalformedInput,
            &format!("Signature is not valid base64: {}", e),
        )
    })?;
    if bytes.is_empty() {
        return Err(payload_error(PayloadErrorKind::MalformedInput, "Signature is empty"));
    }

    Signature::try_from(bytes.as_slice()).map_err(|e| {
        payload_error(
            PayloadErrorKind::MalformedInput,
            &format!("Signature is not a valid RSA signature: {}", e),
        )
    })
}

#[async_trait]
impl AsymmetricVerifier for RsaSha256Verifier {
    async fn verify(&self, message: &str, signature: &str) -> Result<bool, Error> {
        // Decode before touching the store so malformed input never costs a fetch.
        let signature = decode_signature(signature)?;
        let keys = self.store.current_keys().await?;

        let matched = keys
            .keys()
            .iter()
            .position(|key| key.verifying_key().verify(message.as_bytes(), &signature).is_ok());

        match matched {
            Some(index) => {
                debug!("Callback signature verified with gateway key #{}", index);
                Ok(true)
            }
            None => {
                warn!(
                    "Callback signature rejected by all {} trusted gateway key(s)",
                    keys.keys().len()
                );
                Ok(false)
            }
        }
    }

    async fn public_key(&self) -> Result<String, Error> {
        let keys = self.store.current_keys().await?;
        keys.primary()
            .map(|key| key.pem().to_string())
            .ok_or_else(|| key_error(KeyErrorKind::Unavailable, "Key set is empty"))
    }

    async fn refresh_public_key(&self) -> Result<(), Error> {
        self.store.refresh().await.map(|_| ())
    }
}
