//! Asymmetric (public key) callback signature verification.

mod rsa_sha256;

pub use rsa_sha256::RsaSha256Verifier;

use async_trait::async_trait;

use crate::error::Error;

/// Trait for verifying detached callback signatures with the gateway's public keys.
///
/// Unlike the symmetric facade path, failures here are errors rather than
/// `false`: a malformed signature or an unreachable key endpoint means the
/// callback could not be checked, which callers must not treat as rejected
/// and safe to ignore.
#[async_trait]
pub trait AsymmetricVerifier: Send + Sync {
    /// Verify a base64 signature over `message`.
    ///
    /// # Returns
    ///
    /// `true` if a currently trusted key validates the signature, `false` if
    /// every trusted key rejects it.
    async fn verify(&self, message: &str, signature: &str) -> Result<bool, Error>;

    /// PEM of the primary trusted key, fetching it if needed.
    async fn public_key(&self) -> Result<String, Error>;

    /// Refetch the trusted keys now.
    async fn refresh_public_key(&self) -> Result<(), Error>;
}
