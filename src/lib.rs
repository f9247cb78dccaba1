//! # callback-auth
//!
//! Authentication of payment-gateway callback notifications:
//! - Symmetric digests (HMAC-SHA256 and the legacy SHA-1 digest)
//! - RSA-SHA256 signature verification against the gateway's published keys
//! - A TTL-bounded public key cache with single-flight refresh
//! - A validation facade that picks the algorithm from the payload shape
//!
//! ## Architecture
//!
//! Data flows one way: a [`CallbackPayload`] goes into the [`SignatureValidator`],
//! which classifies it once as a [`SignatureKind`] and dispatches to a
//! [`digest::DigestAlgorithm`] or a [`verifier::AsymmetricVerifier`]. The
//! [`keys::KeyTrustStore`] is the only stateful component.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use callback_auth::{CallbackPayload, SignatureValidator};
//!
//! let validator = SignatureValidator::new(config.secret.clone());
//! let verdict = validator.validate(&payload);
//! if verdict.valid { /* acknowledge callback */ }
//! ```

pub mod config;
pub mod digest;
pub mod error;
pub mod http;
pub mod keys;
pub mod payload;
pub mod validator;
pub mod verifier;

// Re-export commonly used types
pub use config::GatewayConfig;
pub use error::{Error, ErrorKind};
pub use payload::{CallbackPayload, SignatureKind};
pub use validator::{Algorithm, SignatureValidator, VerificationVerdict};
