//! Error types for the `callback-auth` crate.
//!
//! A root Error struct carries an error kind and an optional source for chaining.
//! A signature that is well-formed but does not match is never an error; it is
//! reported as a `false` verdict.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for callback-auth crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in callback-auth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Payload(PayloadErrorKind),
    Key(KeyErrorKind),
    Http(HttpErrorKind),
}

/// Errors from inspecting a callback payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadErrorKind {
    /// A required field is absent.
    MissingField,
    /// A field is present but cannot be interpreted (bad base64, non-numeric amount).
    MalformedInput,
}

/// Errors from the public key trust store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyErrorKind {
    /// No usable key is cached and none could be obtained.
    Unavailable,
    /// Fetching or parsing keys from the key endpoint failed.
    FetchFailed,
    /// Key material could not be used to build a verifier.
    InvalidKey,
}

/// Errors from HTTP client operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    BuilderFailed,
    RequestFailed,
    Network,
}

impl Error {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.error_kind
    }

    /// True when retrying after a key refresh could change the outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.error_kind,
            ErrorKind::Key(KeyErrorKind::Unavailable | KeyErrorKind::FetchFailed)
                | ErrorKind::Http(HttpErrorKind::Network | HttpErrorKind::RequestFailed)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Payload(kind) => write!(f, "Payload error: {:?}", kind)?,
            ErrorKind::Key(kind) => write!(f, "Key error: {:?}", kind)?,
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}", kind)?,
        }
        if let Some(source) = &self.source {
            write!(f, " ({})", source)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else if err.is_request() {
            ErrorKind::Http(HttpErrorKind::RequestFailed)
        } else {
            ErrorKind::Http(HttpErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(err: reqwest_middleware::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Http(HttpErrorKind::Network),
        }
    }
}

/// Helper function to create payload errors.
pub fn payload_error(kind: PayloadErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Payload(kind),
    }
}

/// Helper function to create key errors.
pub fn key_error(kind: KeyErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Key(kind),
    }
}

/// Wrap an underlying error as a key error, keeping it as the source.
pub fn key_error_from<E>(kind: KeyErrorKind, err: E) -> Error
where
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    Error {
        source: Some(err.into()),
        error_kind: ErrorKind::Key(kind),
    }
}
