use std::path::PathBuf;

use thiserror::Error;

use crate::password::Rejection;

/// Represents errors that can occur while provisioning or reading a keystore.
///
/// Every failure is fatal to the operation that raised it; nothing in this
/// crate retries.
#[derive(Debug, Error)]
pub enum PkiError {
    /// The keystore file is already there. It is never overwritten.
    #[error("Keystore file already exists: {}", .0.display())]
    FileAlreadyExists(PathBuf),

    /// Password and its confirmation differ.
    #[error("Password confirmation does not match")]
    PasswordMismatch,

    /// Some other precondition of the operation does not hold.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The password was rejected by the strength policy.
    #[error("Weak password: {0}")]
    WeakPassword(Rejection),

    /// Key generation, signing or encryption failed.
    #[error("Crypto provider error: {0}")]
    CryptoProvider(String),

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error related to certificate operations.
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// Keystore MAC did not verify, usually a wrong password.
    #[error("Keystore integrity check failed: {0}")]
    Integrity(String),

    /// Invalid provisioning configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PkiError {
    /// True for the errors that mean "do not proceed" before any work was done.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PkiError::FileAlreadyExists(_) | PkiError::PasswordMismatch | PkiError::Precondition(_)
        )
    }
}

impl From<der::Error> for PkiError {
    /// Converts a `der::Error` into a `PkiError`.
    fn from(err: der::Error) -> Self {
        PkiError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for PkiError {
    fn from(err: rsa::Error) -> Self {
        PkiError::CryptoProvider(err.to_string())
    }
}

impl From<rsa::signature::Error> for PkiError {
    fn from(err: rsa::signature::Error) -> Self {
        PkiError::CryptoProvider(err.to_string())
    }
}

impl From<pkcs8::Error> for PkiError {
    fn from(err: pkcs8::Error) -> Self {
        PkiError::CryptoProvider(err.to_string())
    }
}

impl From<pkcs5::Error> for PkiError {
    fn from(err: pkcs5::Error) -> Self {
        PkiError::CryptoProvider(err.to_string())
    }
}

impl From<x509_cert::spki::Error> for PkiError {
    fn from(err: x509_cert::spki::Error) -> Self {
        PkiError::EncodingError(err.to_string())
    }
}

impl From<toml::de::Error> for PkiError {
    fn from(err: toml::de::Error) -> Self {
        PkiError::Config(err.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PkiError>;
