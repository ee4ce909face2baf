//! Error types for key operations.

use thiserror::Error;

/// Errors that can occur while decoding keys or loading credentials.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The key uses a curve other than ed25519.
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The base58 payload could not be decoded.
    #[error("Invalid base58 key data: {0}")]
    InvalidEncoding(String),

    /// The decoded key has the wrong number of bytes.
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The public half of a 64-byte secret key does not match its seed.
    #[error("Secret key does not match its embedded public key")]
    PublicKeyMismatch,

    /// The credentials file could not be read.
    #[error("Failed to read credentials from {path}: {source}")]
    CredentialsIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The credentials file is not valid JSON or lacks a private key.
    #[error("Invalid credentials file {path}: {reason}")]
    InvalidCredentials { path: String, reason: String },
}
