//! Error types for key protection and payload encryption.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in crypto operations.
///
/// No variant ever carries key bytes, derived keys or passwords.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// An authenticated open failed. Wrong password, wrong key and tampered
    /// ciphertext all produce this same variant.
    #[error("decryption failed (wrong key or tampered data)")]
    Decryption,

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("resource exhausted: {0}")]
    ResourceExhaustion(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
