//! Cryptographic core of the privtx transaction manager.
//!
//! Provides:
//! - Password protection of private keys at rest (Argon2 -> XChaCha20-Poly1305)
//! - Multi-recipient payload encryption with per-recipient key boxes
//!   (X25519 + XSalsa20-Poly1305)
//! - Raw (sender-only) transactions that receive recipients later
//! - Secret key types that zero themselves on drop
//!
//! # Architecture
//!
//! Payloads use a two-tier key system:
//!
//! 1. **Payload Key**: A random key generated per message. The message body
//!    is encrypted exactly once under it.
//!
//! 2. **Recipient Box**: The payload key sealed for one recipient under the
//!    shared key between the sealing party and the recipient.
//!
//! This architecture allows:
//! - An arbitrary, growing recipient set over one ciphertext
//! - Adding recipients without the plaintext or the sender's key
//! - Deciding recipients after the bulk encryption (raw transactions)

mod encoding;
mod error;
pub mod kdf;
mod key;
pub mod payload;
pub mod protector;
pub mod provider;
pub mod random;
pub mod record;

pub use error::{CryptoError, CryptoResult};
pub use kdf::{Argon2Kdf, KdfOptions, KdfVariant, PasswordKdf};
pub use key::{
    KEY_SIZE, KeyPair, NONCE_SIZE, Nonce, PrivateKey, PublicKey, SALT_SIZE, Salt, SymmetricKey,
};
pub use payload::{EncodedPayload, PayloadEngine, RawTransaction, RecipientBox};
pub use protector::KeyProtector;
pub use provider::{BoxProvider, SalsaBoxProvider, SalsaSharedKey};
pub use record::{LockState, ProtectedKeyRecord};
