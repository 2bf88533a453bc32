//! Fixed-length key, nonce and salt types.
//!
//! Secret-bearing types ([`PrivateKey`], [`SymmetricKey`]) are not `Clone`,
//! redact themselves in `Debug`, never implement `Serialize`, and zero their
//! bytes on drop.

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use crate::random;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of public, private and symmetric keys in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of a nonce in bytes (XSalsa20 / XChaCha20).
pub const NONCE_SIZE: usize = 24;

/// Size of a KDF salt in bytes.
pub const SALT_SIZE: usize = 16;

/// A raw X25519 public key. Used as a recipient identity and as the lookup
/// key for recipient boxes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; KEY_SIZE]);

impl PublicKey {
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parses a public key from a slice, rejecting any length other than 32.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidRecipient(format!(
                "public key must be {KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Parses a standard base64 encoded public key.
    pub fn from_base64(value: &str) -> CryptoResult<Self> {
        encoding::decode_array(value)
            .map(Self)
            .map_err(|e| CryptoError::InvalidRecipient(format!("malformed public key: {e}")))
    }

    pub fn to_base64(&self) -> String {
        encoding::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// An all-zero key is never a valid X25519 identity.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base64())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        encoding::decode_array(&value)
            .map(Self)
            .map_err(|e| serde::de::Error::custom(format!("malformed public key: {e}")))
    }
}

/// Raw private key material.
///
/// Only ever exists decrypted in memory, owned by whichever operation
/// unlocked or generated it.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; KEY_SIZE]);

impl PrivateKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generates a fresh random private key.
    pub fn generate() -> CryptoResult<Self> {
        let mut key = Self([0u8; KEY_SIZE]);
        random::fill(&mut key.0)?;
        Ok(key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// A 32-byte symmetric key: a KDF output or a per-message payload key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generates a fresh random key.
    pub fn random() -> CryptoResult<Self> {
        let mut key = Self([0u8; KEY_SIZE]);
        random::fill(&mut key.0)?;
        Ok(key)
    }

    /// Rebuilds a key from an opened box. Anything but 32 bytes means the
    /// box did not hold a key, which is reported like any other failed open.
    pub(crate) fn from_opened(mut bytes: Vec<u8>) -> CryptoResult<Self> {
        let result = <[u8; KEY_SIZE]>::try_from(bytes.as_slice())
            .map(Self)
            .map_err(|_| CryptoError::Decryption);
        bytes.zeroize();
        result
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8; KEY_SIZE] {
        &mut self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// A 24-byte nonce, drawn fresh for every seal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    pub const fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn random() -> CryptoResult<Self> {
        random::array().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        encoding::encode(&self.0)
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", self.to_base64())
    }
}

impl Serialize for Nonce {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Nonce {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        encoding::decode_array(&value)
            .map(Self)
            .map_err(|e| serde::de::Error::custom(format!("malformed nonce: {e}")))
    }
}

/// Salt for password-based key derivation.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub const fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn random() -> CryptoResult<Self> {
        random::array().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", encoding::encode(&self.0))
    }
}

impl Serialize for Salt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encoding::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        encoding::decode_array(&value)
            .map(Self)
            .map_err(|e| serde::de::Error::custom(format!("malformed salt: {e}")))
    }
}

/// An X25519 key pair.
#[derive(Debug)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}
