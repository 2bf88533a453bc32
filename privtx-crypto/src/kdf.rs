//! Password-based key derivation.
//!
//! [`PasswordKdf`] is the narrow contract the key protector depends on:
//! `(password, salt, options) -> 32-byte key`. [`Argon2Kdf`] implements it
//! with the memory-hard Argon2 family.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{KEY_SIZE, Salt, SymmetricKey};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Argon2 version 0x10.
pub const ARGON2_VERSION_10: u32 = 0x10;

/// Argon2 version 0x13, the current revision.
pub const ARGON2_VERSION_13: u32 = 0x13;

/// Default ceiling on the memory a single derivation may use: 4 GiB.
pub const DEFAULT_MAX_MEMORY_KIB: u32 = 4 * 1024 * 1024;

/// Argon2 algorithm family. Serialized as the lowercase suffix
/// (`"i"`, `"d"`, `"id"`); unknown names fail to parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfVariant {
    I,
    D,
    Id,
}

impl From<KdfVariant> for Algorithm {
    fn from(variant: KdfVariant) -> Self {
        match variant {
            KdfVariant::I => Algorithm::Argon2i,
            KdfVariant::D => Algorithm::Argon2d,
            KdfVariant::Id => Algorithm::Argon2id,
        }
    }
}

/// Cost parameters for a derivation.
///
/// Stored verbatim in every protected key record so the record is always
/// opened with the parameters it was sealed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfOptions {
    pub variant: KdfVariant,
    /// Memory cost in KiB.
    pub memory: u32,
    pub iterations: u32,
    pub parallelism: u32,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    ARGON2_VERSION_13
}

impl Default for KdfOptions {
    fn default() -> Self {
        Self {
            variant: KdfVariant::Id,
            memory: 1_048_576, // 1 GiB
            iterations: 10,
            parallelism: 4,
            version: ARGON2_VERSION_13,
        }
    }
}

impl KdfOptions {
    pub fn new(variant: KdfVariant, memory: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            variant,
            memory,
            iterations,
            parallelism,
            version: ARGON2_VERSION_13,
        }
    }

    /// Checks the parameters against what Argon2 accepts.
    pub fn validate(&self) -> CryptoResult<()> {
        self.argon2_version()?;
        self.argon2_params()?;
        Ok(())
    }

    fn argon2_version(&self) -> CryptoResult<Version> {
        match self.version {
            ARGON2_VERSION_10 => Ok(Version::V0x10),
            ARGON2_VERSION_13 => Ok(Version::V0x13),
            other => Err(CryptoError::Configuration(format!(
                "unsupported argon2 version {other}"
            ))),
        }
    }

    fn argon2_params(&self) -> CryptoResult<Params> {
        Params::new(self.memory, self.iterations, self.parallelism, Some(KEY_SIZE))
            .map_err(|e| CryptoError::Configuration(format!("invalid argon2 parameters: {e}")))
    }
}

/// Memory-hard password hashing.
pub trait PasswordKdf: Send + Sync {
    /// Derives a 32-byte key from `password` and `salt` using exactly the
    /// given options.
    fn derive(&self, password: &str, salt: &Salt, options: &KdfOptions)
    -> CryptoResult<SymmetricKey>;
}

/// Argon2 key derivation with a per-call memory ceiling.
///
/// Options asking for more memory than the ceiling fail with
/// [`CryptoError::ResourceExhaustion`]; they are never scaled down.
#[derive(Clone, Debug)]
pub struct Argon2Kdf {
    max_memory_kib: u32,
}

impl Argon2Kdf {
    pub fn new(max_memory_kib: u32) -> Self {
        Self { max_memory_kib }
    }

    pub fn max_memory_kib(&self) -> u32 {
        self.max_memory_kib
    }
}

impl Default for Argon2Kdf {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEMORY_KIB)
    }
}

impl PasswordKdf for Argon2Kdf {
    fn derive(
        &self,
        password: &str,
        salt: &Salt,
        options: &KdfOptions,
    ) -> CryptoResult<SymmetricKey> {
        if options.memory > self.max_memory_kib {
            return Err(CryptoError::ResourceExhaustion(format!(
                "argon2 memory cost {} KiB exceeds the {} KiB limit",
                options.memory, self.max_memory_kib
            )));
        }

        let version = options.argon2_version()?;
        let params = options.argon2_params()?;
        let argon2 = Argon2::new(options.variant.into(), version, params);

        debug!(
            variant = ?options.variant,
            memory_kib = options.memory,
            iterations = options.iterations,
            parallelism = options.parallelism,
            "deriving key"
        );

        let mut key = SymmetricKey::from_bytes([0u8; KEY_SIZE]);
        argon2
            .hash_password_into(password.as_bytes(), salt.as_bytes(), key.as_mut_bytes())
            .map_err(|e| match e {
                argon2::Error::MemoryTooMuch => {
                    CryptoError::ResourceExhaustion(format!("argon2 allocation failed: {e}"))
                }
                other => CryptoError::Configuration(format!("argon2 derivation failed: {other}")),
            })?;

        Ok(key)
    }
}
