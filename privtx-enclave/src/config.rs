//! Enclave configuration.

use crate::error::{EnclaveError, EnclaveResult};
use privtx_crypto::{KdfOptions, PublicKey};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

/// Configuration for the enclave and its unlock pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnclaveConfig {
    /// KDF options recorded in newly protected keys.
    pub kdf: KdfOptions,

    /// Maximum number of key derivations running at once.
    pub max_concurrent_unlocks: usize,

    /// Total memory (KiB) concurrent derivations may hold between them.
    pub kdf_memory_budget_kib: u32,

    /// Keys added as recipients to every payload this enclave encrypts.
    pub forwarding_keys: Vec<PublicKey>,
}

impl Default for EnclaveConfig {
    fn default() -> Self {
        Self {
            kdf: KdfOptions::default(),
            max_concurrent_unlocks: 2,
            kdf_memory_budget_kib: 2 * 1024 * 1024, // 2 GiB
            forwarding_keys: Vec::new(),
        }
    }
}

impl EnclaveConfig {
    /// Parses and validates a JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> EnclaveResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EnclaveError::Config(format!("malformed enclave config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that cannot work. Nothing is corrected.
    pub fn validate(&self) -> EnclaveResult<()> {
        if self.max_concurrent_unlocks == 0 {
            return Err(EnclaveError::Config(
                "max_concurrent_unlocks must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_unlocks > Semaphore::MAX_PERMITS {
            return Err(EnclaveError::Config(format!(
                "max_concurrent_unlocks must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if !budget_fits_permits(self.kdf_memory_budget_kib) {
            return Err(EnclaveError::Config(format!(
                "kdf_memory_budget_kib {} exceeds the {} permits this platform can track",
                self.kdf_memory_budget_kib,
                Semaphore::MAX_PERMITS
            )));
        }
        self.kdf
            .validate()
            .map_err(|e| EnclaveError::Config(e.to_string()))?;
        if self.kdf.memory > self.kdf_memory_budget_kib {
            return Err(EnclaveError::Config(format!(
                "default kdf memory {} KiB exceeds the {} KiB budget",
                self.kdf.memory, self.kdf_memory_budget_kib
            )));
        }
        if self.forwarding_keys.iter().any(PublicKey::is_zero) {
            return Err(EnclaveError::Config(
                "forwarding key must not be all zeros".to_string(),
            ));
        }
        Ok(())
    }

    /// Cheap KDF settings for tests.
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            kdf: KdfOptions::new(privtx_crypto::KdfVariant::Id, 64, 1, 1),
            max_concurrent_unlocks: 2,
            kdf_memory_budget_kib: 1024,
            forwarding_keys: Vec::new(),
        }
    }
}

/// The memory budget is tracked as one semaphore permit per KiB.
fn budget_fits_permits(budget_kib: u32) -> bool {
    usize::try_from(budget_kib).is_ok_and(|permits| permits <= Semaphore::MAX_PERMITS)
}
