//! Bounded worker pool for password-based key derivation.
//!
//! Each derivation holds one worker permit plus one memory permit per KiB
//! of its Argon2 memory cost for as long as it runs on the blocking thread
//! pool. Concurrent unlocks therefore can never together allocate more than
//! the configured budget. A record whose cost exceeds the whole budget fails
//! straight away with `ResourceExhaustion`.

use crate::config::EnclaveConfig;
use crate::error::{EnclaveError, EnclaveResult};
use privtx_crypto::{
    Argon2Kdf, CryptoError, KdfOptions, KeyPair, KeyProtector, PasswordKdf, PrivateKey,
    ProtectedKeyRecord, SalsaBoxProvider,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Runs key protection and unlocking on the blocking pool under a
/// concurrency and memory budget.
pub struct UnlockPool<K = Argon2Kdf> {
    protector: Arc<KeyProtector<K>>,
    workers: Arc<Semaphore>,
    memory: Arc<Semaphore>,
    max_workers: usize,
    memory_budget_kib: u32,
}

impl<K> Clone for UnlockPool<K> {
    fn clone(&self) -> Self {
        Self {
            protector: Arc::clone(&self.protector),
            workers: Arc::clone(&self.workers),
            memory: Arc::clone(&self.memory),
            max_workers: self.max_workers,
            memory_budget_kib: self.memory_budget_kib,
        }
    }
}

/// Permits held for the duration of one derivation.
struct Permits {
    _worker: OwnedSemaphorePermit,
    _memory: OwnedSemaphorePermit,
}

impl UnlockPool {
    /// Argon2 pool whose per-derivation ceiling is the whole memory budget.
    pub fn new(config: &EnclaveConfig) -> EnclaveResult<Self> {
        Self::with_kdf(config, Argon2Kdf::new(config.kdf_memory_budget_kib))
    }
}

impl<K: PasswordKdf + 'static> UnlockPool<K> {
    /// Validates `config` and builds a pool deriving keys with `kdf`.
    pub fn with_kdf(config: &EnclaveConfig, kdf: K) -> EnclaveResult<Self> {
        config.validate()?;
        let protector = KeyProtector::with_primitives(kdf, SalsaBoxProvider, config.kdf);
        Ok(Self {
            protector: Arc::new(protector),
            workers: Arc::new(Semaphore::new(config.max_concurrent_unlocks)),
            memory: Arc::new(Semaphore::new(config.kdf_memory_budget_kib as usize)),
            max_workers: config.max_concurrent_unlocks,
            memory_budget_kib: config.kdf_memory_budget_kib,
        })
    }

    pub fn protector(&self) -> &KeyProtector<K> {
        &self.protector
    }

    /// Number of derivations that could start right now.
    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Memory (KiB) not currently held by running derivations.
    pub fn available_memory_kib(&self) -> usize {
        self.memory.available_permits()
    }

    /// Opens a locked record with `password`.
    pub async fn unlock(
        &self,
        record: ProtectedKeyRecord,
        password: Zeroizing<String>,
    ) -> EnclaveResult<PrivateKey> {
        let permits = self.acquire(&record.kdf_options).await?;
        self.run_unlock(permits, record, password).await
    }

    /// Like [`UnlockPool::unlock`], but returns `Ok(None)` without deriving
    /// anything if `cancel` is set once the permits are granted.
    pub async fn unlock_unless_cancelled(
        &self,
        record: ProtectedKeyRecord,
        password: Zeroizing<String>,
        cancel: &AtomicBool,
    ) -> EnclaveResult<Option<PrivateKey>> {
        let permits = self.acquire(&record.kdf_options).await?;
        if cancel.load(Ordering::Acquire) {
            debug!("unlock cancelled before derivation");
            return Ok(None);
        }
        self.run_unlock(permits, record, password).await.map(Some)
    }

    /// Seals `key` under `password` with the configured default options.
    pub async fn protect(
        &self,
        key: PrivateKey,
        password: Zeroizing<String>,
    ) -> EnclaveResult<ProtectedKeyRecord> {
        let options = *self.protector.default_options();
        let permits = self.acquire(&options).await?;
        let protector = Arc::clone(&self.protector);
        let record = tokio::task::spawn_blocking(move || {
            let _permits = permits;
            protector.encrypt_private_key(&key, &password)
        })
        .await
        .map_err(|e| EnclaveError::Worker(format!("spawn_blocking panicked: {e}")))??;
        Ok(record)
    }

    /// Generates a new key pair and seals it under `password`.
    pub async fn generate(
        &self,
        password: Zeroizing<String>,
    ) -> EnclaveResult<(KeyPair, ProtectedKeyRecord)> {
        let options = *self.protector.default_options();
        let permits = self.acquire(&options).await?;
        let protector = Arc::clone(&self.protector);
        let generated = tokio::task::spawn_blocking(move || {
            let _permits = permits;
            protector.generate_protected_key(&password)
        })
        .await
        .map_err(|e| EnclaveError::Worker(format!("spawn_blocking panicked: {e}")))??;
        Ok(generated)
    }

    /// Stops accepting work. Derivations already running finish.
    pub fn close(&self) {
        self.workers.close();
        self.memory.close();
    }

    async fn run_unlock(
        &self,
        permits: Permits,
        record: ProtectedKeyRecord,
        password: Zeroizing<String>,
    ) -> EnclaveResult<PrivateKey> {
        let protector = Arc::clone(&self.protector);
        let result = tokio::task::spawn_blocking(move || {
            let _permits = permits;
            protector.decrypt_private_key(&record, &password)
        })
        .await
        .map_err(|e| EnclaveError::Worker(format!("spawn_blocking panicked: {e}")))?;

        match &result {
            Ok(_) => info!("private key unlocked"),
            Err(e) => debug!("unlock failed: {e}"),
        }
        Ok(result?)
    }

    async fn acquire(&self, options: &KdfOptions) -> EnclaveResult<Permits> {
        if options.memory > self.memory_budget_kib {
            return Err(CryptoError::ResourceExhaustion(format!(
                "kdf memory cost {} KiB exceeds the {} KiB unlock budget",
                options.memory, self.memory_budget_kib
            ))
            .into());
        }

        if self.workers.available_permits() == 0 {
            debug!("unlock pool saturated, waiting for a worker");
        }
        let closed =
            |_| EnclaveError::from(CryptoError::ResourceExhaustion("unlock pool closed".to_string()));
        let worker = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(closed)?;
        let memory = Arc::clone(&self.memory)
            .acquire_many_owned(options.memory)
            .await
            .map_err(closed)?;

        Ok(Permits {
            _worker: worker,
            _memory: memory,
        })
    }
}
