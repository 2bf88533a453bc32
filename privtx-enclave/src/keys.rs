//! Unlocked key pairs held by the enclave.

use crate::error::{EnclaveError, EnclaveResult};
use crate::pool::UnlockPool;
use privtx_crypto::{
    BoxProvider, KeyPair, PasswordKdf, PrivateKey, ProtectedKeyRecord, PublicKey,
    SalsaBoxProvider,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinSet;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// The enclave's own key pairs plus the forwarding keys every payload is
/// also sealed for. The first key pair is the default sender identity.
#[derive(Debug)]
pub struct KeyManager {
    pairs: Vec<KeyPair>,
    forwarding: BTreeSet<PublicKey>,
}

impl KeyManager {
    pub fn new(
        pairs: Vec<KeyPair>,
        forwarding: impl IntoIterator<Item = PublicKey>,
    ) -> EnclaveResult<Self> {
        if pairs.is_empty() {
            return Err(EnclaveError::Config(
                "at least one key pair is required".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = pairs.iter().find(|p| !seen.insert(p.public)) {
            return Err(EnclaveError::Config(format!(
                "key pair {} configured twice",
                dup.public
            )));
        }

        Ok(Self {
            pairs,
            forwarding: forwarding.into_iter().collect(),
        })
    }

    /// Unlocks every record through `pool` and builds a manager from the
    /// results, keeping record order. Any failed unlock fails the load.
    ///
    /// After the first failure, unlocks still waiting for permits are
    /// cancelled and derivations already running are awaited, so every
    /// permit is back in the pool when this returns.
    pub async fn load<K: PasswordKdf + 'static>(
        pool: &UnlockPool<K>,
        records: Vec<(ProtectedKeyRecord, Zeroizing<String>)>,
        forwarding: impl IntoIterator<Item = PublicKey>,
    ) -> EnclaveResult<Self> {
        let count = records.len();
        let cancel = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();
        for (index, (record, password)) in records.into_iter().enumerate() {
            let pool = pool.clone();
            let cancel = Arc::clone(&cancel);
            tasks.spawn(async move {
                let result = pool
                    .unlock_unless_cancelled(record, password, &cancel)
                    .await;
                if result.is_err() {
                    cancel.store(true, Ordering::Release);
                }
                (index, result)
            });
        }

        let mut unlocked: Vec<Option<PrivateKey>> = (0..count).map(|_| None).collect();
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(key))) => unlocked[index] = key,
                Ok((_, Err(e))) => {
                    failure.get_or_insert(e);
                }
                Err(e) => {
                    cancel.store(true, Ordering::Release);
                    failure.get_or_insert(EnclaveError::Worker(format!(
                        "unlock task failed: {e}"
                    )));
                }
            }
        }
        if let Some(e) = failure {
            warn!("key load failed: {e}");
            return Err(e);
        }

        let pairs = unlocked
            .into_iter()
            .map(|key| key.map(key_pair))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| EnclaveError::Worker("unlock finished without a key".to_string()))?;

        info!(keys = pairs.len(), "loaded key pairs");
        Self::new(pairs, forwarding)
    }

    pub fn default_public_key(&self) -> PublicKey {
        self.pairs[0].public
    }

    pub fn public_keys(&self) -> BTreeSet<PublicKey> {
        self.pairs.iter().map(|p| p.public).collect()
    }

    pub fn forwarding_keys(&self) -> &BTreeSet<PublicKey> {
        &self.forwarding
    }

    pub fn contains(&self, public: &PublicKey) -> bool {
        self.pairs.iter().any(|p| &p.public == public)
    }

    /// Private key belonging to `public`, if this enclave holds it.
    pub fn private_key_for(&self, public: &PublicKey) -> EnclaveResult<&PrivateKey> {
        self.pairs
            .iter()
            .find(|p| &p.public == public)
            .map(|p| &p.private)
            .ok_or_else(|| EnclaveError::KeyNotFound(public.to_base64()))
    }
}

fn key_pair(private: PrivateKey) -> KeyPair {
    let public = SalsaBoxProvider.public_key(&private);
    KeyPair { public, private }
}
