//! Shared helpers for enclave integration tests.

#![allow(dead_code)]

use privtx_crypto::{
    Argon2Kdf, BoxProvider, CryptoResult, KdfOptions, KdfVariant, KeyPair, PasswordKdf,
    SalsaBoxProvider, Salt, SymmetricKey,
};
use privtx_enclave::EnclaveConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Installs a tracing subscriber once per test binary. Honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Config with KDF costs small enough for tests.
pub fn fast_config() -> EnclaveConfig {
    EnclaveConfig {
        kdf: KdfOptions::new(KdfVariant::Id, 64, 1, 1),
        max_concurrent_unlocks: 2,
        kdf_memory_budget_kib: 1024,
        forwarding_keys: Vec::new(),
    }
}

pub fn pair() -> KeyPair {
    SalsaBoxProvider.generate_key_pair().unwrap()
}

/// Counters shared between a [`CountingKdf`] and the test observing it.
#[derive(Clone, Default)]
pub struct KdfGauge {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    memory_in_flight: Arc<AtomicU64>,
    peak_memory: Arc<AtomicU64>,
    calls: Arc<AtomicUsize>,
}

impl KdfGauge {
    /// Derivations running right now.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Most derivations ever seen running at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Largest total memory cost (KiB) ever seen running at once.
    pub fn peak_memory_kib(&self) -> u64 {
        self.peak_memory.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Argon2 that records how many derivations overlap and holds each one
/// open for `hold` so overlaps are observable.
pub struct CountingKdf {
    inner: Argon2Kdf,
    gauge: KdfGauge,
    hold: Duration,
}

impl CountingKdf {
    pub fn new(config: &EnclaveConfig, hold: Duration) -> (Self, KdfGauge) {
        let gauge = KdfGauge::default();
        let kdf = Self {
            inner: Argon2Kdf::new(config.kdf_memory_budget_kib),
            gauge: gauge.clone(),
            hold,
        };
        (kdf, gauge)
    }
}

impl PasswordKdf for CountingKdf {
    fn derive(
        &self,
        password: &str,
        salt: &Salt,
        options: &KdfOptions,
    ) -> CryptoResult<SymmetricKey> {
        let gauge = &self.gauge;
        let memory = u64::from(options.memory);
        gauge.calls.fetch_add(1, Ordering::SeqCst);
        let running = gauge.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        gauge.peak.fetch_max(running, Ordering::SeqCst);
        let held = gauge.memory_in_flight.fetch_add(memory, Ordering::SeqCst) + memory;
        gauge.peak_memory.fetch_max(held, Ordering::SeqCst);

        std::thread::sleep(self.hold);
        let result = self.inner.derive(password, salt, options);

        gauge.memory_in_flight.fetch_sub(memory, Ordering::SeqCst);
        gauge.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
