//! Process-wide secure random source.
//!
//! All salts, nonces, payload keys and generated private keys come from the
//! operating system CSPRNG through [`fill`]. The OS source needs no
//! initialisation, holds no state in this process and is safe to call from
//! any number of threads at once. If it fails the caller gets
//! [`CryptoError::ResourceExhaustion`]; there is no fallback generator.

use crate::error::{CryptoError, CryptoResult};
use rand::TryRngCore;
use rand::rngs::OsRng;

/// Fills `dest` with bytes from the OS CSPRNG.
pub fn fill(dest: &mut [u8]) -> CryptoResult<()> {
    OsRng
        .try_fill_bytes(dest)
        .map_err(|e| CryptoError::ResourceExhaustion(format!("secure random source unavailable: {e}")))
}

/// Returns `N` fresh random bytes.
pub(crate) fn array<const N: usize>() -> CryptoResult<[u8; N]> {
    let mut bytes = [0u8; N];
    fill(&mut bytes)?;
    Ok(bytes)
}
