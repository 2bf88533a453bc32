//! In-process enclave for privtx.
//!
//! Holds the node's unlocked key pairs and performs payload operations on
//! behalf of a transport adapter, addressed by public key. Provides:
//! - Bounded, memory-budgeted key unlocking on the blocking thread pool
//! - Key management (default key, forwarding keys, lookup by public key)
//! - Payload encryption, raw transactions, decryption and recipient extension
//! - Liveness status

pub mod config;
pub mod enclave;
pub mod error;
pub mod keys;
pub mod pool;

pub use config::EnclaveConfig;
pub use enclave::{Enclave, Status};
pub use error::{EnclaveError, EnclaveResult};
pub use keys::KeyManager;
pub use pool::UnlockPool;
