//! Persisted format of a password-protected private key.
//!
//! ```json
//! {
//!   "type": "locked",
//!   "aopts": { "variant": "id", "memory": 1048576, "iterations": 10, "parallelism": 4, "version": 19 },
//!   "snonce": "<base64, 24 bytes>",
//!   "asalt": "<base64, 16 bytes>",
//!   "sbox": "<base64>"
//! }
//! ```
//!
//! Parsing is strict: bad base64, wrong lengths, missing fields and unknown
//! KDF variants or versions are all [`CryptoError::Configuration`].

use crate::encoding::base64_bytes;
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::KdfOptions;
use crate::key::{Nonce, Salt};
use serde::{Deserialize, Serialize};

/// Whether a record holds a sealed key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    #[default]
    Locked,
    Unlocked,
}

/// A private key sealed under a password-derived key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedKeyRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", default)]
    pub lock_state: LockState,
    #[serde(rename = "aopts")]
    pub kdf_options: KdfOptions,
    #[serde(rename = "snonce")]
    pub nonce: Nonce,
    #[serde(rename = "asalt")]
    pub salt: Salt,
    #[serde(rename = "sbox", with = "base64_bytes")]
    pub sealed_box: Vec<u8>,
}

impl ProtectedKeyRecord {
    /// Parses and validates a record.
    pub fn from_json(json: &str) -> CryptoResult<Self> {
        let record: Self = serde_json::from_str(json)
            .map_err(|e| CryptoError::Configuration(format!("malformed key record: {e}")))?;
        record.kdf_options.validate()?;
        Ok(record)
    }

    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
