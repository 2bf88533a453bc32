//! The enclave: payload operations addressed by public key.
//!
//! Callers name keys by their public half; the enclave resolves the private
//! half from its [`KeyManager`] and never hands it out. These are the
//! operations a transport adapter exposes (`default`, `forwarding`,
//! `public`, `encrypt`, `encrypt/raw`, `encrypt/toraw`, `unencrypt`,
//! `addRecipient`, `ping`).

use crate::error::{EnclaveError, EnclaveResult};
use crate::keys::KeyManager;
use privtx_crypto::{
    CryptoError, EncodedPayload, PayloadEngine, PublicKey, RawTransaction, RecipientBox,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Liveness reported by `ping`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Started,
    Stopped,
}

pub struct Enclave {
    keys: KeyManager,
    engine: PayloadEngine,
    running: AtomicBool,
}

impl Enclave {
    pub fn new(keys: KeyManager) -> Self {
        info!(
            keys = keys.public_keys().len(),
            forwarding = keys.forwarding_keys().len(),
            "enclave started"
        );
        Self {
            keys,
            engine: PayloadEngine::new(),
            running: AtomicBool::new(true),
        }
    }

    pub fn status(&self) -> Status {
        if self.running.load(Ordering::Acquire) {
            Status::Started
        } else {
            Status::Stopped
        }
    }

    /// Stops the enclave. Every later operation fails with
    /// [`EnclaveError::Stopped`].
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("enclave stopped");
        }
    }

    pub fn default_public_key(&self) -> EnclaveResult<PublicKey> {
        self.ensure_running()?;
        Ok(self.keys.default_public_key())
    }

    pub fn forwarding_keys(&self) -> EnclaveResult<BTreeSet<PublicKey>> {
        self.ensure_running()?;
        Ok(self.keys.forwarding_keys().clone())
    }

    pub fn public_keys(&self) -> EnclaveResult<BTreeSet<PublicKey>> {
        self.ensure_running()?;
        Ok(self.keys.public_keys())
    }

    /// Encrypts `message` from the local key `sender` for `recipients`
    /// and every forwarding key.
    pub fn encrypt_payload(
        &self,
        message: &[u8],
        sender: &PublicKey,
        recipients: &[PublicKey],
    ) -> EnclaveResult<EncodedPayload> {
        self.ensure_running()?;
        require_recipients(recipients)?;
        let private = self.keys.private_key_for(sender)?;
        let all = self.with_forwarding(recipients);
        Ok(self.engine.encrypt_payload(message, private, &all)?)
    }

    /// Encrypts `message` for the local key `sender` alone.
    pub fn encrypt_raw_payload(
        &self,
        message: &[u8],
        sender: &PublicKey,
    ) -> EnclaveResult<RawTransaction> {
        self.ensure_running()?;
        let private = self.keys.private_key_for(sender)?;
        Ok(self.engine.encrypt_raw_payload(message, private)?)
    }

    /// Assigns recipients (plus forwarding keys) to a raw transaction whose
    /// sender is a local key.
    pub fn encrypt_raw_for_recipients(
        &self,
        raw: &RawTransaction,
        recipients: &[PublicKey],
    ) -> EnclaveResult<EncodedPayload> {
        self.ensure_running()?;
        require_recipients(recipients)?;
        let private = self.keys.private_key_for(&raw.from)?;
        let all = self.with_forwarding(recipients);
        Ok(self.engine.encrypt_raw_for_recipients(raw, private, &all)?)
    }

    /// Decrypts `payload` with the local key `provided`.
    pub fn unencrypt_transaction(
        &self,
        payload: &EncodedPayload,
        provided: &PublicKey,
    ) -> EnclaveResult<Vec<u8>> {
        self.ensure_running()?;
        let private = self.keys.private_key_for(provided)?;
        Ok(self.engine.unencrypt_transaction(payload, private)?)
    }

    /// Seals the payload key of `payload` for `new_recipient` using whichever
    /// local key can open it: the sender's if held here, else a recipient's.
    pub fn add_recipient(
        &self,
        payload: &EncodedPayload,
        new_recipient: &PublicKey,
    ) -> EnclaveResult<RecipientBox> {
        self.ensure_running()?;
        let opener = self.local_opener(payload).ok_or(CryptoError::Decryption)?;
        debug!(opener = %opener, recipient = %new_recipient, "adding recipient box");
        let private = self.keys.private_key_for(&opener)?;
        Ok(self
            .engine
            .create_new_recipient_box(payload, private, new_recipient)?)
    }

    fn local_opener(&self, payload: &EncodedPayload) -> Option<PublicKey> {
        if self.keys.contains(&payload.sender_public_key) {
            return Some(payload.sender_public_key);
        }
        payload
            .recipient_boxes
            .iter()
            .flat_map(|(addressee, b)| [*addressee, b.sealed_by])
            .find(|pk| self.keys.contains(pk))
    }

    fn with_forwarding(&self, recipients: &[PublicKey]) -> Vec<PublicKey> {
        recipients
            .iter()
            .chain(self.keys.forwarding_keys())
            .copied()
            .collect()
    }

    fn ensure_running(&self) -> EnclaveResult<()> {
        match self.status() {
            Status::Started => Ok(()),
            Status::Stopped => Err(EnclaveError::Stopped),
        }
    }
}

fn require_recipients(recipients: &[PublicKey]) -> EnclaveResult<()> {
    if recipients.is_empty() {
        return Err(CryptoError::InvalidRecipient(
            "at least one recipient is required".to_string(),
        )
        .into());
    }
    Ok(())
}
