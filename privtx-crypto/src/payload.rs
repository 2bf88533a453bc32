//! Multi-recipient payload encryption.
//!
//! A message is encrypted exactly once under a random payload key. The
//! payload key is then sealed separately for each recipient under the shared
//! key between the sealing party and that recipient. Every recipient box
//! holds the same payload key, so any recipient recovers the same plaintext,
//! and new recipients can be added later by resealing only the 32-byte
//! payload key.
//!
//! Boxes are keyed by recipient public key and record who sealed them, which
//! lets an existing recipient extend a payload it did not originate.

use crate::encoding::base64_bytes;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{Nonce, PrivateKey, PublicKey, SymmetricKey};
use crate::provider::{BoxProvider, SalsaBoxProvider};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// The payload key sealed for one recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientBox {
    /// Public key of the party that sealed this box: the sender, or an
    /// existing recipient that extended the payload.
    pub sealed_by: PublicKey,
    pub nonce: Nonce,
    #[serde(with = "base64_bytes")]
    pub sealed_key: Vec<u8>,
}

/// An encrypted message with one box per recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedPayload {
    pub sender_public_key: PublicKey,
    /// Nonce used with the payload key for `cipher_text`.
    pub nonce: Nonce,
    #[serde(with = "base64_bytes")]
    pub cipher_text: Vec<u8>,
    pub recipient_boxes: BTreeMap<PublicKey, RecipientBox>,
    /// Recipients in the order they were added.
    #[serde(default)]
    pub recipient_list: Vec<PublicKey>,
}

impl EncodedPayload {
    /// Serializes the payload to bytes.
    pub fn encode(&self) -> CryptoResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses a payload produced by [`EncodedPayload::encode`].
    ///
    /// `recipient_list` must name every boxed recipient exactly once. A
    /// payload without a list takes the boxes' key order.
    pub fn decode(bytes: &[u8]) -> CryptoResult<Self> {
        let mut payload: Self = serde_json::from_slice(bytes)?;
        if payload.recipient_list.is_empty() {
            payload.recipient_list = payload.recipient_boxes.keys().copied().collect();
            return Ok(payload);
        }

        let mut listed = BTreeSet::new();
        for recipient in &payload.recipient_list {
            if !listed.insert(recipient) {
                return Err(CryptoError::InvalidRecipient(format!(
                    "recipient {recipient} listed twice"
                )));
            }
            if !payload.recipient_boxes.contains_key(recipient) {
                return Err(CryptoError::InvalidRecipient(format!(
                    "listed recipient {recipient} has no box"
                )));
            }
        }
        if let Some(unlisted) = payload
            .recipient_boxes
            .keys()
            .find(|pk| !listed.contains(pk))
        {
            return Err(CryptoError::InvalidRecipient(format!(
                "box for {unlisted} missing from the recipient list"
            )));
        }
        Ok(payload)
    }

    pub fn recipients(&self) -> &[PublicKey] {
        &self.recipient_list
    }

    /// Adds a box for `recipient`. An existing box is never replaced;
    /// returns `false` in that case.
    pub fn add_recipient_box(&mut self, recipient: PublicKey, recipient_box: RecipientBox) -> bool {
        if self.recipient_boxes.contains_key(&recipient) {
            return false;
        }
        self.recipient_boxes.insert(recipient, recipient_box);
        self.recipient_list.push(recipient);
        true
    }
}

/// A message encrypted for its sender only, awaiting recipients.
///
/// `encrypted_key` is the payload key sealed under the sender's shared key
/// with itself. `nonce` is used once with the payload key for the body and
/// once with that shared key for the key box.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    #[serde(with = "base64_bytes")]
    pub encrypted_payload: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub encrypted_key: Vec<u8>,
    pub nonce: Nonce,
    pub from: PublicKey,
}

/// Stateless payload encryption over a [`BoxProvider`].
#[derive(Clone, Debug, Default)]
pub struct PayloadEngine<B = SalsaBoxProvider> {
    provider: B,
}

impl PayloadEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: BoxProvider> PayloadEngine<B> {
    pub fn with_provider(provider: B) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &B {
        &self.provider
    }

    /// Encrypts `message` from `sender` for every key in `recipients`.
    pub fn encrypt_payload(
        &self,
        message: &[u8],
        sender: &PrivateKey,
        recipients: &[PublicKey],
    ) -> CryptoResult<EncodedPayload> {
        validate_recipients(recipients)?;
        debug!(recipients = recipients.len(), "encrypting payload");

        let payload_key = SymmetricKey::random()?;
        let nonce = Nonce::random()?;
        let cipher_text = self.provider.seal(message, &nonce, &payload_key)?;

        let mut payload = EncodedPayload {
            sender_public_key: self.provider.public_key(sender),
            nonce,
            cipher_text,
            recipient_boxes: BTreeMap::new(),
            recipient_list: Vec::with_capacity(recipients.len()),
        };
        self.seal_for_recipients(&mut payload, &payload_key, sender, recipients)?;
        Ok(payload)
    }

    /// Encrypts `message` for `sender` alone.
    pub fn encrypt_raw_payload(
        &self,
        message: &[u8],
        sender: &PrivateKey,
    ) -> CryptoResult<RawTransaction> {
        debug!("encrypting raw payload");
        let payload_key = SymmetricKey::random()?;
        let nonce = Nonce::random()?;
        let encrypted_payload = self.provider.seal(message, &nonce, &payload_key)?;

        let from = self.provider.public_key(sender);
        let shared = self.provider.compute_shared_key(&from, sender);
        let encrypted_key =
            self.provider
                .seal_after_precomputation(payload_key.as_bytes(), &nonce, &shared)?;

        Ok(RawTransaction {
            encrypted_payload,
            encrypted_key,
            nonce,
            from,
        })
    }

    /// Turns a raw transaction into a payload for `recipients`. `sender`
    /// must be the private key of `raw.from`. The body is reused as is.
    pub fn encrypt_raw_for_recipients(
        &self,
        raw: &RawTransaction,
        sender: &PrivateKey,
        recipients: &[PublicKey],
    ) -> CryptoResult<EncodedPayload> {
        validate_recipients(recipients)?;
        debug!(recipients = recipients.len(), "adding recipients to raw payload");

        let shared = self.provider.compute_shared_key(&raw.from, sender);
        let payload_key = SymmetricKey::from_opened(self.provider.open_after_precomputation(
            &raw.encrypted_key,
            &raw.nonce,
            &shared,
        )?)?;

        let mut payload = EncodedPayload {
            sender_public_key: raw.from,
            nonce: raw.nonce,
            cipher_text: raw.encrypted_payload.clone(),
            recipient_boxes: BTreeMap::new(),
            recipient_list: Vec::with_capacity(recipients.len()),
        };
        self.seal_for_recipients(&mut payload, &payload_key, sender, recipients)?;
        Ok(payload)
    }

    /// Decrypts `payload` with `own_key`, which must belong to a recipient
    /// or to a party that sealed one of the boxes (such as the sender).
    pub fn unencrypt_transaction(
        &self,
        payload: &EncodedPayload,
        own_key: &PrivateKey,
    ) -> CryptoResult<Vec<u8>> {
        let payload_key = self.recover_payload_key(payload, own_key)?;
        self.provider
            .open(&payload.cipher_text, &payload.nonce, &payload_key)
    }

    /// Seals the payload key of `payload` for `new_recipient`. `own_key`
    /// must be able to open the payload; the plaintext is never needed.
    pub fn create_new_recipient_box(
        &self,
        payload: &EncodedPayload,
        own_key: &PrivateKey,
        new_recipient: &PublicKey,
    ) -> CryptoResult<RecipientBox> {
        validate_recipients(std::slice::from_ref(new_recipient))?;
        let payload_key = self.recover_payload_key(payload, own_key)?;
        let own_public = self.provider.public_key(own_key);
        self.seal_box(&payload_key, own_key, own_public, new_recipient)
    }

    /// Creates a box for `new_recipient` and adds it to `payload`. Existing
    /// boxes are left untouched.
    pub fn add_recipient(
        &self,
        payload: &mut EncodedPayload,
        own_key: &PrivateKey,
        new_recipient: &PublicKey,
    ) -> CryptoResult<()> {
        if payload.recipient_boxes.contains_key(new_recipient) {
            return Ok(());
        }
        let recipient_box = self.create_new_recipient_box(payload, own_key, new_recipient)?;
        payload.add_recipient_box(*new_recipient, recipient_box);
        Ok(())
    }

    fn recover_payload_key(
        &self,
        payload: &EncodedPayload,
        own_key: &PrivateKey,
    ) -> CryptoResult<SymmetricKey> {
        let own_public = self.provider.public_key(own_key);

        // Addressed to us: open with the sealer's public key. Otherwise a box
        // we sealed ourselves opens with the addressee's public key.
        let (counterparty, recipient_box) = match payload.recipient_boxes.get(&own_public) {
            Some(recipient_box) => (recipient_box.sealed_by, recipient_box),
            None => payload
                .recipient_boxes
                .iter()
                .find(|(_, b)| b.sealed_by == own_public)
                .map(|(addressee, b)| (*addressee, b))
                .ok_or(CryptoError::Decryption)?,
        };

        let shared = self.provider.compute_shared_key(&counterparty, own_key);
        let opened = self.provider.open_after_precomputation(
            &recipient_box.sealed_key,
            &recipient_box.nonce,
            &shared,
        )?;
        SymmetricKey::from_opened(opened)
    }

    fn seal_for_recipients(
        &self,
        payload: &mut EncodedPayload,
        payload_key: &SymmetricKey,
        sealer: &PrivateKey,
        recipients: &[PublicKey],
    ) -> CryptoResult<()> {
        let sealer_public = self.provider.public_key(sealer);
        for recipient in recipients {
            if payload.recipient_boxes.contains_key(recipient) {
                continue;
            }
            let recipient_box = self.seal_box(payload_key, sealer, sealer_public, recipient)?;
            payload.add_recipient_box(*recipient, recipient_box);
        }
        Ok(())
    }

    fn seal_box(
        &self,
        payload_key: &SymmetricKey,
        sealer: &PrivateKey,
        sealer_public: PublicKey,
        recipient: &PublicKey,
    ) -> CryptoResult<RecipientBox> {
        let shared = self.provider.compute_shared_key(recipient, sealer);
        let nonce = Nonce::random()?;
        let sealed_key =
            self.provider
                .seal_after_precomputation(payload_key.as_bytes(), &nonce, &shared)?;
        Ok(RecipientBox {
            sealed_by: sealer_public,
            nonce,
            sealed_key,
        })
    }
}

fn validate_recipients(recipients: &[PublicKey]) -> CryptoResult<()> {
    if recipients.is_empty() {
        return Err(CryptoError::InvalidRecipient(
            "at least one recipient is required".to_string(),
        ));
    }
    if recipients.iter().any(PublicKey::is_zero) {
        return Err(CryptoError::InvalidRecipient(
            "all-zero public key".to_string(),
        ));
    }
    Ok(())
}
