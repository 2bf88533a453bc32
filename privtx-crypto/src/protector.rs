//! Password protection of private keys at rest.
//!
//! The password is stretched with the memory-hard KDF over a fresh random
//! salt into a 32-byte key, and the private key is sealed under it with a
//! fresh nonce. The KDF options are written into the record and reused
//! verbatim on unlock, whatever the current defaults are.

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{Argon2Kdf, KdfOptions, PasswordKdf};
use crate::key::{KEY_SIZE, KeyPair, Nonce, PrivateKey, Salt};
use crate::provider::{BoxProvider, SalsaBoxProvider};
use crate::record::{LockState, ProtectedKeyRecord};
use tracing::{debug, info};
use zeroize::Zeroize;

/// Seals private keys under passwords and opens them again.
#[derive(Clone, Debug)]
pub struct KeyProtector<K = Argon2Kdf, B = SalsaBoxProvider> {
    kdf: K,
    provider: B,
    default_options: KdfOptions,
}

impl KeyProtector {
    /// Argon2 + XChaCha20-Poly1305 protector using `default_options` for
    /// new records.
    pub fn new(default_options: KdfOptions) -> Self {
        Self::with_primitives(Argon2Kdf::default(), SalsaBoxProvider, default_options)
    }
}

impl Default for KeyProtector {
    fn default() -> Self {
        Self::new(KdfOptions::default())
    }
}

impl<K: PasswordKdf, B: BoxProvider> KeyProtector<K, B> {
    pub fn with_primitives(kdf: K, provider: B, default_options: KdfOptions) -> Self {
        Self {
            kdf,
            provider,
            default_options,
        }
    }

    pub fn default_options(&self) -> &KdfOptions {
        &self.default_options
    }

    /// Seals `key` under `password` using the default KDF options.
    pub fn encrypt_private_key(
        &self,
        key: &PrivateKey,
        password: &str,
    ) -> CryptoResult<ProtectedKeyRecord> {
        self.encrypt_private_key_with(key, password, self.default_options)
    }

    /// Seals `key` under `password` with explicit KDF options.
    pub fn encrypt_private_key_with(
        &self,
        key: &PrivateKey,
        password: &str,
        options: KdfOptions,
    ) -> CryptoResult<ProtectedKeyRecord> {
        info!("encrypting private key");
        options.validate()?;

        let salt = Salt::random()?;
        let derived = self.kdf.derive(password, &salt, &options)?;
        let nonce = Nonce::random()?;
        let sealed_box = self.provider.seal(key.as_bytes(), &nonce, &derived)?;

        debug!("private key sealed");
        Ok(ProtectedKeyRecord {
            label: None,
            lock_state: LockState::Locked,
            kdf_options: options,
            nonce,
            salt,
            sealed_box,
        })
    }

    /// Opens a locked record with `password`.
    ///
    /// Wrong passwords and corrupted records both fail with
    /// [`CryptoError::Decryption`].
    pub fn decrypt_private_key(
        &self,
        record: &ProtectedKeyRecord,
        password: &str,
    ) -> CryptoResult<PrivateKey> {
        if record.lock_state != LockState::Locked {
            return Err(CryptoError::UnsupportedOperation(
                "only locked records can be opened with a password".to_string(),
            ));
        }

        info!("decrypting private key");
        let derived = self.kdf.derive(password, &record.salt, &record.kdf_options)?;
        let mut opened = self
            .provider
            .open(&record.sealed_box, &record.nonce, &derived)?;

        let key = <[u8; KEY_SIZE]>::try_from(opened.as_slice())
            .map(PrivateKey::from_bytes)
            .map_err(|_| CryptoError::Decryption);
        opened.zeroize();
        key
    }

    /// Re-seals the key in `record` under `new_password`, keeping the
    /// record's KDF options and label. Salt and nonce are fresh.
    pub fn change_password(
        &self,
        record: &ProtectedKeyRecord,
        old_password: &str,
        new_password: &str,
    ) -> CryptoResult<ProtectedKeyRecord> {
        let key = self.decrypt_private_key(record, old_password)?;
        let mut updated = self.encrypt_private_key_with(&key, new_password, record.kdf_options)?;
        updated.label.clone_from(&record.label);
        Ok(updated)
    }

    /// Generates a new key pair and its locked record.
    pub fn generate_protected_key(
        &self,
        password: &str,
    ) -> CryptoResult<(KeyPair, ProtectedKeyRecord)> {
        let pair = self.provider.generate_key_pair()?;
        let record = self
            .encrypt_private_key(&pair.private, password)?
            .with_label(pair.public.to_base64());
        Ok((pair, record))
    }
}
