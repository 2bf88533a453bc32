//! Authenticated encryption primitives behind a single capability trait.
//!
//! Two kinds of sealing are needed:
//!
//! 1. **After precomputation**: a shared key is computed once from one
//!    party's public key and the other's private key, then used to seal and
//!    open small values (payload keys) between them. Either side of the pair
//!    computes the same shared key.
//!
//! 2. **Symmetric**: nonce-based sealing under a raw 32-byte key, used for
//!    message bodies under a payload key and for private keys under a
//!    password-derived key.
//!
//! `crypto_box` takes secret keys by value, so building one from a
//! [`PrivateKey`] goes through a zeroized copy; the by-value argument itself
//! is the one copy left to the compiler.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{KeyPair, Nonce, PrivateKey, PublicKey, SymmetricKey};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use crypto_box::SalsaBox;
use zeroize::Zeroizing;

/// Key-pair and sealed-box operations the payload engine and key
/// protector are written against.
pub trait BoxProvider: Send + Sync {
    /// Precomputed shared key between two parties.
    type SharedKey;

    /// Generates a fresh key pair from the secure random source.
    fn generate_key_pair(&self) -> CryptoResult<KeyPair>;

    /// Derives the public key belonging to `private`.
    fn public_key(&self, private: &PrivateKey) -> PublicKey;

    /// Computes the shared key between `public` and `private`. Depends only
    /// on the two raw key values.
    fn compute_shared_key(&self, public: &PublicKey, private: &PrivateKey) -> Self::SharedKey;

    fn seal_after_precomputation(
        &self,
        message: &[u8],
        nonce: &Nonce,
        shared: &Self::SharedKey,
    ) -> CryptoResult<Vec<u8>>;

    fn open_after_precomputation(
        &self,
        ciphertext: &[u8],
        nonce: &Nonce,
        shared: &Self::SharedKey,
    ) -> CryptoResult<Vec<u8>>;

    fn seal(&self, message: &[u8], nonce: &Nonce, key: &SymmetricKey) -> CryptoResult<Vec<u8>>;

    fn open(&self, ciphertext: &[u8], nonce: &Nonce, key: &SymmetricKey) -> CryptoResult<Vec<u8>>;
}

/// X25519 + XSalsa20-Poly1305 boxes for shared keys, XChaCha20-Poly1305 for
/// symmetric sealing.
#[derive(Clone, Copy, Debug, Default)]
pub struct SalsaBoxProvider;

/// Precomputed X25519 + XSalsa20-Poly1305 box for one key pair relationship.
pub struct SalsaSharedKey(SalsaBox);

impl BoxProvider for SalsaBoxProvider {
    type SharedKey = SalsaSharedKey;

    fn generate_key_pair(&self) -> CryptoResult<KeyPair> {
        let private = PrivateKey::generate()?;
        let public = self.public_key(&private);
        Ok(KeyPair { public, private })
    }

    fn public_key(&self, private: &PrivateKey) -> PublicKey {
        PublicKey::from_bytes(*secret_key(private).public_key().as_bytes())
    }

    fn compute_shared_key(&self, public: &PublicKey, private: &PrivateKey) -> SalsaSharedKey {
        let public = crypto_box::PublicKey::from(*public.as_bytes());
        SalsaSharedKey(SalsaBox::new(&public, &secret_key(private)))
    }

    fn seal_after_precomputation(
        &self,
        message: &[u8],
        nonce: &Nonce,
        shared: &SalsaSharedKey,
    ) -> CryptoResult<Vec<u8>> {
        shared
            .0
            .encrypt(crypto_box::Nonce::from_slice(nonce.as_bytes()), message)
            .map_err(|e| CryptoError::Encryption(format!("box seal failed: {e}")))
    }

    fn open_after_precomputation(
        &self,
        ciphertext: &[u8],
        nonce: &Nonce,
        shared: &SalsaSharedKey,
    ) -> CryptoResult<Vec<u8>> {
        shared
            .0
            .decrypt(crypto_box::Nonce::from_slice(nonce.as_bytes()), ciphertext)
            .map_err(|_| CryptoError::Decryption)
    }

    fn seal(&self, message: &[u8], nonce: &Nonce, key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        cipher
            .encrypt(XNonce::from_slice(nonce.as_bytes()), message)
            .map_err(|e| CryptoError::Encryption(format!("seal failed: {e}")))
    }

    fn open(&self, ciphertext: &[u8], nonce: &Nonce, key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        cipher
            .decrypt(XNonce::from_slice(nonce.as_bytes()), ciphertext)
            .map_err(|_| CryptoError::Decryption)
    }
}

fn secret_key(private: &PrivateKey) -> crypto_box::SecretKey {
    let bytes = Zeroizing::new(*private.as_bytes());
    crypto_box::SecretKey::from(*bytes)
}
