use std::sync::Arc;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::keys::sha256;

/// ElGamal-2048, the legacy identity encryption type
pub const CRYPTO_KEY_TYPE_ELGAMAL: u16 = 0;

/// ECIES over X25519
pub const CRYPTO_KEY_TYPE_ECIES_X25519: u16 = 4;

const EPHEMERAL_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncryptError {
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed")]
    DecryptionFailed,
    #[error("Invalid key")]
    InvalidKey,
    #[error("Ciphertext too short")]
    CiphertextTooShort,
}

/// One-shot public-key encryption towards a lease set's owner
pub trait Encryptor: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptError>;
}

/// ECIES-X25519 encryptor: ephemeral X25519 agreement, SHA-256 of the shared
/// secret as the ChaCha20-Poly1305 key.
///
/// Output layout: `ephemeral_pubkey (32) | nonce (12) | ciphertext`.
#[derive(Debug, Clone)]
pub struct X25519Encryptor {
    recipient: PublicKey,
}

impl X25519Encryptor {
    pub fn new(recipient_pubkey: [u8; 32]) -> Self {
        Self {
            recipient: PublicKey::from(recipient_pubkey),
        }
    }
}

impl Encryptor for X25519Encryptor {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptError> {
        let ephemeral = StaticSecret::random_from_rng(OsRng);
        let ephemeral_public = PublicKey::from(&ephemeral);
        let shared_secret = ephemeral.diffie_hellman(&self.recipient);
        let symmetric_key = sha256(shared_secret.as_bytes());

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = ChaCha20Poly1305::new_from_slice(&symmetric_key)
            .map_err(|_| EncryptError::InvalidKey)?;
        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| EncryptError::EncryptionFailed)?;

        let mut result = Vec::with_capacity(EPHEMERAL_LEN + NONCE_LEN + ciphertext.len());
        result.extend_from_slice(ephemeral_public.as_bytes());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }
}

/// Decrypt a blob produced by [`X25519Encryptor`]
pub fn decrypt_for_recipient(
    recipient_secret: &[u8; 32],
    blob: &[u8],
) -> Result<Vec<u8>, EncryptError> {
    if blob.len() < EPHEMERAL_LEN + NONCE_LEN {
        return Err(EncryptError::CiphertextTooShort);
    }

    let mut ephemeral = [0u8; EPHEMERAL_LEN];
    ephemeral.copy_from_slice(&blob[..EPHEMERAL_LEN]);
    let secret = StaticSecret::from(*recipient_secret);
    let shared_secret = secret.diffie_hellman(&PublicKey::from(ephemeral));
    let symmetric_key = sha256(shared_secret.as_bytes());

    let nonce = Nonce::from_slice(&blob[EPHEMERAL_LEN..EPHEMERAL_LEN + NONCE_LEN]);
    let cipher = ChaCha20Poly1305::new_from_slice(&symmetric_key)
        .map_err(|_| EncryptError::InvalidKey)?;
    cipher
        .decrypt(nonce, &blob[EPHEMERAL_LEN + NONCE_LEN..])
        .map_err(|_| EncryptError::DecryptionFailed)
}

/// Build an encryptor for an encryption key type and its public key bytes.
///
/// Returns `None` for key types this crate cannot encrypt to, or keys too
/// short for their type.
pub fn create_encryptor(key_type: u16, key: &[u8]) -> Option<Arc<dyn Encryptor>> {
    match key_type {
        CRYPTO_KEY_TYPE_ECIES_X25519 => {
            let recipient: [u8; 32] = key.get(..32)?.try_into().ok()?;
            Some(Arc::new(X25519Encryptor::new(recipient)))
        }
        _ => None,
    }
}
