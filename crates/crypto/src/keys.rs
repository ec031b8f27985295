//! Key material of a local destination

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::encrypt::CRYPTO_KEY_TYPE_ECIES_X25519;
use crate::sign::SigningKeyType;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Identity too short: need {needed} bytes, {available} available")]
    IdentityTooShort { needed: usize, available: usize },
    #[error("Invalid key certificate")]
    InvalidCertificate,
    #[error("Unsupported signing key type {0}")]
    UnsupportedSigningKeyType(u16),
}

/// Ed25519 key a destination signs its lease sets with
#[derive(Clone)]
pub struct SigningKeypair {
    signing_key: SigningKey,
}

impl SigningKeypair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn key_type(&self) -> SigningKeyType {
        SigningKeyType::Ed25519
    }

    pub fn sign(&self, data: &[u8]) -> [u8; 64] {
        self.signing_key.sign(data).to_bytes()
    }
}

/// X25519 key peers encrypt to
#[derive(Clone)]
pub struct EncryptionKeypair {
    secret: StaticSecret,
}

impl EncryptionKeypair {
    pub fn generate() -> Self {
        Self {
            secret: StaticSecret::random_from_rng(OsRng),
        }
    }

    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            secret: StaticSecret::from(*secret),
        }
    }

    pub fn key_type(&self) -> u16 {
        CRYPTO_KEY_TYPE_ECIES_X25519
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        PublicKey::from(&self.secret).to_bytes()
    }

    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// The public key in the 256-byte identity/legacy lease set key field
    pub fn padded_public_key(&self) -> [u8; 256] {
        let mut field = [0u8; 256];
        field[..32].copy_from_slice(&self.public_key_bytes());
        field
    }
}

/// SHA-256 digest
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
