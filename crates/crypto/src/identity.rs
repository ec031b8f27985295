//! Router/destination identities
//!
//! Encoded layout:
//!
//! ```text
//! encryption key field (256) | signing key field (128) | cert type (1) | cert len (2, BE) | cert payload
//! ```
//!
//! A KEY certificate payload starts with the signing type and crypto type
//! (2 bytes each, BE), followed by any signing key bytes that did not fit in
//! the 128-byte field. Any other certificate means DSA-SHA1 / ElGamal.

use std::fmt;

use tracing::warn;
use veilnet_core::{IdentHash, ENCRYPTION_KEY_LEN};

use crate::encrypt::CRYPTO_KEY_TYPE_ELGAMAL;
use crate::keys::{sha256, KeyError};
use crate::sign::{create_verifier, SigningKeyType, Verifier};

const SIGNING_KEY_FIELD_LEN: usize = 128;
const CERT_HEADER_LEN: usize = 3;
const CERT_TYPE_KEY: u8 = 5;

/// Length of the fixed part of every identity (keys + certificate header)
pub const DEFAULT_IDENTITY_LEN: usize = ENCRYPTION_KEY_LEN + SIGNING_KEY_FIELD_LEN + CERT_HEADER_LEN;

#[derive(Clone)]
pub struct Identity {
    encoded: Vec<u8>,
    signing_key_type: SigningKeyType,
    crypto_key_type: u16,
    signing_key: Vec<u8>,
    hash: IdentHash,
}

impl Identity {
    /// Parse an identity from the start of `buf`.
    ///
    /// Trailing bytes after the identity are ignored. Fails with
    /// [`KeyError::IdentityTooShort`] when the certificate declares more
    /// bytes than `buf` holds.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, KeyError> {
        if buf.len() < DEFAULT_IDENTITY_LEN {
            return Err(KeyError::IdentityTooShort {
                needed: DEFAULT_IDENTITY_LEN,
                available: buf.len(),
            });
        }

        let cert_offset = ENCRYPTION_KEY_LEN + SIGNING_KEY_FIELD_LEN;
        let cert_type = buf[cert_offset];
        let cert_len = u16::from_be_bytes([buf[cert_offset + 1], buf[cert_offset + 2]]) as usize;
        let full_len = DEFAULT_IDENTITY_LEN + cert_len;
        if full_len > buf.len() {
            return Err(KeyError::IdentityTooShort {
                needed: full_len,
                available: buf.len(),
            });
        }
        let payload = &buf[DEFAULT_IDENTITY_LEN..full_len];
        let field = &buf[ENCRYPTION_KEY_LEN..cert_offset];

        let (signing_key_type, crypto_key_type, signing_key) = if cert_type == CERT_TYPE_KEY {
            if payload.len() < 4 {
                return Err(KeyError::InvalidCertificate);
            }
            let sig_code = u16::from_be_bytes([payload[0], payload[1]]);
            let crypto_key_type = u16::from_be_bytes([payload[2], payload[3]]);
            let signing_key_type = SigningKeyType::from_code(sig_code)
                .ok_or(KeyError::UnsupportedSigningKeyType(sig_code))?;

            let key_len = signing_key_type.public_key_len();
            let signing_key = if key_len <= SIGNING_KEY_FIELD_LEN {
                field[SIGNING_KEY_FIELD_LEN - key_len..].to_vec()
            } else {
                let excess = key_len - SIGNING_KEY_FIELD_LEN;
                let extra = payload.get(4..4 + excess).ok_or(KeyError::InvalidCertificate)?;
                let mut key = field.to_vec();
                key.extend_from_slice(extra);
                key
            };
            (signing_key_type, crypto_key_type, signing_key)
        } else {
            (SigningKeyType::DsaSha1, CRYPTO_KEY_TYPE_ELGAMAL, field.to_vec())
        };

        let encoded = buf[..full_len].to_vec();
        let hash = sha256(&encoded);
        Ok(Self {
            encoded,
            signing_key_type,
            crypto_key_type,
            signing_key,
            hash,
        })
    }

    /// Build an Ed25519 identity with a KEY certificate
    pub fn new_ed25519(
        signing_public_key: &[u8; 32],
        crypto_key_type: u16,
        encryption_public_key: &[u8; ENCRYPTION_KEY_LEN],
    ) -> Self {
        let mut encoded = Vec::with_capacity(DEFAULT_IDENTITY_LEN + 4);
        encoded.extend_from_slice(encryption_public_key);
        encoded.extend_from_slice(&[0u8; SIGNING_KEY_FIELD_LEN - 32]);
        encoded.extend_from_slice(signing_public_key);
        encoded.push(CERT_TYPE_KEY);
        encoded.extend_from_slice(&4u16.to_be_bytes());
        encoded.extend_from_slice(&SigningKeyType::Ed25519.code().to_be_bytes());
        encoded.extend_from_slice(&crypto_key_type.to_be_bytes());

        let hash = sha256(&encoded);
        Self {
            encoded,
            signing_key_type: SigningKeyType::Ed25519,
            crypto_key_type,
            signing_key: signing_public_key.to_vec(),
            hash,
        }
    }

    /// Total encoded length including the certificate
    pub fn full_len(&self) -> usize {
        self.encoded.len()
    }

    pub fn signing_public_key_len(&self) -> usize {
        self.signing_key_type.public_key_len()
    }

    pub fn signature_len(&self) -> usize {
        self.signing_key_type.signature_len()
    }

    pub fn signing_key_type(&self) -> SigningKeyType {
        self.signing_key_type
    }

    pub fn crypto_key_type(&self) -> u16 {
        self.crypto_key_type
    }

    pub fn signing_public_key(&self) -> &[u8] {
        &self.signing_key
    }

    pub fn encryption_public_key(&self) -> &[u8] {
        &self.encoded[..ENCRYPTION_KEY_LEN]
    }

    pub fn ident_hash(&self) -> &IdentHash {
        &self.hash
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }

    /// A verifier armed with this identity's signing key
    pub fn create_verifier(&self) -> Option<Box<dyn Verifier>> {
        let mut verifier = create_verifier(self.signing_key_type.code())?;
        verifier.set_public_key(&self.signing_key).ok()?;
        Some(verifier)
    }

    /// Verify `signature` over `data` with this identity's signing key
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        match self.create_verifier() {
            Some(verifier) => verifier.verify(data, signature),
            None => {
                warn!(
                    "Identity: no verifier for signing key type {:?}",
                    self.signing_key_type
                );
                false
            }
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("hash", &hex::encode(self.hash))
            .field("signing_key_type", &self.signing_key_type)
            .field("crypto_key_type", &self.crypto_key_type)
            .field("full_len", &self.encoded.len())
            .finish()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for Identity {}
