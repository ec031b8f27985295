use ed25519_dalek::{Signature, Verifier as _, VerifyingKey};

use crate::keys::KeyError;

/// Signing algorithms that can appear in identities, offline key blocks and
/// blinded keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningKeyType {
    DsaSha1,
    EcdsaSha256P256,
    EcdsaSha384P384,
    EcdsaSha512P521,
    Ed25519,
    RedDsaEd25519,
}

impl SigningKeyType {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::DsaSha1),
            1 => Some(Self::EcdsaSha256P256),
            2 => Some(Self::EcdsaSha384P384),
            3 => Some(Self::EcdsaSha512P521),
            7 => Some(Self::Ed25519),
            11 => Some(Self::RedDsaEd25519),
            _ => None,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::DsaSha1 => 0,
            Self::EcdsaSha256P256 => 1,
            Self::EcdsaSha384P384 => 2,
            Self::EcdsaSha512P521 => 3,
            Self::Ed25519 => 7,
            Self::RedDsaEd25519 => 11,
        }
    }

    pub fn public_key_len(&self) -> usize {
        match self {
            Self::DsaSha1 => 128,
            Self::EcdsaSha256P256 => 64,
            Self::EcdsaSha384P384 => 96,
            Self::EcdsaSha512P521 => 132,
            Self::Ed25519 | Self::RedDsaEd25519 => 32,
        }
    }

    pub fn signature_len(&self) -> usize {
        match self {
            Self::DsaSha1 => 40,
            Self::EcdsaSha256P256 => 64,
            Self::EcdsaSha384P384 => 96,
            Self::EcdsaSha512P521 => 132,
            Self::Ed25519 | Self::RedDsaEd25519 => 64,
        }
    }
}

/// Signature verification for one signing algorithm.
///
/// A verifier is created empty for an algorithm tag and armed with
/// [`Verifier::set_public_key`] before use.
pub trait Verifier: Send + Sync {
    fn public_key_len(&self) -> usize;
    fn signature_len(&self) -> usize;
    fn set_public_key(&mut self, key: &[u8]) -> Result<(), KeyError>;
    fn verify(&self, data: &[u8], signature: &[u8]) -> bool;
}

/// Ed25519 verifier. RedDSA signatures use the same verification equation.
#[derive(Debug, Default)]
pub struct Ed25519Verifier {
    key: Option<VerifyingKey>,
}

impl Verifier for Ed25519Verifier {
    fn public_key_len(&self) -> usize {
        32
    }

    fn signature_len(&self) -> usize {
        64
    }

    fn set_public_key(&mut self, key: &[u8]) -> Result<(), KeyError> {
        let bytes: [u8; 32] = key.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        self.key = Some(key);
        Ok(())
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        let Some(key) = self.key.as_ref() else {
            return false;
        };
        let Ok(signature) = <[u8; 64]>::try_from(signature) else {
            return false;
        };
        key.verify(data, &Signature::from_bytes(&signature)).is_ok()
    }
}

/// Create an unarmed verifier for a signing algorithm tag.
///
/// Returns `None` for tags with no verifier in this crate.
pub fn create_verifier(sig_type: u16) -> Option<Box<dyn Verifier>> {
    match SigningKeyType::from_code(sig_type)? {
        SigningKeyType::Ed25519 | SigningKeyType::RedDsaEd25519 => {
            Some(Box::new(Ed25519Verifier::default()))
        }
        _ => None,
    }
}
