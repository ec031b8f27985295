use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeaseSetError {
    #[error("Truncated record: need {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Identity length {identity_len} exceeds buffer size {buffer_len}")]
    IdentityTooLong {
        identity_len: usize,
        buffer_len: usize,
    },

    #[error("Incorrect number of leases: {0}")]
    InvalidLeaseCount(u8),

    #[error("Too many leases: {0}")]
    TooManyLeases(u8),

    #[error("All leases are expired")]
    AllLeasesExpired,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Signature length {actual} does not match expected {expected}")]
    SignatureLength { expected: usize, actual: usize },

    #[error("Invalid offline signature")]
    InvalidOfflineSignature,

    #[error("Offline signing key expired")]
    OfflineKeyExpired,

    #[error("Unsupported store type: {0}")]
    UnsupportedStoreType(u8),

    #[error("Unsupported signing key type: {0}")]
    UnsupportedSigningKeyType(u16),

    #[error("Unsupported encryption key type: {0}")]
    UnsupportedEncryptionKeyType(u16),

    #[error("Encryption key of {0} bytes does not fit a key section")]
    EncryptionKeyTooLong(usize),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LeaseSetError>;
