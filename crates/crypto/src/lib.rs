//! Veilnet Cryptography
//!
//! Identities, signature verifiers and encryptors consumed by the lease set
//! decoders and encoders.

mod encrypt;
mod identity;
mod keys;
mod sign;

pub use encrypt::*;
pub use identity::*;
pub use keys::*;
pub use sign::*;
