/// SHA-256 hash of an encoded identity (router or destination)
pub type IdentHash = [u8; 32];

/// 32-bit tunnel identifier as carried in leases
pub type TunnelId = u32;

/// Length of the static encryption key carried by identities and legacy lease sets
pub const ENCRYPTION_KEY_LEN: usize = 256;

/// Short hex rendering of an identity hash for log lines
pub fn short_hash(hash: &IdentHash) -> String {
    hex::encode(&hash[..8])
}
