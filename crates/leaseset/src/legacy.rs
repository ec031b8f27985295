//! Legacy lease set decoder
//!
//! ```text
//! identity | encryption key (256) | unused signing key | num (1) | num x lease (44) | signature
//! ```

use std::sync::Arc;

use tracing::{debug, error, warn};
use veilnet_core::time::millis_since_epoch;
use veilnet_core::{LeaseSetError, Result, ENCRYPTION_KEY_LEN};
use veilnet_crypto::{create_encryptor, Identity, KeyError};

use crate::lease::{Lease, LEASE_ENDDATE_THRESHOLD, LEASE_SIZE, MAX_NUM_LEASES};
use crate::netdb::NetDb;
use crate::reader::Reader;
use crate::record::LeaseSetRecord;
use crate::table::{LeaseBatch, LeaseTable};

/// Database store type of legacy lease sets
pub const NETDB_STORE_TYPE_LEASESET: u8 = 1;

/// Fields of a legacy record up to (not including) its signature
pub(crate) struct LegacyBody<'a> {
    pub encryption_key: &'a [u8],
    pub leases: Vec<Lease>,
    /// Offset of the signature, i.e. the length of the signed range
    pub signed_len: usize,
}

pub(crate) fn identity_error(err: KeyError, buffer_len: usize) -> LeaseSetError {
    match err {
        KeyError::IdentityTooShort { needed, .. } => LeaseSetError::IdentityTooLong {
            identity_len: needed,
            buffer_len,
        },
        KeyError::UnsupportedSigningKeyType(code) => LeaseSetError::UnsupportedSigningKeyType(code),
        other => LeaseSetError::Identity(other.to_string()),
    }
}

pub(crate) fn parse_legacy_body<'a>(buf: &'a [u8], identity: &Identity) -> Result<LegacyBody<'a>> {
    let size = identity.full_len();
    if size > buf.len() {
        return Err(LeaseSetError::IdentityTooLong {
            identity_len: size,
            buffer_len: buf.len(),
        });
    }
    let mut reader = Reader::at(buf, size)?;
    let encryption_key = reader.take(ENCRYPTION_KEY_LEN)?;
    reader.skip(identity.signing_public_key_len())?;

    let num = reader.read_u8()?;
    debug!("LeaseSet: read num={}", num);
    if num == 0 || num as usize > MAX_NUM_LEASES {
        return Err(LeaseSetError::InvalidLeaseCount(num));
    }

    let leases = (0..num)
        .map(|_| {
            let gateway = reader.read_array::<32>()?;
            let tunnel_id = reader.read_u32()?;
            let end_date = reader.read_u64()?;
            Ok(Lease::new(gateway, tunnel_id, end_date))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LegacyBody {
        encryption_key,
        leases,
        signed_len: reader.position(),
    })
}

pub(crate) fn verify_legacy_signature(buf: &[u8], identity: &Identity, signed_len: usize) -> Result<()> {
    let signature = Reader::at(buf, signed_len)?.take(identity.signature_len())?;
    if !identity.verify(&buf[..signed_len], signature) {
        return Err(LeaseSetError::InvalidSignature);
    }
    Ok(())
}

/// Smallest lease end date in a legacy buffer, 0 if it cannot be read
fn extract_timestamp(buf: &[u8], identity: &Identity) -> u64 {
    let read = || -> Result<u64> {
        let mut reader = Reader::at(buf, identity.full_len())?;
        reader.skip(ENCRYPTION_KEY_LEN + identity.signing_public_key_len())?;
        let num = reader.read_u8()? as usize;
        if reader.position() + num * LEASE_SIZE > buf.len() {
            return Ok(0);
        }
        let mut timestamp = 0u64;
        for _ in 0..num {
            reader.skip(36)?;
            let end_date = reader.read_u64()?;
            if timestamp == 0 || end_date < timestamp {
                timestamp = end_date;
            }
        }
        Ok(timestamp)
    };
    read().unwrap_or(0)
}

/// A received legacy lease set
pub struct LeaseSet {
    identity: Option<Arc<Identity>>,
    encryption_key: [u8; ENCRYPTION_KEY_LEN],
    table: LeaseTable,
    expiration_time: u64,
    is_valid: bool,
    buffer: Vec<u8>,
}

impl LeaseSet {
    /// Decode and verify `buf`. Check [`LeaseSetRecord::is_valid`] before
    /// trusting anything else.
    pub fn new(buf: &[u8], store_leases: bool, netdb: &dyn NetDb) -> Self {
        let mut lease_set = Self {
            identity: None,
            encryption_key: [0u8; ENCRYPTION_KEY_LEN],
            table: LeaseTable::new(store_leases),
            expiration_time: 0,
            is_valid: false,
            buffer: buf.to_vec(),
        };
        lease_set.read_from_buffer(true, true, netdb);
        lease_set
    }

    /// Replace the stored buffer with a fresher record for the same
    /// destination and decode it, reusing the parsed identity
    pub fn update(&mut self, buf: &[u8], verify_signature: bool, netdb: &dyn NetDb) {
        self.buffer.clear();
        self.buffer.extend_from_slice(buf);
        self.read_from_buffer(false, verify_signature, netdb);
    }

    /// Start retaining leases and re-decode the stored buffer
    pub fn populate_leases(&mut self, netdb: &dyn NetDb) {
        self.table.set_store_leases(true);
        self.read_from_buffer(false, true, netdb);
    }

    pub fn encryption_key(&self) -> &[u8; ENCRYPTION_KEY_LEN] {
        &self.encryption_key
    }

    fn read_from_buffer(&mut self, read_identity: bool, verify_signature: bool, netdb: &dyn NetDb) {
        match self.decode(read_identity, verify_signature, netdb) {
            Ok(()) => self.is_valid = true,
            Err(e) => {
                match e {
                    LeaseSetError::AllLeasesExpired => warn!("LeaseSet: all leases are expired. Dropped"),
                    LeaseSetError::InvalidSignature => warn!("LeaseSet: verification failed"),
                    e => error!("LeaseSet: {}", e),
                }
                self.is_valid = false;
            }
        }
    }

    fn decode(&mut self, read_identity: bool, verify_signature: bool, netdb: &dyn NetDb) -> Result<()> {
        let cached = if read_identity { None } else { self.identity.clone() };
        let identity = match cached {
            Some(identity) => identity,
            None => {
                let identity = Identity::from_bytes(&self.buffer)
                    .map_err(|e| identity_error(e, self.buffer.len()))?;
                let identity = Arc::new(identity);
                self.identity = Some(Arc::clone(&identity));
                identity
            }
        };

        let body = parse_legacy_body(&self.buffer, &identity)?;
        let batch = LeaseBatch::collect(body.leases, millis_since_epoch());
        let expiration = batch.expiration().ok_or(LeaseSetError::AllLeasesExpired)?;
        if verify_signature {
            verify_legacy_signature(&self.buffer, &identity, body.signed_len)?;
        }

        self.encryption_key.copy_from_slice(body.encryption_key);
        self.expiration_time = expiration + LEASE_ENDDATE_THRESHOLD;
        self.table.merge(batch, netdb);
        Ok(())
    }
}

impl LeaseSetRecord for LeaseSet {
    fn store_type(&self) -> u8 {
        NETDB_STORE_TYPE_LEASESET
    }

    fn identity(&self) -> Option<&Arc<Identity>> {
        self.identity.as_ref()
    }

    fn is_valid(&self) -> bool {
        self.is_valid
    }

    fn expiration_time(&self) -> u64 {
        self.expiration_time
    }

    fn lease_table(&self) -> &LeaseTable {
        &self.table
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Compares the smallest lease end date of both buffers
    fn is_newer(&self, buf: &[u8]) -> bool {
        let Some(identity) = self.identity.as_ref() else {
            return false;
        };
        extract_timestamp(buf, identity) > extract_timestamp(&self.buffer, identity)
    }

    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let identity = self
            .identity
            .as_ref()
            .ok_or_else(|| LeaseSetError::Encryption("no identity".to_string()))?;
        let key_type = identity.crypto_key_type();
        let encryptor = create_encryptor(key_type, &self.encryption_key)
            .ok_or(LeaseSetError::UnsupportedEncryptionKeyType(key_type))?;
        encryptor
            .encrypt(data)
            .map_err(|e| LeaseSetError::Encryption(e.to_string()))
    }
}
