//! Lease set v2 decoder
//!
//! Standard and meta records:
//!
//! ```text
//! identity | published (4) | expires (2) | flags (2) | [offline key block] | type specific body | signature
//! ```
//!
//! Encrypted records replace the identity with `blinded key type (2) | blinded key`
//! and carry an opaque outer ciphertext as their body.
//!
//! The signature of every v2 record covers `store type (1) | record bytes`.

use std::sync::Arc;

use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use tracing::{debug, error, warn};
use veilnet_core::time::millis_since_epoch;
use veilnet_core::{LeaseSetError, Result};
use veilnet_crypto::{create_encryptor, create_verifier, Encryptor, Identity, Verifier};

use crate::lease::{Lease, MAX_NUM_LEASES};
use crate::legacy::identity_error;
use crate::netdb::NetDb;
use crate::reader::Reader;
use crate::record::LeaseSetRecord;
use crate::table::{LeaseBatch, LeaseTable};

/// v2 record kinds, by database store type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreType {
    Standard,
    Encrypted,
    Meta,
}

impl StoreType {
    pub fn code(&self) -> u8 {
        match self {
            StoreType::Standard => 3,
            StoreType::Encrypted => 5,
            StoreType::Meta => 7,
        }
    }
}

impl TryFrom<u8> for StoreType {
    type Error = LeaseSetError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            3 => Ok(StoreType::Standard),
            5 => Ok(StoreType::Encrypted),
            7 => Ok(StoreType::Meta),
            other => Err(LeaseSetError::UnsupportedStoreType(other)),
        }
    }
}

bitflags! {
    /// Header flags of v2 records
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LeaseSet2Flags: u16 {
        const OFFLINE_KEYS = 0x0001;
        const UNPUBLISHED = 0x0002;
        const BLINDED = 0x0004;
    }
}

/// Delegated signing key carried in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineKey {
    /// Expiry in seconds since the epoch
    pub expires: u32,
    pub key_type: u16,
    pub public_key: Vec<u8>,
}

/// Public key an encrypted record is published under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlindedKey {
    pub key_type: u16,
    pub public_key: Vec<u8>,
}

struct Header {
    published: u32,
    expiration_time: u64,
    flags: LeaseSet2Flags,
    offline: Option<(OfflineKey, Box<dyn Verifier>)>,
}

/// Everything a successful decode commits
struct Decoded {
    identity: Option<Arc<Identity>>,
    published: u32,
    expiration_time: u64,
    flags: LeaseSet2Flags,
    offline_key: Option<OfflineKey>,
    blinded_key: Option<BlindedKey>,
    outer_ciphertext: Vec<u8>,
    encryptor: Option<Arc<dyn Encryptor>>,
    batch: Option<LeaseBatch>,
}

fn read_header(reader: &mut Reader<'_>, signer: &dyn Verifier, now: u64) -> Result<Header> {
    let published = reader.read_u32()?;
    let expires = reader.read_u16()?;
    let flags = LeaseSet2Flags::from_bits_retain(reader.read_u16()?);

    let offline = if flags.contains(LeaseSet2Flags::OFFLINE_KEYS) {
        let start = reader.position();
        let expires = reader.read_u32()?;
        let key_type = reader.read_u16()?;
        let mut verifier =
            create_verifier(key_type).ok_or(LeaseSetError::UnsupportedSigningKeyType(key_type))?;
        let public_key = reader.take(verifier.public_key_len())?;
        verifier
            .set_public_key(public_key)
            .map_err(|e| LeaseSetError::Identity(e.to_string()))?;
        let signed = reader.consumed_since(start);
        let signature = reader.take(signer.signature_len())?;
        if !signer.verify(signed, signature) {
            return Err(LeaseSetError::InvalidOfflineSignature);
        }
        if (expires as u64) * 1000 < now {
            return Err(LeaseSetError::OfflineKeyExpired);
        }
        let key = OfflineKey {
            expires,
            key_type,
            public_key: public_key.to_vec(),
        };
        Some((key, verifier))
    } else {
        None
    };

    Ok(Header {
        published,
        expiration_time: (published as u64 + expires as u64) * 1000,
        flags,
        offline,
    })
}

fn verify_signature(
    store_type: StoreType,
    buf: &[u8],
    signed_len: usize,
    verifier: &dyn Verifier,
) -> Result<()> {
    let signature = Reader::at(buf, signed_len)?.take(verifier.signature_len())?;
    let mut payload = BytesMut::with_capacity(signed_len + 1);
    payload.put_u8(store_type.code());
    payload.put_slice(&buf[..signed_len]);
    if !verifier.verify(&payload, signature) {
        return Err(LeaseSetError::InvalidSignature);
    }
    Ok(())
}

fn skip_properties(reader: &mut Reader<'_>) -> Result<()> {
    // TODO: expose the properties mapping once service records use it
    reader.read_len_prefixed()?;
    Ok(())
}

struct StandardBody {
    encryptor: Option<Arc<dyn Encryptor>>,
    batch: Option<LeaseBatch>,
}

fn read_standard_body(reader: &mut Reader<'_>, store_leases: bool, now: u64) -> Result<StandardBody> {
    skip_properties(reader)?;

    let num_keys = reader.read_u8()?;
    let mut first_key = None;
    for i in 0..num_keys {
        let key_type = reader.read_u16()?;
        let key = reader.read_len_prefixed()?;
        if i == 0 {
            first_key = Some((key_type, key));
        } else {
            debug!("LeaseSet2: skipping key section {} of type {}", i, key_type);
        }
    }

    let encryptor = match first_key {
        Some((key_type, key)) if store_leases => {
            let encryptor = create_encryptor(key_type, key);
            if encryptor.is_none() {
                warn!("LeaseSet2: unsupported encryption key type {}", key_type);
            }
            encryptor
        }
        _ => None,
    };

    let num_leases = reader.read_u8()?;
    if num_leases as usize > MAX_NUM_LEASES {
        return Err(LeaseSetError::TooManyLeases(num_leases));
    }
    let leases = (0..num_leases)
        .map(|_| {
            let gateway = reader.read_array::<32>()?;
            let tunnel_id = reader.read_u32()?;
            let end_date = reader.read_u32()? as u64 * 1000;
            Ok(Lease::new(gateway, tunnel_id, end_date))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(StandardBody {
        encryptor,
        batch: store_leases.then(|| LeaseBatch::collect(leases, now)),
    })
}

fn read_meta_body(reader: &mut Reader<'_>) -> Result<()> {
    skip_properties(reader)?;

    // hash (32) | flags (3) | cost (1) | expires (4)
    let num_entries = reader.read_u8()? as usize;
    reader.skip(num_entries * 40)?;

    let num_revocations = reader.read_u8()? as usize;
    reader.skip(num_revocations * 32)?;
    debug!(
        "LeaseSet2: meta record with {} entries, {} revocations",
        num_entries, num_revocations
    );
    Ok(())
}

fn decode_standard_or_meta(
    store_type: StoreType,
    buf: &[u8],
    store_leases: bool,
    verify: bool,
    now: u64,
) -> Result<Decoded> {
    let identity = Arc::new(Identity::from_bytes(buf).map_err(|e| identity_error(e, buf.len()))?);
    let identity_verifier = identity.create_verifier().ok_or(
        LeaseSetError::UnsupportedSigningKeyType(identity.signing_key_type().code()),
    )?;

    let mut reader = Reader::at(buf, identity.full_len())?;
    let header = read_header(&mut reader, identity_verifier.as_ref(), now)?;

    let body = match store_type {
        StoreType::Standard => read_standard_body(&mut reader, store_leases, now)?,
        StoreType::Meta => {
            read_meta_body(&mut reader)?;
            StandardBody {
                encryptor: None,
                batch: None,
            }
        }
        StoreType::Encrypted => return Err(LeaseSetError::UnsupportedStoreType(store_type.code())),
    };

    let (offline_key, offline_verifier) = header.offline.unzip();
    if verify {
        let verifier = offline_verifier.as_deref().unwrap_or(identity_verifier.as_ref());
        verify_signature(store_type, buf, reader.position(), verifier)?;
    }

    Ok(Decoded {
        identity: Some(identity),
        published: header.published,
        expiration_time: header.expiration_time,
        flags: header.flags,
        offline_key,
        blinded_key: None,
        outer_ciphertext: Vec::new(),
        encryptor: body.encryptor,
        batch: body.batch,
    })
}

fn decode_encrypted(buf: &[u8], verify: bool, now: u64) -> Result<Decoded> {
    let mut reader = Reader::new(buf);
    let key_type = reader.read_u16()?;
    let mut blinded_verifier =
        create_verifier(key_type).ok_or(LeaseSetError::UnsupportedSigningKeyType(key_type))?;
    let public_key = reader.take(blinded_verifier.public_key_len())?;
    blinded_verifier
        .set_public_key(public_key)
        .map_err(|e| LeaseSetError::Identity(e.to_string()))?;

    let header = read_header(&mut reader, blinded_verifier.as_ref(), now)?;
    let outer_ciphertext = reader.read_len_prefixed()?;

    let (offline_key, offline_verifier) = header.offline.unzip();
    if verify {
        let verifier = offline_verifier.as_deref().unwrap_or(blinded_verifier.as_ref());
        verify_signature(StoreType::Encrypted, buf, reader.position(), verifier)?;
    }

    Ok(Decoded {
        identity: None,
        published: header.published,
        expiration_time: header.expiration_time,
        flags: header.flags,
        offline_key,
        blinded_key: Some(BlindedKey {
            key_type,
            public_key: public_key.to_vec(),
        }),
        outer_ciphertext: outer_ciphertext.to_vec(),
        encryptor: None,
        batch: None,
    })
}

/// A received v2 lease set (standard, meta or encrypted)
pub struct LeaseSet2 {
    store_type: StoreType,
    identity: Option<Arc<Identity>>,
    table: LeaseTable,
    expiration_time: u64,
    published: u32,
    flags: LeaseSet2Flags,
    offline_key: Option<OfflineKey>,
    blinded_key: Option<BlindedKey>,
    outer_ciphertext: Vec<u8>,
    /// Replaced on each retaining decode; handles cloned out keep the old key
    encryptor: Option<Arc<dyn Encryptor>>,
    is_valid: bool,
    buffer: Vec<u8>,
}

impl LeaseSet2 {
    /// Decode and verify `buf` as a record of `store_type`. The buffer holds
    /// the record without its store type byte.
    pub fn new(store_type: StoreType, buf: &[u8], store_leases: bool, netdb: &dyn NetDb) -> Self {
        let mut lease_set = Self {
            store_type,
            identity: None,
            table: LeaseTable::new(store_leases),
            expiration_time: 0,
            published: 0,
            flags: LeaseSet2Flags::empty(),
            offline_key: None,
            blinded_key: None,
            outer_ciphertext: Vec::new(),
            encryptor: None,
            is_valid: false,
            buffer: buf.to_vec(),
        };
        lease_set.read_from_buffer(true, netdb);
        lease_set
    }

    /// Replace the stored buffer with a fresher record and decode it
    pub fn update(&mut self, buf: &[u8], verify_signature: bool, netdb: &dyn NetDb) {
        self.buffer.clear();
        self.buffer.extend_from_slice(buf);
        self.read_from_buffer(verify_signature, netdb);
    }

    /// Start retaining leases and re-decode the stored buffer
    pub fn populate_leases(&mut self, netdb: &dyn NetDb) {
        self.table.set_store_leases(true);
        self.read_from_buffer(true, netdb);
    }

    pub fn kind(&self) -> StoreType {
        self.store_type
    }

    /// Published timestamp in seconds since the epoch
    pub fn published_timestamp(&self) -> u32 {
        self.published
    }

    pub fn flags(&self) -> LeaseSet2Flags {
        self.flags
    }

    pub fn is_published(&self) -> bool {
        !self.flags.contains(LeaseSet2Flags::UNPUBLISHED)
    }

    pub fn offline_key(&self) -> Option<&OfflineKey> {
        self.offline_key.as_ref()
    }

    pub fn blinded_key(&self) -> Option<&BlindedKey> {
        self.blinded_key.as_ref()
    }

    /// Opaque outer ciphertext of an encrypted record
    pub fn outer_ciphertext(&self) -> &[u8] {
        &self.outer_ciphertext
    }

    pub fn encryptor(&self) -> Option<Arc<dyn Encryptor>> {
        self.encryptor.clone()
    }

    fn read_from_buffer(&mut self, verify_signature: bool, netdb: &dyn NetDb) {
        let now = millis_since_epoch();
        let store_leases = self.table.store_leases();
        let decoded = match self.store_type {
            StoreType::Encrypted => decode_encrypted(&self.buffer, verify_signature, now),
            store_type => {
                decode_standard_or_meta(store_type, &self.buffer, store_leases, verify_signature, now)
            }
        };

        match decoded {
            Ok(decoded) => {
                self.commit(decoded, netdb);
                self.is_valid = true;
            }
            Err(e) => {
                match e {
                    LeaseSetError::InvalidSignature => warn!("LeaseSet2: verification failed"),
                    e => error!("LeaseSet2: {:?} record rejected: {}", self.store_type, e),
                }
                self.is_valid = false;
            }
        }
    }

    fn commit(&mut self, decoded: Decoded, netdb: &dyn NetDb) {
        self.identity = decoded.identity;
        self.published = decoded.published;
        self.expiration_time = decoded.expiration_time;
        self.flags = decoded.flags;
        self.offline_key = decoded.offline_key;
        self.blinded_key = decoded.blinded_key;
        self.outer_ciphertext = decoded.outer_ciphertext;
        if self.store_type == StoreType::Standard && self.table.store_leases() {
            self.encryptor = decoded.encryptor;
        }
        if let Some(batch) = decoded.batch {
            self.table.merge(batch, netdb);
        }
    }

    /// Published timestamp of a raw buffer of this record's kind, 0 if it
    /// cannot be read
    fn extract_published_timestamp(&self, buf: &[u8]) -> u64 {
        let offset = match (self.store_type, &self.identity, &self.blinded_key) {
            (StoreType::Encrypted, _, Some(blinded)) => 2 + blinded.public_key.len(),
            (StoreType::Standard | StoreType::Meta, Some(identity), _) => identity.full_len(),
            _ => return 0,
        };
        Reader::at(buf, offset)
            .and_then(|mut reader| reader.read_u32())
            .map(u64::from)
            .unwrap_or(0)
    }
}

impl LeaseSetRecord for LeaseSet2 {
    fn store_type(&self) -> u8 {
        self.store_type.code()
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

    fn carries_leases(&self) -> bool {
        self.store_type == StoreType::Standard
    }

    /// Compares published timestamps
    fn is_newer(&self, buf: &[u8]) -> bool {
        self.extract_published_timestamp(buf) > self.extract_published_timestamp(&self.buffer)
    }

    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let encryptor = self
            .encryptor()
            .ok_or_else(|| LeaseSetError::Encryption("no encryptor available".to_string()))?;
        encryptor
            .encrypt(data)
            .map_err(|e| LeaseSetError::Encryption(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::LEASE_ENDDATE_THRESHOLD;
    use crate::test_utils::{RecordingNetDb, TestDestination, V2Builder};
    use veilnet_core::time::seconds_since_epoch;
    use veilnet_crypto::{
        decrypt_for_recipient, EncryptionKeypair, SigningKeypair, CRYPTO_KEY_TYPE_ECIES_X25519,
        CRYPTO_KEY_TYPE_ELGAMAL,
    };

    fn now_secs() -> u32 {
        seconds_since_epoch() as u32
    }

    fn standard_builder(dest: &TestDestination) -> V2Builder {
        let published = now_secs();
        let mut builder = V2Builder::new(published, 600);
        builder.keys.push((
            CRYPTO_KEY_TYPE_ECIES_X25519,
            dest.encryption.public_key_bytes().to_vec(),
        ));
        builder.leases.push(([1u8; 32], 11, published + 300));
        builder.leases.push(([2u8; 32], 22, published + 500));
        builder
    }

    #[test]
    fn test_store_type_codes() {
        for store_type in [StoreType::Standard, StoreType::Encrypted, StoreType::Meta] {
            assert_eq!(StoreType::try_from(store_type.code()), Ok(store_type));
        }
        assert_eq!(
            StoreType::try_from(1),
            Err(LeaseSetError::UnsupportedStoreType(1))
        );
        assert_eq!(
            StoreType::try_from(4),
            Err(LeaseSetError::UnsupportedStoreType(4))
        );
    }

    #[test]
    fn test_standard_decode() {
        let dest = TestDestination::generate();
        let builder = standard_builder(&dest);
        let buf = builder.standard(&dest);
        let netdb = RecordingNetDb::default();

        let ls = LeaseSet2::new(StoreType::Standard, &buf, true, &netdb);
        assert!(ls.is_valid());
        assert_eq!(ls.store_type(), 3);
        assert_eq!(ls.published_timestamp(), builder.published);
        assert_eq!(ls.expiration_time(), (builder.published as u64 + 600) * 1000);
        assert!(ls.is_published());
        assert!(ls.offline_key().is_none());
        assert_eq!(ls.identity().unwrap().ident_hash(), dest.identity.ident_hash());

        let leases = ls.non_expired_leases(true);
        assert_eq!(leases.len(), 2);
        let lease = ls.lease_table().snapshot().into_iter().find(|l| l.tunnel_id() == 22).unwrap();
        assert_eq!(lease.tunnel_gateway(), &[2u8; 32]);
        assert_eq!(lease.end_date(), (builder.published as u64 + 500) * 1000);
        assert_eq!(netdb.requested().len(), 2);
    }

    #[test]
    fn test_standard_encryptor_from_first_key_section() {
        let dest = TestDestination::generate();
        let mut builder = standard_builder(&dest);
        builder.keys.push((CRYPTO_KEY_TYPE_ELGAMAL, vec![0x55; 256]));
        let buf = builder.standard(&dest);

        let ls = LeaseSet2::new(StoreType::Standard, &buf, true, &RecordingNetDb::default());
        assert!(ls.is_valid());
        let blob = ls.encrypt(b"to the owner").unwrap();
        let plain = decrypt_for_recipient(&dest.encryption.secret_key_bytes(), &blob).unwrap();
        assert_eq!(plain, b"to the owner");
    }

    #[test]
    fn test_unsupported_first_key_leaves_no_encryptor() {
        let dest = TestDestination::generate();
        let mut builder = standard_builder(&dest);
        builder.keys.insert(0, (CRYPTO_KEY_TYPE_ELGAMAL, vec![0x55; 256]));
        let buf = builder.standard(&dest);

        let ls = LeaseSet2::new(StoreType::Standard, &buf, true, &RecordingNetDb::default());
        assert!(ls.is_valid());
        assert!(ls.encryptor().is_none());
        assert!(matches!(ls.encrypt(b"x"), Err(LeaseSetError::Encryption(_))));
    }

    #[test]
    fn test_no_retention_skips_leases_and_encryptor() {
        let dest = TestDestination::generate();
        let buf = standard_builder(&dest).standard(&dest);
        let netdb = RecordingNetDb::default();

        let mut ls = LeaseSet2::new(StoreType::Standard, &buf, false, &netdb);
        assert!(ls.is_valid());
        assert!(ls.lease_table().is_empty());
        assert!(ls.encryptor().is_none());
        assert!(!ls.is_expired());
        assert!(netdb.requested().is_empty());

        ls.populate_leases(&netdb);
        assert!(ls.is_valid());
        assert_eq!(ls.lease_table().len(), 2);
        assert!(ls.encryptor().is_some());
    }

    #[test]
    fn test_replacing_encryptor_keeps_old_handles_usable() {
        let dest = TestDestination::generate();
        let netdb = RecordingNetDb::default();
        let mut ls = LeaseSet2::new(
            StoreType::Standard,
            &standard_builder(&dest).standard(&dest),
            true,
            &netdb,
        );
        let old = ls.encryptor().unwrap();

        let rotated = EncryptionKeypair::generate();
        let mut builder = standard_builder(&dest);
        builder.published += 1;
        builder.keys[0].1 = rotated.public_key_bytes().to_vec();
        ls.update(&builder.standard(&dest), true, &netdb);
        assert!(ls.is_valid());

        let blob = ls.encrypt(b"new key").unwrap();
        assert_eq!(
            decrypt_for_recipient(&rotated.secret_key_bytes(), &blob).unwrap(),
            b"new key"
        );
        let blob = old.encrypt(b"old key").unwrap();
        assert_eq!(
            decrypt_for_recipient(&dest.encryption.secret_key_bytes(), &blob).unwrap(),
            b"old key"
        );
    }

    #[test]
    fn test_decoded_record_shared_with_readers() {
        let dest = TestDestination::generate();
        let ls = Arc::new(LeaseSet2::new(
            StoreType::Standard,
            &standard_builder(&dest).standard(&dest),
            true,
            &RecordingNetDb::default(),
        ));
        let reader = {
            let ls = Arc::clone(&ls);
            std::thread::spawn(move || ls.encrypt(b"from reader").unwrap())
        };
        let blob = reader.join().unwrap();
        assert_eq!(
            decrypt_for_recipient(&dest.encryption.secret_key_bytes(), &blob).unwrap(),
            b"from reader"
        );
    }

    #[test]
    fn test_properties_are_skipped() {
        let dest = TestDestination::generate();
        let mut builder = standard_builder(&dest);
        builder.properties = b"\x01a=\x01b;".to_vec();
        let ls = LeaseSet2::new(
            StoreType::Standard,
            &builder.standard(&dest),
            true,
            &RecordingNetDb::default(),
        );
        assert!(ls.is_valid());
        assert_eq!(ls.lease_table().len(), 2);
    }

    #[test]
    fn test_signature_covers_store_type() {
        let dest = TestDestination::generate();
        let buf = standard_builder(&dest).standard(&dest);
        let ls = LeaseSet2::new(StoreType::Meta, &buf, true, &RecordingNetDb::default());
        assert!(!ls.is_valid());
    }

    #[test]
    fn test_bad_signature_rejected_without_side_effects() {
        let dest = TestDestination::generate();
        let mut buf = standard_builder(&dest).standard(&dest);
        let last = buf.len() - 1;
        buf[last] ^= 0x01;
        let netdb = RecordingNetDb::default();

        let ls = LeaseSet2::new(StoreType::Standard, &buf, true, &netdb);
        assert!(!ls.is_valid());
        assert!(ls.lease_table().is_empty());
        assert!(ls.encryptor().is_none());
        assert_eq!(ls.expiration_time(), 0);
        assert!(netdb.requested().is_empty());
    }

    #[test]
    fn test_truncation_anywhere_is_rejected() {
        let dest = TestDestination::generate();
        let buf = standard_builder(&dest).offline(now_secs() + 3600).standard(&dest);
        for len in 0..buf.len() {
            let ls = LeaseSet2::new(StoreType::Standard, &buf[..len], true, &RecordingNetDb::default());
            assert!(!ls.is_valid(), "truncated to {} should be invalid", len);
        }
        assert!(LeaseSet2::new(StoreType::Standard, &buf, true, &RecordingNetDb::default()).is_valid());
    }

    #[test]
    fn test_too_many_leases_rejected() {
        let dest = TestDestination::generate();
        let mut builder = standard_builder(&dest);
        builder.leases = (0..=MAX_NUM_LEASES as u8)
            .map(|i| ([i; 32], i as u32, builder.published + 300))
            .collect();
        let ls = LeaseSet2::new(
            StoreType::Standard,
            &builder.standard(&dest),
            true,
            &RecordingNetDb::default(),
        );
        assert!(!ls.is_valid());
    }

    #[test]
    fn test_zero_leases_allowed() {
        let dest = TestDestination::generate();
        let mut builder = standard_builder(&dest);
        builder.leases.clear();
        let ls = LeaseSet2::new(
            StoreType::Standard,
            &builder.standard(&dest),
            true,
            &RecordingNetDb::default(),
        );
        assert!(ls.is_valid());
        assert!(ls.is_expired());
    }

    #[test]
    fn test_stale_leases_dropped() {
        let dest = TestDestination::generate();
        let mut builder = standard_builder(&dest);
        let stale = ((millis_since_epoch() - LEASE_ENDDATE_THRESHOLD) / 1000) as u32 - 10;
        builder.leases.push(([3u8; 32], 33, stale));
        let ls = LeaseSet2::new(
            StoreType::Standard,
            &builder.standard(&dest),
            true,
            &RecordingNetDb::default(),
        );
        assert!(ls.is_valid());
        assert_eq!(ls.lease_table().len(), 2);
    }

    #[test]
    fn test_offline_key_signs_record() {
        let dest = TestDestination::generate();
        let builder = standard_builder(&dest).offline(now_secs() + 3600);
        let buf = builder.standard(&dest);

        let ls = LeaseSet2::new(StoreType::Standard, &buf, true, &RecordingNetDb::default());
        assert!(ls.is_valid());
        assert!(ls.flags().contains(LeaseSet2Flags::OFFLINE_KEYS));
        let offline = ls.offline_key().unwrap();
        assert_eq!(offline.key_type, 7);
        assert_eq!(
            offline.public_key,
            builder.offline.as_ref().unwrap().keypair.public_key_bytes().to_vec()
        );
    }

    #[test]
    fn test_offline_key_signed_by_wrong_identity_rejected() {
        let dest = TestDestination::generate();
        let impostor = TestDestination::generate();
        let builder = standard_builder(&dest).offline(now_secs() + 3600);
        let mut buf = builder.standard(&impostor);
        // graft the real identity over the impostor's
        buf[..dest.identity.full_len()].copy_from_slice(dest.identity.as_bytes());

        let ls = LeaseSet2::new(StoreType::Standard, &buf, true, &RecordingNetDb::default());
        assert!(!ls.is_valid());
    }

    #[test]
    fn test_expired_offline_key_rejected() {
        let dest = TestDestination::generate();
        let buf = standard_builder(&dest).offline(now_secs() - 60).standard(&dest);
        let ls = LeaseSet2::new(StoreType::Standard, &buf, true, &RecordingNetDb::default());
        assert!(!ls.is_valid());
    }

    #[test]
    fn test_meta_decode() {
        let dest = TestDestination::generate();
        let builder = V2Builder::new(now_secs(), 900);
        let buf = builder.meta(&dest, 3, 2);

        let ls = LeaseSet2::new(StoreType::Meta, &buf, true, &RecordingNetDb::default());
        assert!(ls.is_valid());
        assert!(ls.lease_table().is_empty());
        assert!(!ls.is_expired());
        assert_eq!(ls.expiration_time(), (builder.published as u64 + 900) * 1000);

        assert!(!LeaseSet2::new(StoreType::Meta, &buf[..buf.len() - 65], true, &RecordingNetDb::default()).is_valid());
    }

    #[test]
    fn test_encrypted_decode() {
        let blinded = SigningKeypair::generate();
        let builder = V2Builder::new(now_secs(), 600);
        let buf = builder.encrypted(&blinded, &[0xee; 100]);

        let ls = LeaseSet2::new(StoreType::Encrypted, &buf, true, &RecordingNetDb::default());
        assert!(ls.is_valid());
        assert!(ls.identity().is_none());
        assert!(!ls.is_expired());
        let blinded_key = ls.blinded_key().unwrap();
        assert_eq!(blinded_key.key_type, 11);
        assert_eq!(blinded_key.public_key, blinded.public_key_bytes().to_vec());
        assert_eq!(ls.outer_ciphertext(), &[0xee; 100][..]);
        assert_eq!(ls.expiration_time(), (builder.published as u64 + 600) * 1000);
    }

    #[test]
    fn test_encrypted_with_offline_key() {
        let blinded = SigningKeypair::generate();
        let builder = V2Builder::new(now_secs(), 600).offline(now_secs() + 3600);
        let buf = builder.encrypted(&blinded, &[1, 2, 3]);

        let ls = LeaseSet2::new(StoreType::Encrypted, &buf, true, &RecordingNetDb::default());
        assert!(ls.is_valid());
        assert!(ls.offline_key().is_some());
    }

    #[test]
    fn test_encrypted_unknown_blinding_type_rejected() {
        let blinded = SigningKeypair::generate();
        let mut buf = V2Builder::new(now_secs(), 600).encrypted(&blinded, &[1, 2, 3]);
        buf[0] = 0x12;
        let ls = LeaseSet2::new(StoreType::Encrypted, &buf, true, &RecordingNetDb::default());
        assert!(!ls.is_valid());
    }

    #[test]
    fn test_encrypted_tampered_ciphertext_rejected() {
        let blinded = SigningKeypair::generate();
        let mut buf = V2Builder::new(now_secs(), 600).encrypted(&blinded, &[1, 2, 3]);
        buf[2 + 32 + 8 + 2] ^= 0xff;
        let ls = LeaseSet2::new(StoreType::Encrypted, &buf, true, &RecordingNetDb::default());
        assert!(!ls.is_valid());
    }

    #[test]
    fn test_is_newer_compares_published() {
        let dest = TestDestination::generate();
        let builder = standard_builder(&dest);
        let netdb = RecordingNetDb::default();
        let ls = LeaseSet2::new(StoreType::Standard, &builder.standard(&dest), true, &netdb);

        let mut newer = standard_builder(&dest);
        newer.published = builder.published + 5;
        let mut older = standard_builder(&dest);
        older.published = builder.published - 5;

        assert!(ls.is_newer(&newer.standard(&dest)));
        assert!(!ls.is_newer(&older.standard(&dest)));
        assert!(!ls.is_newer(&builder.standard(&dest)));
        assert!(!ls.is_newer(&[0u8; 4]));
    }

    #[test]
    fn test_update_sweeps_leases() {
        let dest = TestDestination::generate();
        let netdb = RecordingNetDb::default();
        let builder = standard_builder(&dest);
        let mut ls = LeaseSet2::new(StoreType::Standard, &builder.standard(&dest), true, &netdb);
        let held = ls.lease_table().snapshot();

        let mut next = standard_builder(&dest);
        next.published = builder.published + 10;
        next.leases.remove(0);
        ls.update(&next.standard(&dest), true, &netdb);

        assert!(ls.is_valid());
        assert_eq!(ls.lease_table().len(), 1);
        assert_eq!(held.iter().find(|l| l.tunnel_id() == 11).unwrap().end_date(), 0);
        assert_eq!(ls.published_timestamp(), builder.published + 10);
    }

    #[test]
    fn test_unpublished_flag() {
        let dest = TestDestination::generate();
        let mut builder = standard_builder(&dest);
        builder.flags |= LeaseSet2Flags::UNPUBLISHED.bits();
        let ls = LeaseSet2::new(
            StoreType::Standard,
            &builder.standard(&dest),
            true,
            &RecordingNetDb::default(),
        );
        assert!(ls.is_valid());
        assert!(!ls.is_published());
    }
}
