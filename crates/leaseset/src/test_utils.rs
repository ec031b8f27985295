//! Test doubles and record builders

use std::collections::HashSet;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use parking_lot::Mutex;
use veilnet_core::{IdentHash, TunnelId};
use veilnet_crypto::{
    EncryptionKeypair, Identity, SigningKeypair, CRYPTO_KEY_TYPE_ECIES_X25519,
};

use crate::netdb::{InboundTunnel, NetDb};
use crate::v2::StoreType;

/// Network database double that records lookup requests
#[derive(Default)]
pub(crate) struct RecordingNetDb {
    known: HashSet<IdentHash>,
    requested: Mutex<Vec<IdentHash>>,
}

impl RecordingNetDb {
    pub(crate) fn with_known(routers: &[IdentHash]) -> Self {
        Self {
            known: routers.iter().copied().collect(),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requested(&self) -> Vec<IdentHash> {
        self.requested.lock().clone()
    }
}

impl NetDb for RecordingNetDb {
    fn find_router(&self, ident: &IdentHash) -> bool {
        self.known.contains(ident)
    }

    fn request_destination(&self, ident: &IdentHash) {
        self.requested.lock().push(*ident);
    }
}

pub(crate) struct TestTunnel {
    pub gateway: IdentHash,
    pub tunnel_id: TunnelId,
    pub created: u64,
}

impl InboundTunnel for TestTunnel {
    fn next_ident_hash(&self) -> IdentHash {
        self.gateway
    }

    fn next_tunnel_id(&self) -> TunnelId {
        self.tunnel_id
    }

    fn creation_time(&self) -> u64 {
        self.created
    }
}

/// A destination with its private keys
pub(crate) struct TestDestination {
    pub signing: SigningKeypair,
    pub encryption: EncryptionKeypair,
    pub identity: Arc<Identity>,
}

impl TestDestination {
    pub(crate) fn generate() -> Self {
        veilnet_logging::init_for_tests();
        let signing = SigningKeypair::generate();
        let encryption = EncryptionKeypair::generate();
        let identity = Arc::new(Identity::new_ed25519(
            &signing.public_key_bytes(),
            CRYPTO_KEY_TYPE_ECIES_X25519,
            &encryption.padded_public_key(),
        ));
        Self {
            signing,
            encryption,
            identity,
        }
    }
}

/// Signed legacy record with `(gateway, tunnel id, end date ms)` leases
pub(crate) fn legacy_buffer(dest: &TestDestination, leases: &[(IdentHash, TunnelId, u64)]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_slice(dest.identity.as_bytes());
    buf.put_slice(&dest.encryption.padded_public_key());
    buf.put_bytes(0, dest.identity.signing_public_key_len());
    buf.put_u8(leases.len() as u8);
    for (gateway, tunnel_id, end_date) in leases {
        buf.put_slice(gateway);
        buf.put_u32(*tunnel_id);
        buf.put_u64(*end_date);
    }
    let signature = dest.signing.sign(&buf);
    buf.put_slice(&signature);
    buf.to_vec()
}

/// Offline signing key delegated by a signer
pub(crate) struct TestOfflineKey {
    pub keypair: SigningKeypair,
    pub expires: u32,
}

/// Builder for v2 records. Leases carry end dates in seconds.
pub(crate) struct V2Builder {
    pub published: u32,
    pub expires: u16,
    pub flags: u16,
    pub offline: Option<TestOfflineKey>,
    pub properties: Vec<u8>,
    pub keys: Vec<(u16, Vec<u8>)>,
    pub leases: Vec<(IdentHash, TunnelId, u32)>,
}

impl V2Builder {
    pub(crate) fn new(published: u32, expires: u16) -> Self {
        Self {
            published,
            expires,
            flags: 0,
            offline: None,
            properties: Vec::new(),
            keys: Vec::new(),
            leases: Vec::new(),
        }
    }

    pub(crate) fn offline(mut self, expires: u32) -> Self {
        self.flags |= 0x0001;
        self.offline = Some(TestOfflineKey {
            keypair: SigningKeypair::generate(),
            expires,
        });
        self
    }

    fn put_header(&self, buf: &mut BytesMut, signer: &SigningKeypair) {
        buf.put_u32(self.published);
        buf.put_u16(self.expires);
        buf.put_u16(self.flags);
        if let Some(offline) = &self.offline {
            let start = buf.len();
            buf.put_u32(offline.expires);
            buf.put_u16(7);
            buf.put_slice(&offline.keypair.public_key_bytes());
            let signature = signer.sign(&buf[start..]);
            buf.put_slice(&signature);
        }
    }

    fn record_signer<'a>(&'a self, signer: &'a SigningKeypair) -> &'a SigningKeypair {
        self.offline.as_ref().map(|o| &o.keypair).unwrap_or(signer)
    }

    fn finish(&self, store_type: StoreType, body: BytesMut, signer: &SigningKeypair) -> Vec<u8> {
        let mut signed = BytesMut::with_capacity(body.len() + 1);
        signed.put_u8(store_type.code());
        signed.put_slice(&body);
        let signature = self.record_signer(signer).sign(&signed);
        let mut out = body.to_vec();
        out.extend_from_slice(&signature);
        out
    }

    pub(crate) fn standard(&self, dest: &TestDestination) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_slice(dest.identity.as_bytes());
        self.put_header(&mut buf, &dest.signing);
        buf.put_u16(self.properties.len() as u16);
        buf.put_slice(&self.properties);
        buf.put_u8(self.keys.len() as u8);
        for (key_type, key) in &self.keys {
            buf.put_u16(*key_type);
            buf.put_u16(key.len() as u16);
            buf.put_slice(key);
        }
        buf.put_u8(self.leases.len() as u8);
        for (gateway, tunnel_id, end_date) in &self.leases {
            buf.put_slice(gateway);
            buf.put_u32(*tunnel_id);
            buf.put_u32(*end_date);
        }
        self.finish(StoreType::Standard, buf, &dest.signing)
    }

    pub(crate) fn meta(&self, dest: &TestDestination, entries: u8, revocations: u8) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_slice(dest.identity.as_bytes());
        self.put_header(&mut buf, &dest.signing);
        buf.put_u16(self.properties.len() as u16);
        buf.put_slice(&self.properties);
        buf.put_u8(entries);
        for i in 0..entries {
            buf.put_slice(&[i; 32]);
            buf.put_bytes(0, 3);
            buf.put_u8(1);
            buf.put_u32(self.published + 600);
        }
        buf.put_u8(revocations);
        for i in 0..revocations {
            buf.put_slice(&[0x80 | i; 32]);
        }
        self.finish(StoreType::Meta, buf, &dest.signing)
    }

    /// Encrypted record whose blinded key is `blinded`'s public key
    pub(crate) fn encrypted(&self, blinded: &SigningKeypair, outer_ciphertext: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u16(11);
        buf.put_slice(&blinded.public_key_bytes());
        self.put_header(&mut buf, blinded);
        buf.put_u16(outer_ciphertext.len() as u16);
        buf.put_slice(outer_ciphertext);
        self.finish(StoreType::Encrypted, buf, blinded)
    }
}
