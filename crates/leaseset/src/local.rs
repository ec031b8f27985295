//! Local lease set encoders
//!
//! Both encoders leave a zeroed signature slot at the end of the buffer. The
//! owner signs [`LocalLeaseSet::signing_payload`] and hands the result to
//! `set_signature` before publishing.

use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use tracing::debug;
use veilnet_core::time::{millis_since_epoch, seconds_since_epoch};
use veilnet_core::{short_hash, LeaseSetError, Result, TunnelTimings, ENCRYPTION_KEY_LEN};
use veilnet_crypto::Identity;

use crate::lease::{LEASE2_SIZE, LEASE_SIZE, MAX_NUM_LEASES};
use crate::netdb::InboundTunnel;
use crate::v2::StoreType;

/// Upper bound of the forward nudge applied to legacy end dates, in ms
const MAX_END_DATE_NUDGE: u64 = 2000;

fn write_signature(buf: &mut [u8], signature_len: usize, signature: &[u8]) -> Result<()> {
    if signature.len() != signature_len {
        return Err(LeaseSetError::SignatureLength {
            expected: signature_len,
            actual: signature.len(),
        });
    }
    let start = buf
        .len()
        .checked_sub(signature_len)
        .ok_or(LeaseSetError::Truncated {
            needed: signature_len,
            available: buf.len(),
        })?;
    buf[start..].copy_from_slice(signature);
    Ok(())
}

/// End date of a lease on `tunnel`, in seconds
fn lease_end_date<T: InboundTunnel>(tunnel: &T, timings: &TunnelTimings) -> u64 {
    tunnel.creation_time() + timings.lease_lifetime_secs()
}

/// An unsigned legacy lease set for one of our own destinations
#[derive(Debug, Clone)]
pub struct LocalLeaseSet {
    identity: Arc<Identity>,
    buffer: Vec<u8>,
    expiration_time: u64,
}

impl LocalLeaseSet {
    pub fn new<T: InboundTunnel>(
        identity: Arc<Identity>,
        encryption_key: &[u8; ENCRYPTION_KEY_LEN],
        tunnels: &[T],
        timings: &TunnelTimings,
    ) -> Self {
        Self::build_at(identity, encryption_key, tunnels, timings, millis_since_epoch())
    }

    fn build_at<T: InboundTunnel>(
        identity: Arc<Identity>,
        encryption_key: &[u8; ENCRYPTION_KEY_LEN],
        tunnels: &[T],
        timings: &TunnelTimings,
        now: u64,
    ) -> Self {
        let tunnels = &tunnels[..tunnels.len().min(MAX_NUM_LEASES)];
        let signing_key_len = identity.signing_public_key_len();
        let mut buf = BytesMut::with_capacity(
            identity.full_len()
                + ENCRYPTION_KEY_LEN
                + signing_key_len
                + 1
                + tunnels.len() * LEASE_SIZE
                + identity.signature_len(),
        );
        buf.put_slice(identity.as_bytes());
        buf.put_slice(encryption_key);
        buf.put_bytes(0, signing_key_len);
        buf.put_u8(tunnels.len() as u8);

        let mut expiration_time = 0;
        for tunnel in tunnels {
            let end_date = lease_end_date(tunnel, timings) * 1000;
            expiration_time = expiration_time.max(end_date);

            // successive publications of the same tunnels must compare newer
            let elapsed = now.saturating_sub(tunnel.creation_time() * 1000);
            let nudge = (elapsed * 2)
                .checked_div(timings.expiration_timeout_secs)
                .unwrap_or(0)
                .min(MAX_END_DATE_NUDGE);

            buf.put_slice(&tunnel.next_ident_hash());
            buf.put_u32(tunnel.next_tunnel_id());
            buf.put_u64(end_date + nudge);
        }
        buf.put_bytes(0, identity.signature_len());

        debug!(
            "LeaseSet: encoded {} leases for {}",
            tunnels.len(),
            short_hash(identity.ident_hash())
        );
        Self {
            identity,
            buffer: buf.to_vec(),
            expiration_time,
        }
    }

    /// Wrap an already encoded record
    pub fn from_buffer(identity: Arc<Identity>, buf: &[u8], expiration_time: u64) -> Self {
        Self {
            identity,
            buffer: buf.to_vec(),
            expiration_time,
        }
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    /// The full record including its signature slot
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Bytes the owner signs
    pub fn signing_payload(&self) -> &[u8] {
        let end = self.buffer.len().saturating_sub(self.identity.signature_len());
        &self.buffer[..end]
    }

    pub fn set_signature(&mut self, signature: &[u8]) -> Result<()> {
        write_signature(&mut self.buffer, self.identity.signature_len(), signature)
    }

    /// Latest lease end date in ms, before the nudge
    pub fn expiration_time(&self) -> u64 {
        self.expiration_time
    }

    pub fn set_expiration_time(&mut self, expiration_time: u64) {
        self.expiration_time = expiration_time;
    }

    pub fn is_expired(&self) -> bool {
        millis_since_epoch() > self.expiration_time
    }
}

/// An unsigned standard v2 lease set for one of our own destinations.
///
/// The buffer starts with the store type byte, which is signed but not
/// published as part of the record.
#[derive(Debug, Clone)]
pub struct LocalLeaseSet2 {
    identity: Arc<Identity>,
    buffer: Vec<u8>,
    published: u32,
    expiration_time: u64,
}

impl LocalLeaseSet2 {
    pub fn new<T: InboundTunnel>(
        identity: Arc<Identity>,
        key_type: u16,
        encryption_key: &[u8],
        tunnels: &[T],
        timings: &TunnelTimings,
    ) -> Result<Self> {
        Self::build_at(
            identity,
            key_type,
            encryption_key,
            tunnels,
            timings,
            seconds_since_epoch(),
        )
    }

    fn build_at<T: InboundTunnel>(
        identity: Arc<Identity>,
        key_type: u16,
        encryption_key: &[u8],
        tunnels: &[T],
        timings: &TunnelTimings,
        now: u64,
    ) -> Result<Self> {
        let key_len = u16::try_from(encryption_key.len())
            .map_err(|_| LeaseSetError::EncryptionKeyTooLong(encryption_key.len()))?;
        let tunnels = &tunnels[..tunnels.len().min(MAX_NUM_LEASES)];
        let published = now as u32;
        let mut buf = BytesMut::with_capacity(
            1 + identity.full_len()
                + 4 + 2 + 2 + 2
                + 1 + 2 + 2 + encryption_key.len()
                + 1 + tunnels.len() * LEASE2_SIZE
                + identity.signature_len(),
        );
        buf.put_u8(StoreType::Standard.code());
        buf.put_slice(identity.as_bytes());
        buf.put_u32(published);
        let expires_offset = buf.len();
        buf.put_u16(0); // expires, patched below
        buf.put_u16(0); // flags
        buf.put_u16(0); // properties

        buf.put_u8(1);
        buf.put_u16(key_type);
        buf.put_u16(key_len);
        buf.put_slice(encryption_key);

        buf.put_u8(tunnels.len() as u8);
        let mut expiration = 0u64;
        for tunnel in tunnels {
            let end_date = lease_end_date(tunnel, timings);
            expiration = expiration.max(end_date);
            buf.put_slice(&tunnel.next_ident_hash());
            buf.put_u32(tunnel.next_tunnel_id());
            buf.put_u32(end_date as u32);
        }

        let expires = expiration.saturating_sub(published as u64).min(u16::MAX as u64) as u16;
        buf[expires_offset..expires_offset + 2].copy_from_slice(&expires.to_be_bytes());
        buf.put_bytes(0, identity.signature_len());

        debug!(
            "LeaseSet2: encoded {} leases for {}, expires in {}s",
            tunnels.len(),
            short_hash(identity.ident_hash()),
            expires
        );
        Ok(Self {
            identity,
            buffer: buf.to_vec(),
            published,
            expiration_time: expiration * 1000,
        })
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    pub fn store_type(&self) -> StoreType {
        StoreType::Standard
    }

    /// The published record, without the store type byte
    pub fn buffer(&self) -> &[u8] {
        &self.buffer[1..]
    }

    /// Store type byte followed by the record up to its signature
    pub fn signing_payload(&self) -> &[u8] {
        let end = self.buffer.len().saturating_sub(self.identity.signature_len());
        &self.buffer[..end]
    }

    pub fn set_signature(&mut self, signature: &[u8]) -> Result<()> {
        write_signature(&mut self.buffer, self.identity.signature_len(), signature)
    }

    pub fn published_timestamp(&self) -> u32 {
        self.published
    }

    pub fn expiration_time(&self) -> u64 {
        self.expiration_time
    }

    pub fn set_expiration_time(&mut self, expiration_time: u64) {
        self.expiration_time = expiration_time;
    }

    pub fn is_expired(&self) -> bool {
        millis_since_epoch() > self.expiration_time
    }
}
