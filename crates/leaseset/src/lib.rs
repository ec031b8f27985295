//! Veilnet Lease Sets
//!
//! Decoding, validation and lifecycle of lease sets: the signed records that
//! tell the network which inbound tunnels reach a destination.
//!
//! - [`LeaseSet`] decodes the legacy fixed layout
//! - [`LeaseSet2`] decodes standard, meta and encrypted v2 records
//! - [`ReceivedLeaseSet`] picks the decoder from the database store type
//! - [`LocalLeaseSet`] and [`LocalLeaseSet2`] encode our own records for signing
//! - [`validate_lease_set_buffer`] checks a legacy record without keeping state

mod dispatch;
mod lease;
mod legacy;
mod local;
mod netdb;
mod reader;
mod record;
mod table;
mod v2;
mod validate;

#[cfg(test)]
mod test_utils;

pub use dispatch::ReceivedLeaseSet;
pub use lease::{Lease, LeaseKey, LEASE2_SIZE, LEASE_ENDDATE_THRESHOLD, LEASE_SIZE, MAX_NUM_LEASES};
pub use legacy::{LeaseSet, NETDB_STORE_TYPE_LEASESET};
pub use local::{LocalLeaseSet, LocalLeaseSet2};
pub use netdb::{InboundTunnel, NetDb};
pub use record::LeaseSetRecord;
pub use table::{LeaseBatch, LeaseTable};
pub use v2::{BlindedKey, LeaseSet2, LeaseSet2Flags, OfflineKey, StoreType};
pub use validate::validate_lease_set_buffer;
