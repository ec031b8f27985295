//! Store type dispatch for received records

use std::sync::Arc;

use tracing::{debug, warn};
use veilnet_core::{LeaseSetConfig, LeaseSetError, Result};
use veilnet_crypto::Identity;

use crate::legacy::{LeaseSet, NETDB_STORE_TYPE_LEASESET};
use crate::netdb::NetDb;
use crate::record::LeaseSetRecord;
use crate::table::LeaseTable;
use crate::v2::{LeaseSet2, StoreType};

/// Any received lease set, keyed by its database store type
pub enum ReceivedLeaseSet {
    Legacy(LeaseSet),
    V2(LeaseSet2),
}

impl ReceivedLeaseSet {
    /// Decode `buf` with the decoder matching `store_type`. Only an unknown
    /// store type is an error here; decode failures show up as an invalid
    /// record.
    pub fn decode(
        store_type: u8,
        buf: &[u8],
        config: &LeaseSetConfig,
        netdb: &dyn NetDb,
    ) -> Result<Self> {
        let record = if store_type == NETDB_STORE_TYPE_LEASESET {
            ReceivedLeaseSet::Legacy(LeaseSet::new(buf, config.store_leases, netdb))
        } else {
            let kind = StoreType::try_from(store_type).map_err(|e| {
                warn!("LeaseSet: unknown store type {}", store_type);
                e
            })?;
            ReceivedLeaseSet::V2(LeaseSet2::new(kind, buf, config.store_leases, netdb))
        };
        debug!(
            "LeaseSet: decoded store type {}, valid={}",
            store_type,
            record.is_valid()
        );
        Ok(record)
    }

    /// Decode a fresher record of the same kind into this one
    pub fn update(&mut self, buf: &[u8], verify_signature: bool, netdb: &dyn NetDb) {
        match self {
            ReceivedLeaseSet::Legacy(ls) => ls.update(buf, verify_signature, netdb),
            ReceivedLeaseSet::V2(ls) => ls.update(buf, verify_signature, netdb),
        }
    }

    pub fn populate_leases(&mut self, netdb: &dyn NetDb) {
        match self {
            ReceivedLeaseSet::Legacy(ls) => ls.populate_leases(netdb),
            ReceivedLeaseSet::V2(ls) => ls.populate_leases(netdb),
        }
    }

    pub fn as_record(&self) -> &dyn LeaseSetRecord {
        match self {
            ReceivedLeaseSet::Legacy(ls) => ls,
            ReceivedLeaseSet::V2(ls) => ls,
        }
    }
}

impl LeaseSetRecord for ReceivedLeaseSet {
    fn store_type(&self) -> u8 {
        self.as_record().store_type()
    }

    fn identity(&self) -> Option<&Arc<Identity>> {
        self.as_record().identity()
    }

    fn is_valid(&self) -> bool {
        self.as_record().is_valid()
    }

    fn expiration_time(&self) -> u64 {
        self.as_record().expiration_time()
    }

    fn lease_table(&self) -> &LeaseTable {
        self.as_record().lease_table()
    }

    fn buffer(&self) -> &[u8] {
        self.as_record().buffer()
    }

    fn carries_leases(&self) -> bool {
        self.as_record().carries_leases()
    }

    fn is_newer(&self, buf: &[u8]) -> bool {
        self.as_record().is_newer(buf)
    }

    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.as_record().encrypt(data)
    }
}

impl std::fmt::Debug for ReceivedLeaseSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceivedLeaseSet")
            .field("store_type", &self.store_type())
            .field("valid", &self.is_valid())
            .field("expiration_time", &self.expiration_time())
            .finish()
    }
}

impl From<LeaseSet> for ReceivedLeaseSet {
    fn from(ls: LeaseSet) -> Self {
        ReceivedLeaseSet::Legacy(ls)
    }
}

impl From<LeaseSet2> for ReceivedLeaseSet {
    fn from(ls: LeaseSet2) -> Self {
        ReceivedLeaseSet::V2(ls)
    }
}

impl TryFrom<&ReceivedLeaseSet> for StoreType {
    type Error = LeaseSetError;

    fn try_from(record: &ReceivedLeaseSet) -> Result<Self> {
        match record {
            ReceivedLeaseSet::Legacy(_) => Err(LeaseSetError::UnsupportedStoreType(
                NETDB_STORE_TYPE_LEASESET,
            )),
            ReceivedLeaseSet::V2(ls) => Ok(ls.kind()),
        }
    }
}
