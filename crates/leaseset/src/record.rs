//! Query surface shared by every received lease set kind

use std::sync::Arc;

use rand::Rng;
use veilnet_core::time::millis_since_epoch;
use veilnet_core::Result;
use veilnet_crypto::Identity;

use crate::lease::Lease;
use crate::table::LeaseTable;

pub trait LeaseSetRecord {
    /// Database store type byte of this record
    fn store_type(&self) -> u8;

    /// Owning identity; `None` for encrypted records and records whose
    /// identity could not be parsed
    fn identity(&self) -> Option<&Arc<Identity>>;

    /// Result of the last decode
    fn is_valid(&self) -> bool;

    /// Record expiration in milliseconds since the epoch
    fn expiration_time(&self) -> u64;

    fn lease_table(&self) -> &LeaseTable;

    /// The raw record as last received
    fn buffer(&self) -> &[u8];

    /// Whether this kind of record carries leases at all
    fn carries_leases(&self) -> bool {
        true
    }

    /// Whether `buf` holds a fresher version of this record
    fn is_newer(&self, buf: &[u8]) -> bool;

    /// Encrypt `data` to the record's owner
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn store_leases(&self) -> bool {
        self.lease_table().store_leases()
    }

    fn is_empty(&self) -> bool {
        self.lease_table().is_empty()
    }

    fn is_expired(&self) -> bool {
        self.is_expired_at(millis_since_epoch())
    }

    fn is_expired_at(&self, now: u64) -> bool {
        if self.store_leases() && self.carries_leases() && self.is_empty() {
            return true;
        }
        now > self.expiration_time()
    }

    /// Whether the record is expired or expires within `dlt` ms. A non-zero
    /// `fudge` adds up to `fudge` ms of random offset to the clock sample.
    fn expires_soon(&self, dlt: u64, fudge: u64) -> bool {
        self.expires_soon_at(millis_since_epoch(), dlt, fudge)
    }

    fn expires_soon_at(&self, now: u64, dlt: u64, fudge: u64) -> bool {
        let mut now = now;
        if fudge > 0 {
            now = now.saturating_add(rand::thread_rng().gen_range(0..fudge));
        }
        let expiration = self.expiration_time();
        if now >= expiration {
            return true;
        }
        expiration - now <= dlt
    }

    fn non_expired_leases(&self, with_threshold: bool) -> Vec<Arc<Lease>> {
        self.non_expired_leases_excluding(&|_| false, with_threshold)
    }

    /// Usable leases not rejected by `exclude`
    fn non_expired_leases_excluding(
        &self,
        exclude: &dyn Fn(&Lease) -> bool,
        with_threshold: bool,
    ) -> Vec<Arc<Lease>> {
        self.lease_table()
            .non_expired(millis_since_epoch(), exclude, with_threshold)
    }

    fn has_expired_leases(&self) -> bool {
        self.lease_table().has_expired(millis_since_epoch())
    }
}
