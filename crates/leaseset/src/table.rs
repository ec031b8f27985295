//! Lease table with mark-and-sweep merging
//!
//! A merge marks every retained lease as stale, refreshes or inserts the
//! leases of the incoming record, then sweeps whatever was not refreshed.
//! Swept leases get their end date zeroed before they leave the table, so a
//! caller still holding one from an earlier snapshot sees it as expired.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};
use veilnet_core::short_hash;

use crate::lease::{Lease, LeaseKey, LEASE_ENDDATE_THRESHOLD};
use crate::netdb::NetDb;

/// Leases decoded from one record that survived the freshness check
#[derive(Debug, Default)]
pub struct LeaseBatch {
    leases: Vec<Lease>,
    expiration: u64,
}

impl LeaseBatch {
    /// Filter `leases` against `now`, dropping those already past their
    /// threshold-adjusted end date
    pub fn collect(leases: impl IntoIterator<Item = Lease>, now: u64) -> Self {
        let mut batch = Self::default();
        for lease in leases {
            if !lease.is_fresh_at(now) {
                warn!(
                    "LeaseSet: lease {}:{} is expired already",
                    short_hash(lease.tunnel_gateway()),
                    lease.tunnel_id()
                );
                continue;
            }
            batch.expiration = batch.expiration.max(lease.end_date());
            batch.leases.push(lease);
        }
        batch
    }

    /// Latest end date among the fresh leases, `None` if nothing survived
    pub fn expiration(&self) -> Option<u64> {
        (!self.leases.is_empty()).then_some(self.expiration)
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }
}

struct Entry {
    lease: Arc<Lease>,
    updated: bool,
}

/// Live leases of one lease set
pub struct LeaseTable {
    entries: BTreeMap<LeaseKey, Entry>,
    store_leases: bool,
}

impl LeaseTable {
    pub fn new(store_leases: bool) -> Self {
        Self {
            entries: BTreeMap::new(),
            store_leases,
        }
    }

    pub fn store_leases(&self) -> bool {
        self.store_leases
    }

    /// Switch retention on or off. Turning it off empties the table.
    pub fn set_store_leases(&mut self, store_leases: bool) {
        self.store_leases = store_leases;
        if !store_leases {
            self.entries.clear();
        }
    }

    /// Reconcile the table with a freshly decoded batch.
    ///
    /// With retention off the table is just cleared. Gateways missing from
    /// `netdb` are requested but not waited for.
    pub fn merge(&mut self, batch: LeaseBatch, netdb: &dyn NetDb) {
        self.begin_update();
        if self.store_leases {
            for lease in batch.leases {
                self.update_lease(lease, netdb);
            }
        }
        self.end_update();
    }

    fn begin_update(&mut self) {
        if self.store_leases {
            for entry in self.entries.values_mut() {
                entry.updated = false;
            }
        } else {
            self.entries.clear();
        }
    }

    fn update_lease(&mut self, lease: Lease, netdb: &dyn NetDb) {
        let gateway = *lease.tunnel_gateway();
        let end_date = lease.end_date();
        let entry = self.entries.entry(lease.key()).or_insert_with(|| Entry {
            lease: Arc::new(lease),
            updated: false,
        });
        entry.lease.set_end_date(end_date);
        entry.updated = true;

        if !netdb.find_router(&gateway) {
            info!(
                "LeaseSet: lease's tunnel gateway {} not found, requesting",
                short_hash(&gateway)
            );
            netdb.request_destination(&gateway);
        }
    }

    fn end_update(&mut self) {
        if !self.store_leases {
            return;
        }
        self.entries.retain(|_, entry| {
            if !entry.updated {
                // may still be referenced from an earlier snapshot
                entry.lease.set_end_date(0);
            }
            entry.updated
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &LeaseKey) -> Option<Arc<Lease>> {
        self.entries.get(key).map(|entry| Arc::clone(&entry.lease))
    }

    /// All retained leases, in key order
    pub fn snapshot(&self) -> Vec<Arc<Lease>> {
        self.entries
            .values()
            .map(|entry| Arc::clone(&entry.lease))
            .collect()
    }

    /// Leases still usable at `now` that `exclude` does not reject.
    ///
    /// `with_threshold` widens each end date by the threshold; without it the
    /// threshold is subtracted, giving a conservative list.
    pub fn non_expired(
        &self,
        now: u64,
        exclude: &dyn Fn(&Lease) -> bool,
        with_threshold: bool,
    ) -> Vec<Arc<Lease>> {
        self.entries
            .values()
            .filter(|entry| {
                let end_date = entry.lease.end_date();
                let end_date = if with_threshold {
                    end_date.saturating_add(LEASE_ENDDATE_THRESHOLD)
                } else {
                    end_date.saturating_sub(LEASE_ENDDATE_THRESHOLD)
                };
                now < end_date && !exclude(&entry.lease)
            })
            .map(|entry| Arc::clone(&entry.lease))
            .collect()
    }

    /// Whether any lease's raw end date is at or before `now`
    pub fn has_expired(&self, now: u64) -> bool {
        self.entries
            .values()
            .any(|entry| now >= entry.lease.end_date())
    }
}
