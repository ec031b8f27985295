//! Leases: advertised ingress tunnel endpoints with an end date

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use veilnet_core::{short_hash, IdentHash, TunnelId};

/// Maximum number of leases a lease set may carry
pub const MAX_NUM_LEASES: usize = 16;

/// Wire size of a legacy lease: gateway (32) + tunnel id (4) + end date in ms (8)
pub const LEASE_SIZE: usize = 44;

/// Wire size of a v2 lease: gateway (32) + tunnel id (4) + end date in seconds (4)
pub const LEASE2_SIZE: usize = 40;

/// Slack (ms) applied to lease end dates, both when accepting leases and
/// when handing them out.
pub const LEASE_ENDDATE_THRESHOLD: u64 = 51_000;

/// Identity of a lease within a lease set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeaseKey {
    pub tunnel_gateway: IdentHash,
    pub tunnel_id: TunnelId,
}

/// A single lease.
///
/// Leases are shared as `Arc<Lease>`; only the end date is mutable so that a
/// lease dropped from its table can be expired under existing holders.
pub struct Lease {
    tunnel_gateway: IdentHash,
    tunnel_id: TunnelId,
    end_date: AtomicU64,
}

impl Lease {
    pub fn new(tunnel_gateway: IdentHash, tunnel_id: TunnelId, end_date: u64) -> Self {
        Self {
            tunnel_gateway,
            tunnel_id,
            end_date: AtomicU64::new(end_date),
        }
    }

    pub fn tunnel_gateway(&self) -> &IdentHash {
        &self.tunnel_gateway
    }

    pub fn tunnel_id(&self) -> TunnelId {
        self.tunnel_id
    }

    /// End date in milliseconds since the epoch; 0 once the lease was swept
    pub fn end_date(&self) -> u64 {
        self.end_date.load(Ordering::Acquire)
    }

    pub(crate) fn set_end_date(&self, end_date: u64) {
        self.end_date.store(end_date, Ordering::Release);
    }

    pub fn key(&self) -> LeaseKey {
        LeaseKey {
            tunnel_gateway: self.tunnel_gateway,
            tunnel_id: self.tunnel_id,
        }
    }

    /// Whether the lease is still acceptable at `now` once the end date
    /// threshold is applied
    pub fn is_fresh_at(&self, now: u64) -> bool {
        now < self.end_date().saturating_add(LEASE_ENDDATE_THRESHOLD)
    }
}

impl Clone for Lease {
    fn clone(&self) -> Self {
        Self::new(self.tunnel_gateway, self.tunnel_id, self.end_date())
    }
}

impl PartialEq for Lease {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key() && self.end_date() == other.end_date()
    }
}

impl Eq for Lease {}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("tunnel_gateway", &short_hash(&self.tunnel_gateway))
            .field("tunnel_id", &self.tunnel_id)
            .field("end_date", &self.end_date())
            .finish()
    }
}
