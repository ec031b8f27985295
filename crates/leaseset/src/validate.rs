//! Stateless admission check for legacy lease sets

use tracing::error;
use veilnet_core::{LeaseSetError, Result};
use veilnet_crypto::Identity;

use crate::legacy::{identity_error, parse_legacy_body, verify_legacy_signature};

/// Parse and verify a legacy record without keeping any state.
///
/// Returns the latest raw lease end date in ms. Lease freshness is not
/// checked here; callers compare the result against their own clock.
pub fn validate_lease_set_buffer(buf: &[u8]) -> Result<u64> {
    let checked = || -> Result<u64> {
        let identity = Identity::from_bytes(buf).map_err(|e| identity_error(e, buf.len()))?;
        let body = parse_legacy_body(buf, &identity)?;
        let expires = body
            .leases
            .iter()
            .map(|lease| lease.end_date())
            .max()
            .ok_or(LeaseSetError::InvalidLeaseCount(0))?;
        verify_legacy_signature(buf, &identity, body.signed_len)?;
        Ok(expires)
    };
    checked().map_err(|e| {
        error!("LeaseSet: buffer rejected: {}", e);
        e
    })
}
