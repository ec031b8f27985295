//! Collaborator seams: the network database and local inbound tunnels

use std::sync::Arc;

use veilnet_core::{IdentHash, TunnelId};

/// The parts of the network database the lease table talks to
pub trait NetDb: Send + Sync {
    /// Whether a router with this identity hash is known locally
    fn find_router(&self, ident: &IdentHash) -> bool;

    /// Ask the database to look the router up. Fire-and-forget.
    fn request_destination(&self, ident: &IdentHash);
}

impl<T: NetDb + ?Sized> NetDb for Arc<T> {
    fn find_router(&self, ident: &IdentHash) -> bool {
        (**self).find_router(ident)
    }

    fn request_destination(&self, ident: &IdentHash) {
        (**self).request_destination(ident)
    }
}

/// A local inbound tunnel as seen by the lease set encoders
pub trait InboundTunnel {
    /// Identity hash of the tunnel gateway (the hop that receives from outside)
    fn next_ident_hash(&self) -> IdentHash;

    /// Tunnel id at the gateway
    fn next_tunnel_id(&self) -> TunnelId;

    /// Creation time in seconds since the epoch
    fn creation_time(&self) -> u64;
}

impl<T: InboundTunnel + ?Sized> InboundTunnel for Arc<T> {
    fn next_ident_hash(&self) -> IdentHash {
        (**self).next_ident_hash()
    }

    fn next_tunnel_id(&self) -> TunnelId {
        (**self).next_tunnel_id()
    }

    fn creation_time(&self) -> u64 {
        (**self).creation_time()
    }
}
