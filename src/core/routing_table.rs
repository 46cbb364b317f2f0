use std::net::SocketAddr;

use super::identifier::{Id, ID_BITS};

/// A peer known to the overlay: its identifier and the UDP endpoint it can
/// be reached at. The address family decides which socket is used to reach
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Peer {
    pub id: Id,
    pub address: SocketAddr,
}

impl Peer {
    pub fn new(id: Id, address: SocketAddr) -> Self {
        Self { id, address }
    }
}

/// Outcome of a `push` into the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    Inserted,
    AlreadyPresent,
    /// The id was known under a different address; the address was updated.
    Updated,
    /// The target bucket is full; the new peer was dropped.
    Discarded,
    /// The peer carries our own id and is never stored.
    RejectedSelf,
}

/// Routing table keyed by XOR distance to the local id.
///
/// Bucket `i` holds peers whose distance from the local id has its highest
/// set bit at position `i`. Buckets are capped at `k` entries and a push
/// into a full bucket is dropped; there is no eviction probing in this
/// variant.
#[derive(Debug)]
pub struct RoutingTable {
    my_id: Id,
    k: usize,
    buckets: Vec<Vec<Peer>>,
}

impl RoutingTable {
    pub fn new(my_id: Id, k: usize) -> Self {
        Self {
            my_id,
            k,
            buckets: (0..ID_BITS).map(|_| Vec::new()).collect(),
        }
    }

    pub fn my_id(&self) -> Id {
        self.my_id
    }

    /// Insert a peer, or refresh the address of a peer we already know.
    pub fn push(&mut self, id: Id, address: SocketAddr) -> PushResult {
        let Some(index) = self.my_id.distance(&id).highest_set_bit() else {
            // Zero distance: the peer claims our own id.
            return PushResult::RejectedSelf;
        };

        let bucket = &mut self.buckets[index];
        if let Some(existing) = bucket.iter_mut().find(|p| p.id == id) {
            if existing.address == address {
                return PushResult::AlreadyPresent;
            }
            existing.address = address;
            return PushResult::Updated;
        }

        if bucket.len() >= self.k {
            tracing::debug!(peer = %id.short_hex(), bucket = index, "bucket full, peer dropped");
            return PushResult::Discarded;
        }

        bucket.push(Peer::new(id, address));
        PushResult::Inserted
    }

    /// All known peers ordered by increasing XOR distance to `target`.
    pub fn find(&self, target: &Id) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self.buckets.iter().flatten().copied().collect();
        peers.sort_by_key(|p| p.id.distance(target));
        peers
    }

    /// The k closest known peers to `target`.
    pub fn k_closest(&self, target: &Id) -> Vec<Peer> {
        let mut peers = self.find(target);
        peers.truncate(self.k);
        peers
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.my_id
            .distance(id)
            .highest_set_bit()
            .map(|index| self.buckets[index].iter().any(|p| p.id == *id))
            .unwrap_or(false)
    }

    /// Total number of peers across all buckets.
    pub fn peer_count(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }
}
