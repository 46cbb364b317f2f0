use std::collections::BTreeMap;

use tokio::sync::oneshot;

use crate::core::identifier::{Distance, Id};
use crate::core::routing_table::Peer;
use crate::core::storage::Value;
use crate::error::Error;

use super::message::Body;

/// Interaction state of one peer inside a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CandidateState {
    /// Known but not yet queried.
    Fresh,
    /// A request to it is outstanding.
    InFlight,
    /// It answered.
    Valid,
    /// It timed out or could not be reached. Never re-queried.
    Invalid,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Candidate {
    pub peer: Peer,
    pub state: CandidateState,
}

/// The peers a lookup knows about, ordered by XOR distance to the target.
///
/// Selection only ever considers the k closest entries; the lookup has
/// converged once none of those is fresh and nothing is in flight.
#[derive(Debug)]
pub(super) struct CandidateSet {
    target: Id,
    k: usize,
    candidates: BTreeMap<Distance, Candidate>,
    in_flight: usize,
}

impl CandidateSet {
    pub fn new(target: Id, k: usize) -> Self {
        Self {
            target,
            k,
            candidates: BTreeMap::new(),
            in_flight: 0,
        }
    }

    pub fn target(&self) -> Id {
        self.target
    }

    /// Populate from the routing table's closest peers, all fresh.
    pub fn seed(&mut self, peers: impl IntoIterator<Item = Peer>) {
        for peer in peers {
            self.candidates
                .entry(self.target.distance(&peer.id))
                .or_insert(Candidate { peer, state: CandidateState::Fresh });
        }
    }

    /// Pick up to `count` fresh candidates among the k closest known and
    /// mark them in flight.
    pub fn select_new_closest_candidates(&mut self, count: usize) -> Vec<Peer> {
        let mut selected = Vec::new();
        for candidate in self.candidates.values_mut().take(self.k) {
            if selected.len() >= count {
                break;
            }
            if candidate.state == CandidateState::Fresh {
                candidate.state = CandidateState::InFlight;
                self.in_flight += 1;
                selected.push(candidate.peer);
            }
        }
        selected
    }

    pub fn flag_valid(&mut self, id: &Id) {
        self.transition(id, CandidateState::Valid);
    }

    pub fn flag_invalid(&mut self, id: &Id) {
        self.transition(id, CandidateState::Invalid);
    }

    fn transition(&mut self, id: &Id, state: CandidateState) {
        let distance = self.target.distance(id);
        if let Some(candidate) = self.candidates.get_mut(&distance) {
            if candidate.state == CandidateState::InFlight {
                candidate.state = state;
                self.in_flight -= 1;
            }
        }
    }

    /// Merge peers learned from a response, fresh and unseen only.
    /// Returns true iff any of them is closer to the target than the
    /// current k-th closest known candidate.
    pub fn absorb(&mut self, peers: impl IntoIterator<Item = Peer>) -> bool {
        let kth = self.candidates.keys().nth(self.k - 1).copied();
        let mut closer = false;
        for peer in peers {
            let distance = self.target.distance(&peer.id);
            if self.candidates.contains_key(&distance) {
                continue;
            }
            self.candidates
                .insert(distance, Candidate { peer, state: CandidateState::Fresh });
            closer |= kth.map_or(true, |bound| distance < bound);
        }
        closer
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight
    }

    pub fn all_requests_completed(&self) -> bool {
        self.in_flight == 0
    }

    /// Nothing in flight and nothing fresh left worth querying.
    pub fn is_converged(&self) -> bool {
        self.all_requests_completed()
            && !self
                .candidates
                .values()
                .take(self.k)
                .any(|c| c.state == CandidateState::Fresh)
    }

    /// The `count` closest candidates that answered.
    pub fn select_closest_valid(&self, count: usize) -> Vec<Peer> {
        self.candidates
            .values()
            .filter(|c| c.state == CandidateState::Valid)
            .take(count)
            .map(|c| c.peer)
            .collect()
    }

    #[cfg(test)]
    pub fn state_of(&self, id: &Id) -> Option<CandidateState> {
        self.candidates
            .get(&self.target.distance(id))
            .map(|c| c.state)
    }
}

/// State of one `load` in progress. The caller is notified at most once;
/// the sender is consumed by the first notification.
#[derive(Debug)]
pub(super) struct FindValueContext {
    pub candidates: CandidateSet,
    tx_value: Option<oneshot::Sender<Result<Value, Error>>>,
}

impl FindValueContext {
    pub fn new(candidates: CandidateSet, tx_value: oneshot::Sender<Result<Value, Error>>) -> Self {
        Self { candidates, tx_value: Some(tx_value) }
    }

    pub fn notify_caller(&mut self, result: Result<Value, Error>) {
        if let Some(tx) = self.tx_value.take() {
            let _ = tx.send(result);
        }
    }

    pub fn is_caller_notified(&self) -> bool {
        self.tx_value.is_none()
    }
}

/// State of one `save` in progress: converge on the key's neighborhood,
/// then replicate the value onto the closest peers that answered.
#[derive(Debug)]
pub(super) struct StoreContext {
    pub candidates: CandidateSet,
    pub value: Value,
    tx_done: Option<oneshot::Sender<Result<(), Error>>>,
}

impl StoreContext {
    pub fn new(
        candidates: CandidateSet,
        value: Value,
        tx_done: oneshot::Sender<Result<(), Error>>,
    ) -> Self {
        Self { candidates, value, tx_done: Some(tx_done) }
    }

    pub fn notify_caller(&mut self, result: Result<(), Error>) {
        if let Some(tx) = self.tx_done.take() {
            let _ = tx.send(result);
        }
    }
}

/// One lookup owned by the engine.
#[derive(Debug)]
pub(super) enum LookupTask {
    FindValue(FindValueContext),
    Store(StoreContext),
}

impl LookupTask {
    pub fn candidates(&self) -> &CandidateSet {
        match self {
            LookupTask::FindValue(context) => &context.candidates,
            LookupTask::Store(context) => &context.candidates,
        }
    }

    pub fn candidates_mut(&mut self) -> &mut CandidateSet {
        match self {
            LookupTask::FindValue(context) => &mut context.candidates,
            LookupTask::Store(context) => &mut context.candidates,
        }
    }

    /// The request this lookup sends while iterating: a value lookup asks
    /// for the value, a store lookup maps the key's neighborhood.
    pub fn request_body(&self) -> Body {
        let target = self.candidates().target();
        match self {
            LookupTask::FindValue(_) => Body::FindValueRequest { target },
            LookupTask::Store(_) => Body::FindNodeRequest { target },
        }
    }
}
