use std::collections::{BTreeMap, HashMap};

use tokio::time::{sleep_until, Instant};

use crate::core::identifier::Token;

/// Deadline tracker backed by a single timer.
///
/// Deadlines are kept in a sorted multimap; `wait_expired` sleeps until the
/// earliest one and pops it. The caller's select loop re-creates that future
/// every iteration, so scheduling a new earliest deadline takes effect on
/// the next turn, which is the cancel-and-re-arm behavior of a lone timer.
/// Equal deadlines expire in insertion order.
#[derive(Debug, Default)]
pub struct TimeoutManager {
    deadlines: BTreeMap<(Instant, u64), Token>,
    index: HashMap<Token, (Instant, u64)>,
    sequence: u64,
}

impl TimeoutManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `token` to expire at `deadline`.
    pub fn expires_at(&mut self, deadline: Instant, token: Token) {
        let key = (deadline, self.sequence);
        self.sequence += 1;
        self.deadlines.insert(key, token);
        self.index.insert(token, key);
    }

    /// Drop the deadline for `token`. Returns true iff it was still
    /// scheduled.
    pub fn remove(&mut self, token: &Token) -> bool {
        match self.index.remove(token) {
            Some(key) => {
                self.deadlines.remove(&key);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
        self.index.clear();
    }

    /// Sleep until the earliest deadline, then pop and return its token.
    /// Pends forever while no deadline is scheduled. Cancellation-safe: the
    /// entry is only popped once the deadline has actually passed.
    pub async fn wait_expired(&mut self) -> Token {
        match self.deadlines.keys().next().copied() {
            Some(key) => {
                sleep_until(key.0).await;
                let token = self.deadlines.remove(&key).unwrap();
                self.index.remove(&token);
                token
            }
            None => std::future::pending().await,
        }
    }
}
