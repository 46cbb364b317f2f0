use std::collections::HashMap;

use crate::core::identifier::{Id, Token};
use crate::error::Error;

/// Identifies one lookup owned by the engine.
pub type LookupId = u64;

/// What a pending response token resolves to. Pure data; the engine
/// interprets it once the dispatcher has matched the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Association {
    /// The initial-contact FIND_NODE of the bootstrap sequence.
    Bootstrap,
    /// A request issued on behalf of a lookup, addressed to `peer`.
    Lookup { lookup: LookupId, peer: Id },
}

/// Routes responses to the request that is waiting for them, keyed by the
/// random token carried in the header. Bodies are never inspected here.
#[derive(Debug, Default)]
pub struct ResponseDispatcher {
    associations: HashMap<Token, Association>,
}

impl ResponseDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending response. Token collisions are a programmer
    /// error; 160-bit random tokens make them unreachable in practice.
    pub fn push(&mut self, token: Token, association: Association) {
        let previous = self.associations.insert(token, association);
        debug_assert!(previous.is_none(), "token collision");
    }

    /// Match a response token. On a hit the association is consumed.
    pub fn dispatch(&mut self, token: &Token) -> Result<Association, Error> {
        self.associations
            .remove(token)
            .ok_or(Error::UnassociatedMessageId)
    }

    /// Timeout path: drop the association if the response never arrived.
    pub fn remove(&mut self, token: &Token) -> Option<Association> {
        self.associations.remove(token)
    }

    pub fn len(&self) -> usize {
        self.associations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }

    pub fn clear(&mut self) {
        self.associations.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dispatch_consumes_the_association() {
        let mut dispatcher = ResponseDispatcher::new();
        let token = Id::random();
        dispatcher.push(token, Association::Bootstrap);

        assert_eq!(dispatcher.dispatch(&token).unwrap(), Association::Bootstrap);
        assert!(matches!(
            dispatcher.dispatch(&token),
            Err(Error::UnassociatedMessageId)
        ));
    }

    #[test]
    fn unknown_token_is_unassociated() {
        let mut dispatcher = ResponseDispatcher::new();
        assert!(matches!(
            dispatcher.dispatch(&Id::random()),
            Err(Error::UnassociatedMessageId)
        ));
    }

    #[test]
    fn remove_reports_whether_the_response_was_still_pending() {
        let mut dispatcher = ResponseDispatcher::new();
        let token = Id::random();
        let peer = Id::random();
        dispatcher.push(token, Association::Lookup { lookup: 7, peer });

        assert_eq!(
            dispatcher.remove(&token),
            Some(Association::Lookup { lookup: 7, peer })
        );
        assert_eq!(dispatcher.remove(&token), None);
        assert!(dispatcher.is_empty());
    }
}
