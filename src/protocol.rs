use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::net::lookup_host;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::core::identifier::{Id, Key, Token};
use crate::core::routing_table::RoutingTable;
use crate::core::storage::{Storage, Value};
use crate::error::Error;

pub mod command;
pub mod dispatcher;
mod lookup;
pub mod message;
pub mod socket;
pub mod timeout;

pub use self::command::Command;
use self::dispatcher::{Association, LookupId, ResponseDispatcher};
use self::lookup::{CandidateSet, FindValueContext, LookupTask, StoreContext};
use self::message::{Body, Message};
use self::socket::MessageSocketPair;
use self::timeout::TimeoutManager;

/// Bucket width, and the most peers a FIND_NODE response carries.
pub const K: usize = 20;
/// Per-iteration lookup parallelism.
pub const ALPHA: usize = 3;
/// How many peers a saved value is replicated onto.
pub const REDUNDANCY: usize = 3;

const LOOKUP_REQUEST_TIMEOUT: Duration = Duration::from_millis(20);
const INITIAL_CONTACT_TIMEOUT: Duration = Duration::from_secs(1);
/// Per-socket receive buffer. Larger datagrams arrive truncated and are
/// then dropped by the codec.
const INPUT_BUFFER_SIZE: usize = 1500;

#[derive(Debug)]
struct BootstrapState {
    /// Resolved addresses still to try, consumed from the back.
    remaining: Vec<SocketAddr>,
}

/// What to do with a lookup after a response has been folded in.
enum LookupStep {
    Drive,
    Remove,
    Keep,
}

/// The single-threaded heart of a node.
///
/// Owns the sockets, the routing table, the value store, the dispatcher and
/// the timeout manager, and multiplexes all of them from one task: inbound
/// datagrams on either socket, caller commands, and request deadlines. All
/// state mutation happens between awaits on that task, so none of it is
/// locked.
#[derive(Debug)]
pub struct Engine {
    my_id: Id,
    sockets: MessageSocketPair,
    initial_peer: String,
    rx: mpsc::UnboundedReceiver<Command>,
    rx_open: bool,
    routing_table: RoutingTable,
    storage: Storage,
    dispatcher: ResponseDispatcher,
    timeouts: TimeoutManager,
    lookups: HashMap<LookupId, LookupTask>,
    next_lookup_id: LookupId,
    bootstrap: Option<BootstrapState>,
    failure: Option<Error>,
}

impl Engine {
    /// Build an engine around bound sockets. No traffic is emitted until
    /// `run`.
    pub(crate) fn new(
        sockets: MessageSocketPair,
        initial_peer: String,
        rx: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let my_id = Id::random();
        info!(id = %my_id.short_hex(), "node identifier generated");
        Self {
            my_id,
            sockets,
            initial_peer,
            rx,
            rx_open: true,
            routing_table: RoutingTable::new(my_id, K),
            storage: Storage::new(),
            dispatcher: ResponseDispatcher::new(),
            timeouts: TimeoutManager::new(),
            lookups: HashMap::new(),
            next_lookup_id: 0,
            bootstrap: None,
            failure: None,
        }
    }

    pub fn my_id(&self) -> Id {
        self.my_id
    }

    /// Event loop. Contacts the initial peer, then serves and issues
    /// requests until an abort command or the first fatal error.
    pub(crate) async fn run(&mut self) -> Error {
        self.reset();
        self.start_bootstrap().await;
        if let Some(failure) = self.failure.take() {
            return failure;
        }

        let mut buf_v4 = [0u8; INPUT_BUFFER_SIZE];
        let mut buf_v6 = [0u8; INPUT_BUFFER_SIZE];

        loop {
            tokio::select! {
                received = self.sockets.v4().recv_from(&mut buf_v4) => match received {
                    Ok((len, sender)) => self.on_datagram(sender, &buf_v4[..len]).await,
                    Err(error) => return error.into(),
                },
                received = self.sockets.v6().recv_from(&mut buf_v6) => match received {
                    Ok((len, sender)) => self.on_datagram(sender, &buf_v6[..len]).await,
                    Err(error) => return error.into(),
                },
                command = self.rx.recv(), if self.rx_open => match command {
                    Some(command) => self.on_command(command).await,
                    None => self.rx_open = false,
                },
                token = self.timeouts.wait_expired() => self.on_timeout(token).await,
            }

            if let Some(failure) = self.failure.take() {
                return failure;
            }
        }
    }

    /// Drop the state of a previous run so the loop starts clean.
    fn reset(&mut self) {
        self.failure = None;
        self.bootstrap = None;
        self.dispatcher.clear();
        self.timeouts.clear();
        // Dropping a context drops its completion channel, which the
        // façade reports as an aborted run.
        self.lookups.clear();
    }

    async fn start_bootstrap(&mut self) {
        let resolved: Vec<SocketAddr> = match lookup_host(self.initial_peer.as_str()).await {
            Ok(addresses) => addresses.collect(),
            Err(error) => {
                warn!(peer = %self.initial_peer, %error, "initial peer did not resolve");
                self.failure = Some(Error::InitialPeerFailedToRespond);
                return;
            }
        };
        info!(peer = %self.initial_peer, candidates = resolved.len(), "contacting initial peer");
        self.bootstrap = Some(BootstrapState { remaining: resolved });
        self.contact_next_initial_address().await;
    }

    /// Send FIND_NODE for our own id to the next candidate address of the
    /// initial peer. Exhaustion is fatal.
    async fn contact_next_initial_address(&mut self) {
        loop {
            let Some(address) = self.bootstrap.as_mut().and_then(|s| s.remaining.pop()) else {
                self.bootstrap = None;
                self.failure = Some(Error::InitialPeerFailedToRespond);
                return;
            };
            let body = Body::FindNodeRequest { target: self.my_id };
            if self
                .send_request(address, body, Association::Bootstrap, INITIAL_CONTACT_TIMEOUT)
                .await
            {
                return;
            }
        }
    }

    /// Serialize and send one request, then register the token with the
    /// dispatcher and its deadline with the timeout manager. Returns false
    /// if the datagram could not be handed to the socket.
    async fn send_request(
        &mut self,
        address: SocketAddr,
        body: Body,
        association: Association,
        timeout: Duration,
    ) -> bool {
        let token = Token::random();
        let message = Message::new(self.my_id, token, body);
        match self.sockets.send(address, &message.encode()).await {
            Ok(_) => {
                self.dispatcher.push(token, association);
                self.timeouts.expires_at(Instant::now() + timeout, token);
                true
            }
            Err(error) => {
                debug!(%address, %error, "request send failed");
                false
            }
        }
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Save { key, value, tx_done } => self.start_save(key, value, tx_done).await,
            Command::Load { key, tx_value } => self.start_load(key, tx_value).await,
            Command::Abort => self.failure = Some(Error::RunAborted),
        }
    }

    async fn start_load(&mut self, key: Key, tx_value: oneshot::Sender<Result<Value, Error>>) {
        if let Some(value) = self.storage.get(&key) {
            let _ = tx_value.send(Ok(value.clone()));
            return;
        }

        let mut candidates = CandidateSet::new(key, K);
        candidates.seed(self.routing_table.k_closest(&key));
        let id = self.allocate_lookup_id();
        self.lookups
            .insert(id, LookupTask::FindValue(FindValueContext::new(candidates, tx_value)));
        self.drive_lookup(id).await;
    }

    async fn start_save(
        &mut self,
        key: Key,
        value: Value,
        tx_done: oneshot::Sender<Result<(), Error>>,
    ) {
        let mut candidates = CandidateSet::new(key, K);
        candidates.seed(self.routing_table.k_closest(&key));
        let id = self.allocate_lookup_id();
        self.lookups
            .insert(id, LookupTask::Store(StoreContext::new(candidates, value, tx_done)));
        self.drive_lookup(id).await;
    }

    fn allocate_lookup_id(&mut self) -> LookupId {
        let id = self.next_lookup_id;
        self.next_lookup_id += 1;
        id
    }

    /// Keep up to α requests of this lookup in flight, then settle it if
    /// it has converged. A send failure invalidates the candidate on the
    /// spot and frees its slot for the next closest one.
    async fn drive_lookup(&mut self, id: LookupId) {
        loop {
            let (body, batch) = match self.lookups.get_mut(&id) {
                Some(task) => {
                    // An answered value lookup stops querying; it only
                    // waits out its outstanding requests.
                    let answered =
                        matches!(task, LookupTask::FindValue(c) if c.is_caller_notified());
                    let slots = if answered {
                        0
                    } else {
                        ALPHA.saturating_sub(task.candidates().in_flight_count())
                    };
                    let batch = task.candidates_mut().select_new_closest_candidates(slots);
                    (task.request_body(), batch)
                }
                None => return,
            };
            if batch.is_empty() {
                break;
            }
            for peer in batch {
                let association = Association::Lookup { lookup: id, peer: peer.id };
                let sent = self
                    .send_request(peer.address, body.clone(), association, LOOKUP_REQUEST_TIMEOUT)
                    .await;
                if !sent {
                    if let Some(task) = self.lookups.get_mut(&id) {
                        task.candidates_mut().flag_invalid(&peer.id);
                    }
                }
            }
        }
        self.settle_lookup(id).await;
    }

    /// Complete a lookup whose candidate set has no work left.
    async fn settle_lookup(&mut self, id: LookupId) {
        let converged = match self.lookups.get(&id) {
            Some(task) => task.candidates().is_converged(),
            None => return,
        };
        if !converged {
            // A value lookup that already answered its caller only stays
            // around while responses are outstanding.
            if let Some(LookupTask::FindValue(context)) = self.lookups.get(&id) {
                if context.is_caller_notified() && context.candidates.all_requests_completed() {
                    self.lookups.remove(&id);
                }
            }
            return;
        }

        match self.lookups.remove(&id) {
            Some(LookupTask::FindValue(mut context)) => {
                debug!(key = %context.candidates.target().short_hex(), "value lookup exhausted");
                context.notify_caller(Err(Error::ValueNotFound));
            }
            Some(LookupTask::Store(mut context)) => {
                let replicas = context.candidates.select_closest_valid(REDUNDANCY);
                if replicas.is_empty() {
                    context.notify_caller(Err(Error::TimedOut));
                    return;
                }
                let key = context.candidates.target();
                for peer in &replicas {
                    let body = Body::StoreRequest { key, value: context.value.clone() };
                    let message = Message::new(self.my_id, Token::random(), body);
                    if let Err(error) = self.sockets.send(peer.address, &message.encode()).await {
                        debug!(address = %peer.address, %error, "store send failed");
                    }
                }
                debug!(key = %key.short_hex(), replicas = replicas.len(), "value replicated");
                // No acknowledgement is waited for: dispatch is success.
                context.notify_caller(Ok(()));
            }
            None => {}
        }
    }

    async fn on_datagram(&mut self, sender: SocketAddr, data: &[u8]) {
        let message = match Message::decode(data) {
            Ok(message) => message,
            Err(error) => {
                debug!(%sender, %error, "dropping undecodable datagram");
                return;
            }
        };

        if message.body.is_request() {
            if let Some(reply) = self.handle_request(sender, &message) {
                if let Err(error) = self.sockets.send(sender, &reply.encode()).await {
                    debug!(%sender, %error, "reply send failed");
                }
            }
        } else {
            self.handle_response(sender, message).await;
        }
    }

    /// Serve one inbound request. Every requester is added to the routing
    /// table; the reply, if any, echoes the request token.
    fn handle_request(&mut self, sender: SocketAddr, message: &Message) -> Option<Message> {
        self.routing_table.push(message.source_id, sender);

        let reply_body = match &message.body {
            Body::PingRequest => Some(Body::PingResponse),
            Body::StoreRequest { key, value } => {
                self.storage.insert(*key, value.clone());
                None
            }
            Body::FindNodeRequest { target } => Some(Body::FindNodeResponse {
                peers: self.routing_table.k_closest(target),
            }),
            Body::FindValueRequest { target } => match self.storage.get(target) {
                Some(value) => Some(Body::FindValueResponse { value: value.clone() }),
                None => Some(Body::FindNodeResponse {
                    peers: self.routing_table.k_closest(target),
                }),
            },
            _ => None,
        };

        reply_body.map(|body| Message::new(self.my_id, message.token, body))
    }

    async fn handle_response(&mut self, sender: SocketAddr, message: Message) {
        let association = match self.dispatcher.dispatch(&message.token) {
            Ok(association) => association,
            Err(_) => {
                debug!(%sender, token = %message.token.short_hex(), "unassociated response dropped");
                return;
            }
        };
        self.timeouts.remove(&message.token);

        match association {
            Association::Bootstrap => self.complete_bootstrap(sender, message),
            Association::Lookup { lookup, peer } => {
                self.advance_lookup(lookup, peer, message).await
            }
        }
    }

    /// The initial peer answered: seed the routing table with it and
    /// everything it told us about.
    fn complete_bootstrap(&mut self, sender: SocketAddr, message: Message) {
        self.bootstrap = None;
        self.routing_table.push(message.source_id, sender);
        if let Body::FindNodeResponse { peers } = message.body {
            for peer in peers {
                self.routing_table.push(peer.id, peer.address);
            }
        }
        info!(peers = self.routing_table.peer_count(), "joined the overlay");
    }

    async fn advance_lookup(&mut self, id: LookupId, peer_id: Id, message: Message) {
        let my_id = self.my_id;
        let step = {
            let Some(task) = self.lookups.get_mut(&id) else { return };
            match (task, message.body) {
                (task, Body::FindNodeResponse { peers }) => {
                    let candidates = task.candidates_mut();
                    candidates.flag_valid(&peer_id);
                    candidates.absorb(peers.into_iter().filter(|p| p.id != my_id));
                    LookupStep::Drive
                }
                (LookupTask::FindValue(context), Body::FindValueResponse { value }) => {
                    context.candidates.flag_valid(&peer_id);
                    context.notify_caller(Ok(value));
                    if context.candidates.all_requests_completed() {
                        LookupStep::Remove
                    } else {
                        LookupStep::Keep
                    }
                }
                (task, body) => {
                    debug!(kind = ?body.message_type(), "unexpected response body for lookup");
                    task.candidates_mut().flag_valid(&peer_id);
                    LookupStep::Drive
                }
            }
        };

        match step {
            LookupStep::Drive => self.drive_lookup(id).await,
            LookupStep::Remove => {
                self.lookups.remove(&id);
            }
            LookupStep::Keep => {}
        }
    }

    async fn on_timeout(&mut self, token: Token) {
        match self.dispatcher.remove(&token) {
            Some(Association::Bootstrap) => {
                debug!("initial peer address timed out");
                self.contact_next_initial_address().await;
            }
            Some(Association::Lookup { lookup, peer }) => {
                if let Some(task) = self.lookups.get_mut(&lookup) {
                    task.candidates_mut().flag_invalid(&peer);
                    self.drive_lookup(lookup).await;
                }
            }
            // The response won the race inside this very iteration.
            None => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::test_support::{id_with_first_byte, peer_with_first_byte};
    use tokio::net::UdpSocket;

    async fn test_engine() -> Engine {
        let sockets = MessageSocketPair::bind(
            "127.0.0.1:0".parse().unwrap(),
            "[::1]:0".parse().unwrap(),
        )
        .await
        .unwrap();
        // The loop is never entered in these tests; the channel is unused.
        let (_tx, rx) = mpsc::unbounded_channel();
        Engine::new(sockets, "127.0.0.1:1".to_string(), rx)
    }

    async fn recv_message(socket: &UdpSocket) -> Message {
        let mut buf = [0u8; INPUT_BUFFER_SIZE];
        let (len, _) = tokio::time::timeout(Duration::from_millis(200), socket.recv_from(&mut buf))
            .await
            .expect("no datagram arrived")
            .unwrap();
        Message::decode(&buf[..len]).expect("undecodable datagram")
    }

    #[tokio::test]
    async fn ping_request_is_answered_with_the_same_token() {
        let mut engine = test_engine().await;
        let src_id = Id::random();
        let src: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let token = Token::random();

        let request = Message::new(src_id, token, Body::PingRequest);
        let reply = engine.handle_request(src, &request).expect("reply");

        assert_eq!(reply.body, Body::PingResponse);
        assert_eq!(reply.token, token);
        assert_eq!(reply.source_id, engine.my_id());
        assert!(engine.routing_table.contains(&src_id));
    }

    #[tokio::test]
    async fn store_request_writes_the_value_and_sends_no_reply() {
        let mut engine = test_engine().await;
        let key = Id::from_hashed(&"key");
        let value = b"stored".to_vec();
        let request = Message::new(
            Id::random(),
            Token::random(),
            Body::StoreRequest { key, value: value.clone() },
        );

        let reply = engine.handle_request("127.0.0.1:4000".parse().unwrap(), &request);
        assert!(reply.is_none());
        assert_eq!(engine.storage.get(&key), Some(&value));
    }

    #[tokio::test]
    async fn find_value_request_returns_the_value_when_held() {
        let mut engine = test_engine().await;
        let key = Id::from_hashed(&"held");
        engine.storage.insert(key, b"payload".to_vec());

        let request = Message::new(Id::random(), Token::random(), Body::FindValueRequest { target: key });
        let reply = engine
            .handle_request("127.0.0.1:4000".parse().unwrap(), &request)
            .expect("reply");
        assert_eq!(reply.body, Body::FindValueResponse { value: b"payload".to_vec() });
    }

    #[tokio::test]
    async fn find_value_request_falls_back_to_closest_peers() {
        let mut engine = test_engine().await;
        let request = Message::new(
            Id::random(),
            Token::random(),
            Body::FindValueRequest { target: Id::from_hashed(&"missing") },
        );
        let reply = engine
            .handle_request("127.0.0.1:4000".parse().unwrap(), &request)
            .expect("reply");
        // The requester itself was just learned, so it comes back.
        match reply.body {
            Body::FindNodeResponse { peers } => assert_eq!(peers.len(), 1),
            other => panic!("expected FindNodeResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn find_node_request_returns_at_most_k_peers() {
        let mut engine = test_engine().await;
        for i in 0..60u16 {
            let address = format!("127.0.0.1:{}", 5000 + i).parse().unwrap();
            engine.routing_table.push(Id::random(), address);
        }
        let request = Message::new(
            Id::random(),
            Token::random(),
            Body::FindNodeRequest { target: Id::random() },
        );
        let reply = engine
            .handle_request("127.0.0.1:4000".parse().unwrap(), &request)
            .expect("reply");
        match reply.body {
            Body::FindNodeResponse { peers } => assert!(peers.len() <= K),
            other => panic!("expected FindNodeResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unassociated_response_leaves_state_untouched() {
        let mut engine = test_engine().await;
        let response = Message::new(
            Id::random(),
            Token::random(),
            Body::FindNodeResponse {
                peers: vec![peer_with_first_byte(0x42, 4242)],
            },
        );

        engine
            .on_datagram("127.0.0.1:4000".parse().unwrap(), &response.encode())
            .await;

        assert_eq!(engine.routing_table.peer_count(), 0);
        assert!(engine.lookups.is_empty());
        assert!(engine.failure.is_none());
    }

    #[tokio::test]
    async fn truncated_datagram_is_dropped() {
        let mut engine = test_engine().await;
        engine
            .on_datagram("127.0.0.1:4000".parse().unwrap(), &[0u8; 20])
            .await;
        assert_eq!(engine.routing_table.peer_count(), 0);
        assert!(engine.failure.is_none());
    }

    #[tokio::test]
    async fn load_of_local_value_completes_without_network() {
        let mut engine = test_engine().await;
        let key = Id::from_hashed(&"local");
        engine.storage.insert(key, b"cached".to_vec());

        let (tx, rx) = oneshot::channel();
        engine.start_load(key, tx).await;

        assert_eq!(rx.await.unwrap().unwrap(), b"cached".to_vec());
        assert!(engine.lookups.is_empty());
    }

    #[tokio::test]
    async fn load_with_no_known_peers_reports_not_found() {
        let mut engine = test_engine().await;
        let (tx, rx) = oneshot::channel();
        engine.start_load(Id::from_hashed(&"nowhere"), tx).await;
        assert!(matches!(rx.await.unwrap(), Err(Error::ValueNotFound)));
        assert!(engine.lookups.is_empty());
    }

    #[tokio::test]
    async fn save_with_no_known_peers_times_out() {
        let mut engine = test_engine().await;
        let (tx, rx) = oneshot::channel();
        engine.start_save(Id::from_hashed(&"nowhere"), b"value".to_vec(), tx).await;
        assert!(matches!(rx.await.unwrap(), Err(Error::TimedOut)));
        assert!(engine.lookups.is_empty());
    }

    #[tokio::test]
    async fn lookup_fan_out_is_alpha_bounded_and_closest_first() {
        let mut engine = test_engine().await;
        let target = id_with_first_byte(0x00);

        // Four live sockets standing in for peers at increasing distance.
        let mut peers = Vec::new();
        for first in [0x01u8, 0x02, 0x04, 0x7F] {
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            let id = id_with_first_byte(first);
            engine.routing_table.push(id, socket.local_addr().unwrap());
            peers.push((id, socket));
        }

        let (tx, _rx) = oneshot::channel();
        engine.start_load(target, tx).await;

        // The three closest each get one FIND_VALUE request.
        for (_, socket) in peers.iter().take(ALPHA) {
            let request = recv_message(socket).await;
            assert_eq!(request.body, Body::FindValueRequest { target });
            assert_eq!(request.source_id, engine.my_id());
        }

        // The farthest peer is beyond the initial parallelism.
        let mut buf = [0u8; 64];
        let quiet = tokio::time::timeout(
            Duration::from_millis(50),
            peers[3].1.recv_from(&mut buf),
        )
        .await;
        assert!(quiet.is_err(), "fourth peer should not be queried yet");
    }

    #[tokio::test]
    async fn closer_peers_in_a_response_trigger_the_next_hop() {
        let mut engine = test_engine().await;
        let target = id_with_first_byte(0x00);

        let p1 = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let p1_id = id_with_first_byte(0x10);
        engine.routing_table.push(p1_id, p1.local_addr().unwrap());

        let (tx, rx) = oneshot::channel();
        engine.start_load(target, tx).await;

        let request = recv_message(&p1).await;
        assert_eq!(request.body, Body::FindValueRequest { target });

        // p1 does not hold the value and introduces a closer peer.
        let p2 = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let p2_id = id_with_first_byte(0x01);
        let referral = Message::new(
            p1_id,
            request.token,
            Body::FindNodeResponse {
                peers: vec![crate::core::routing_table::Peer::new(
                    p2_id,
                    p2.local_addr().unwrap(),
                )],
            },
        );
        engine.on_datagram(p1.local_addr().unwrap(), &referral.encode()).await;

        // The freed slot goes to the newly learned, closer peer.
        let hop = recv_message(&p2).await;
        assert_eq!(hop.body, Body::FindValueRequest { target });

        // p2 returns the value; the caller is answered.
        let found = Message::new(
            p2_id,
            hop.token,
            Body::FindValueResponse { value: b"hello".to_vec() },
        );
        engine.on_datagram(p2.local_addr().unwrap(), &found.encode()).await;

        assert_eq!(rx.await.unwrap().unwrap(), b"hello".to_vec());
        assert!(engine.lookups.is_empty());
    }

    #[tokio::test]
    async fn store_lookup_replicates_to_the_closest_valid_peer() {
        let mut engine = test_engine().await;
        let key = id_with_first_byte(0x00);

        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_id = id_with_first_byte(0x01);
        engine.routing_table.push(peer_id, peer.local_addr().unwrap());

        let (tx, rx) = oneshot::channel();
        engine.start_save(key, b"replicated".to_vec(), tx).await;

        // The store lookup maps the neighborhood first.
        let request = recv_message(&peer).await;
        assert_eq!(request.body, Body::FindNodeRequest { target: key });

        // An empty referral converges the lookup on this lone peer.
        let answer = Message::new(peer_id, request.token, Body::FindNodeResponse { peers: vec![] });
        engine.on_datagram(peer.local_addr().unwrap(), &answer.encode()).await;

        let store = recv_message(&peer).await;
        assert_eq!(
            store.body,
            Body::StoreRequest { key, value: b"replicated".to_vec() }
        );
        assert!(rx.await.unwrap().is_ok());
        assert!(engine.lookups.is_empty());
    }
}
