use std::net::SocketAddr;
use std::sync::Mutex;

use tokio::sync::{mpsc, oneshot};

use crate::core::identifier::{Id, Key};
use crate::core::storage::Value;
use crate::error::Error;
use crate::protocol::socket::MessageSocketPair;
use crate::protocol::{Command, Engine};

/// A node's caller-facing handle.
///
/// Construction binds both UDP sockets but emits no traffic; the node only
/// joins the overlay once `run` is entered. `save` and `load` can be issued
/// from any task or thread: they post commands into the engine's event loop
/// and await their completion there.
#[derive(Debug)]
pub struct Session {
    tx: mpsc::UnboundedSender<Command>,
    engine: Mutex<Option<Engine>>,
    my_id: Id,
    local_v4: SocketAddr,
    local_v6: SocketAddr,
}

impl Session {
    /// Create a node listening on the two given endpoints, which will join
    /// the overlay through `initial_peer` (a `host:port` descriptor) when
    /// run.
    pub async fn new(
        initial_peer: impl Into<String>,
        listen_v4: SocketAddr,
        listen_v6: SocketAddr,
    ) -> Result<Self, Error> {
        let sockets = MessageSocketPair::bind(listen_v4, listen_v6).await?;
        let local_v4 = sockets.local_v4()?;
        let local_v6 = sockets.local_v6()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Engine::new(sockets, initial_peer.into(), rx);
        let my_id = engine.my_id();

        Ok(Self {
            tx,
            engine: Mutex::new(Some(engine)),
            my_id,
            local_v4,
            local_v6,
        })
    }

    pub fn id(&self) -> Id {
        self.my_id
    }

    pub fn local_v4(&self) -> SocketAddr {
        self.local_v4
    }

    pub fn local_v6(&self) -> SocketAddr {
        self.local_v6
    }

    /// Drive the node until `abort` or the first fatal error, and return
    /// the terminal code (`RunAborted` on a normal shutdown). Only one
    /// `run` may be in progress at a time; a second caller observes
    /// `AlreadyRunning`.
    pub async fn run(&self) -> Error {
        let mut engine = match self.engine.lock().unwrap().take() {
            Some(engine) => engine,
            None => return Error::AlreadyRunning,
        };

        let failure = engine.run().await;

        *self.engine.lock().unwrap() = Some(engine);
        failure
    }

    /// Request termination of `run`. Thread-safe; returns immediately.
    pub fn abort(&self) {
        let _ = self.tx.send(Command::Abort);
    }

    /// Replicate `value` under `key` onto the closest peers to the key.
    /// Completes once the STORE messages have been dispatched.
    pub async fn save(&self, key: Key, value: Value) -> Result<(), Error> {
        let (tx_done, rx_done) = oneshot::channel();
        self.tx
            .send(Command::Save { key, value, tx_done })
            .map_err(|_| Error::RunAborted)?;
        rx_done.await.map_err(|_| Error::RunAborted)?
    }

    /// Fetch the value stored under `key`, from the local store or from
    /// the network.
    pub async fn load(&self, key: Key) -> Result<Value, Error> {
        let (tx_value, rx_value) = oneshot::channel();
        self.tx
            .send(Command::Load { key, tx_value })
            .map_err(|_| Error::RunAborted)?;
        rx_value.await.map_err(|_| Error::RunAborted)?
    }
}
