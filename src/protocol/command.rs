use tokio::sync::oneshot;

use crate::core::identifier::Key;
use crate::core::storage::Value;
use crate::error::Error;

/// Commands are the caller-facing doorway into the engine's event loop.
///
/// The `Session` façade holds the sending half of an unbounded channel and
/// injects these from any thread; the engine drains them on its own task,
/// so every socket, routing-table and lookup mutation stays serialized on
/// one thread. Per-call completion travels back over the enclosed oneshot.
#[derive(Debug)]
pub enum Command {
    /// Replicate `value` under `key` onto the closest peers to the key.
    /// The oneshot completes once the STORE messages have been sent
    /// (dispatch, not delivery).
    Save {
        key: Key,
        value: Value,
        tx_done: oneshot::Sender<Result<(), Error>>,
    },
    /// Locate the value stored under `key` anywhere in the network.
    Load {
        key: Key,
        tx_value: oneshot::Sender<Result<Value, Error>>,
    },
    /// Terminate the event loop; `run` returns `RunAborted`.
    Abort,
}
