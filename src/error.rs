use thiserror::Error;

use crate::protocol::message::CodecError;

/// Every failure the crate surfaces, including the codes `run` terminates
/// with.
#[derive(Debug, Error)]
pub enum Error {
    /// Normal shutdown requested through `abort`.
    #[error("run aborted")]
    RunAborted,

    /// Every resolved address of the initial peer was tried without an
    /// answer.
    #[error("initial peer failed to respond")]
    InitialPeerFailedToRespond,

    #[error("invalid IPv4 address")]
    InvalidIpv4Address,

    #[error("invalid IPv6 address")]
    InvalidIpv6Address,

    /// `run` entered while another `run` is in progress.
    #[error("already running")]
    AlreadyRunning,

    /// Reserved.
    #[error("unimplemented")]
    Unimplemented,

    /// A load converged without any peer returning the value.
    #[error("value not found")]
    ValueNotFound,

    /// A lookup converged without any live peer to act on.
    #[error("timed out")]
    TimedOut,

    /// A response arrived whose token matches no pending request.
    #[error("unassociated message id")]
    UnassociatedMessageId,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("network error: {0}")]
    Network(#[from] std::io::Error),
}
