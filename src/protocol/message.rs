//! Wire codec for the five request/response exchanges.
//!
//! All integers are big-endian. Identifiers and tokens are 20 octets in
//! network order. Layout:
//!
//! ```text
//! Header (42 B): version(1) | type(1) | source_id(20) | random_token(20)
//! Address:       family(1=v4, 2=v6) | addr(4|16) | port(2 BE)
//! Peer:          id(20) | Address
//! PeerList:      count(2 BE) | Peer x count
//! Bytes:         len(8 BE) | bytes x len
//! ```

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::core::identifier::{Id, Token};
use crate::core::routing_table::Peer;
use crate::core::storage::Value;

/// Protocol version accepted on the wire.
pub const PROTOCOL_VERSION: u8 = 1;

/// Fixed header length in octets.
pub const HEADER_LEN: usize = 42;

const ID_LEN: usize = 20;

const FAMILY_V4: u8 = 1;
const FAMILY_V6: u8 = 2;

/// Decoding failures. Decoders are total: they either return a whole
/// message or one of these, and never a partial result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("truncated header")]
    TruncatedHeader,
    #[error("truncated id")]
    TruncatedId,
    #[error("truncated size")]
    TruncatedSize,
    #[error("truncated address")]
    TruncatedAddress,
    #[error("truncated endpoint")]
    TruncatedEndpoint,
    #[error("corrupted header: unknown message type {0}")]
    CorruptedHeader(u8),
    #[error("unknown protocol version {0}")]
    UnknownProtocolVersion(u8),
}

/// Message type discriminants as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    PingRequest = 1,
    PingResponse = 2,
    StoreRequest = 3,
    FindNodeRequest = 4,
    FindNodeResponse = 5,
    FindValueRequest = 6,
    FindValueResponse = 7,
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::PingRequest),
            2 => Ok(MessageType::PingResponse),
            3 => Ok(MessageType::StoreRequest),
            4 => Ok(MessageType::FindNodeRequest),
            5 => Ok(MessageType::FindNodeResponse),
            6 => Ok(MessageType::FindValueRequest),
            7 => Ok(MessageType::FindValueResponse),
            other => Err(CodecError::CorruptedHeader(other)),
        }
    }
}

/// The body of a message, one variant per wire type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    PingRequest,
    PingResponse,
    StoreRequest { key: Id, value: Value },
    FindNodeRequest { target: Id },
    FindNodeResponse { peers: Vec<Peer> },
    FindValueRequest { target: Id },
    FindValueResponse { value: Value },
}

impl Body {
    pub fn message_type(&self) -> MessageType {
        match self {
            Body::PingRequest => MessageType::PingRequest,
            Body::PingResponse => MessageType::PingResponse,
            Body::StoreRequest { .. } => MessageType::StoreRequest,
            Body::FindNodeRequest { .. } => MessageType::FindNodeRequest,
            Body::FindNodeResponse { .. } => MessageType::FindNodeResponse,
            Body::FindValueRequest { .. } => MessageType::FindValueRequest,
            Body::FindValueResponse { .. } => MessageType::FindValueResponse,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Body::PingRequest
                | Body::StoreRequest { .. }
                | Body::FindNodeRequest { .. }
                | Body::FindValueRequest { .. }
        )
    }
}

/// A full datagram: header fields plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub source_id: Id,
    pub token: Token,
    pub body: Body,
}

impl Message {
    pub fn new(source_id: Id, token: Token, body: Body) -> Self {
        Self { source_id, token, body }
    }

    /// Serialize header then body.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + 64);
        buf.put_u8(PROTOCOL_VERSION);
        buf.put_u8(self.body.message_type() as u8);
        buf.put_slice(self.source_id.as_bytes());
        buf.put_slice(self.token.as_bytes());

        match &self.body {
            Body::PingRequest | Body::PingResponse => {}
            Body::StoreRequest { key, value } => {
                buf.put_slice(key.as_bytes());
                put_bytes(&mut buf, value);
            }
            Body::FindNodeRequest { target } | Body::FindValueRequest { target } => {
                buf.put_slice(target.as_bytes());
            }
            Body::FindNodeResponse { peers } => {
                buf.put_u16(peers.len() as u16);
                for peer in peers {
                    buf.put_slice(peer.id.as_bytes());
                    put_address(&mut buf, &peer.address);
                }
            }
            Body::FindValueResponse { value } => {
                put_bytes(&mut buf, value);
            }
        }

        buf.freeze()
    }

    /// Parse a datagram. Truncation and header corruption are reported
    /// without touching any output.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < HEADER_LEN {
            return Err(CodecError::TruncatedHeader);
        }

        let version = data[0];
        if version != PROTOCOL_VERSION {
            return Err(CodecError::UnknownProtocolVersion(version));
        }
        let message_type = MessageType::try_from(data[1])?;
        let source_id = Id::from_bytes(&data[2..2 + ID_LEN]);
        let token = Id::from_bytes(&data[2 + ID_LEN..HEADER_LEN]);

        let mut body = &data[HEADER_LEN..];
        let body = match message_type {
            MessageType::PingRequest => Body::PingRequest,
            MessageType::PingResponse => Body::PingResponse,
            MessageType::StoreRequest => {
                let key = take_id(&mut body)?;
                let value = take_bytes(&mut body)?;
                Body::StoreRequest { key, value }
            }
            MessageType::FindNodeRequest => Body::FindNodeRequest { target: take_id(&mut body)? },
            MessageType::FindValueRequest => Body::FindValueRequest { target: take_id(&mut body)? },
            MessageType::FindNodeResponse => {
                if body.remaining() < 2 {
                    return Err(CodecError::TruncatedSize);
                }
                let count = body.get_u16();
                let mut peers = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let id = take_id(&mut body)?;
                    let address = take_address(&mut body)?;
                    peers.push(Peer::new(id, address));
                }
                Body::FindNodeResponse { peers }
            }
            MessageType::FindValueResponse => Body::FindValueResponse { value: take_bytes(&mut body)? },
        };

        Ok(Message { source_id, token, body })
    }
}

fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u64(bytes.len() as u64);
    buf.put_slice(bytes);
}

fn put_address(buf: &mut BytesMut, address: &SocketAddr) {
    match address.ip() {
        IpAddr::V4(ip) => {
            buf.put_u8(FAMILY_V4);
            buf.put_slice(&ip.octets());
        }
        IpAddr::V6(ip) => {
            buf.put_u8(FAMILY_V6);
            buf.put_slice(&ip.octets());
        }
    }
    buf.put_u16(address.port());
}

fn take_id(buf: &mut &[u8]) -> Result<Id, CodecError> {
    if buf.remaining() < ID_LEN {
        return Err(CodecError::TruncatedId);
    }
    let id = Id::from_bytes(&buf[..ID_LEN]);
    buf.advance(ID_LEN);
    Ok(id)
}

fn take_bytes(buf: &mut &[u8]) -> Result<Vec<u8>, CodecError> {
    if buf.remaining() < 8 {
        return Err(CodecError::TruncatedSize);
    }
    let len = buf.get_u64() as usize;
    if buf.remaining() < len {
        return Err(CodecError::TruncatedSize);
    }
    let bytes = buf[..len].to_vec();
    buf.advance(len);
    Ok(bytes)
}

fn take_address(buf: &mut &[u8]) -> Result<SocketAddr, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::TruncatedAddress);
    }
    let family = buf.get_u8();
    let ip: IpAddr = match family {
        FAMILY_V4 => {
            if buf.remaining() < 4 {
                return Err(CodecError::TruncatedAddress);
            }
            let mut octets = [0u8; 4];
            octets.copy_from_slice(&buf[..4]);
            buf.advance(4);
            Ipv4Addr::from(octets).into()
        }
        FAMILY_V6 => {
            if buf.remaining() < 16 {
                return Err(CodecError::TruncatedAddress);
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&buf[..16]);
            buf.advance(16);
            Ipv6Addr::from(octets).into()
        }
        _ => return Err(CodecError::TruncatedAddress),
    };
    if buf.remaining() < 2 {
        return Err(CodecError::TruncatedEndpoint);
    }
    let port = buf.get_u16();
    Ok(SocketAddr::new(ip, port))
}
