use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::error::Error;

/// One IPv4 and one IPv6 UDP socket. Outbound datagrams are routed by the
/// target's address family; the engine receives on both.
#[derive(Debug)]
pub struct MessageSocketPair {
    v4: UdpSocket,
    v6: UdpSocket,
}

impl MessageSocketPair {
    /// Bind both sockets. Each listen endpoint must be of the matching
    /// family.
    pub async fn bind(listen_v4: SocketAddr, listen_v6: SocketAddr) -> Result<Self, Error> {
        if !listen_v4.is_ipv4() {
            return Err(Error::InvalidIpv4Address);
        }
        if !listen_v6.is_ipv6() {
            return Err(Error::InvalidIpv6Address);
        }
        let v4 = UdpSocket::bind(listen_v4).await?;
        let v6 = UdpSocket::bind(listen_v6).await?;
        Ok(Self { v4, v6 })
    }

    pub fn v4(&self) -> &UdpSocket {
        &self.v4
    }

    pub fn v6(&self) -> &UdpSocket {
        &self.v6
    }

    pub fn local_v4(&self) -> io::Result<SocketAddr> {
        self.v4.local_addr()
    }

    pub fn local_v6(&self) -> io::Result<SocketAddr> {
        self.v6.local_addr()
    }

    /// Send a datagram through the socket matching the target's family.
    pub async fn send(&self, target: SocketAddr, bytes: &[u8]) -> io::Result<usize> {
        match target {
            SocketAddr::V4(_) => self.v4.send_to(bytes, target).await,
            SocketAddr::V6(_) => self.v6.send_to(bytes, target).await,
        }
    }
}
