#[cfg(test)]
pub mod test_support {
    use crate::core::identifier::Id;
    use crate::core::routing_table::Peer;
    use ethereum_types::H160;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    pub fn id_with_first_byte(b: u8) -> Id {
        let mut bytes = [0u8; 20];
        bytes[0] = b;
        Id(H160::from(bytes))
    }

    pub fn peer_with_first_byte(first_byte: u8, port: u16) -> Peer {
        Peer::new(
            id_with_first_byte(first_byte),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port),
        )
    }
}
