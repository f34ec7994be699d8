//! The sending side of a datagram round-trip, abstracted so the
//! processor's framing logic can be tested without a real socket.
use std::io;
use std::net::UdpSocket;

use crate::queue::ClientAddress;

pub trait ResponseSender: Send + Sync {
    fn send(&self, addr: ClientAddress, data: &[u8]) -> io::Result<()>;
}

pub struct UdpSender {
    socket: UdpSocket,
}

impl UdpSender {
    pub fn new(socket: UdpSocket) -> Self {
        Self { socket }
    }
}

impl ResponseSender for UdpSender {
    fn send(&self, addr: ClientAddress, data: &[u8]) -> io::Result<()> {
        let ip = std::net::Ipv4Addr::from(addr.ip);
        self.socket.send_to(data, (ip, addr.port))?;
        Ok(())
    }
}

/// An in-memory [`ResponseSender`] used by unit tests and the
/// workspace integration suite so neither has to bind a real socket.
pub mod test_support {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct RecordingSender {
        pub sent: Mutex<Vec<(ClientAddress, Vec<u8>)>>,
    }

    impl ResponseSender for RecordingSender {
        fn send(&self, addr: ClientAddress, data: &[u8]) -> io::Result<()> {
            self.sent.lock().push((addr, data.to_vec()));
            Ok(())
        }
    }
}
