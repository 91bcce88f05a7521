use bytes::Bytes;
use relaydns_application::TransportProtocol;
use relaydns_domain::DomainError;
use std::net::SocketAddr;
use std::rc::Rc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Return path to the client that sent a query.
#[derive(Clone)]
pub enum Responder {
    /// Datagram reply through the listening socket.
    Udp {
        socket: Rc<UdpSocket>,
        peer: SocketAddr,
    },
    /// Frame queued to the connection's writer task.
    Tcp {
        frames: mpsc::UnboundedSender<Bytes>,
        peer: SocketAddr,
    },
}

impl Responder {
    pub fn peer(&self) -> SocketAddr {
        match self {
            Responder::Udp { peer, .. } | Responder::Tcp { peer, .. } => *peer,
        }
    }

    pub fn protocol(&self) -> TransportProtocol {
        match self {
            Responder::Udp { .. } => TransportProtocol::Udp,
            Responder::Tcp { .. } => TransportProtocol::Tcp,
        }
    }

    /// Non-blocking send of a complete DNS message.
    pub fn send(&self, message: Vec<u8>) -> Result<(), DomainError> {
        match self {
            Responder::Udp { socket, peer } => socket
                .try_send_to(&message, *peer)
                .map(|_| ())
                .map_err(|e| DomainError::ResponseSend {
                    peer: peer.to_string(),
                    reason: e.to_string(),
                }),
            Responder::Tcp { frames, peer } => {
                frames
                    .send(Bytes::from(message))
                    .map_err(|_| DomainError::ResponseSend {
                        peer: peer.to_string(),
                        reason: "connection closed".into(),
                    })
            }
        }
    }
}
