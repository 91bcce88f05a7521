pub mod tcp;
pub mod udp;

use async_trait::async_trait;
use bytes::Bytes;
use relaydns_application::{TransportProtocol, UpstreamTransport};
use relaydns_domain::DomainError;
use std::net::SocketAddr;

/// Socket-backed upstream transport used in production.
///
/// Sockets are created per exchange on the reactor thread and dropped with
/// the task, so an aborted attempt releases its socket immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetworkTransport;

impl NetworkTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait(?Send)]
impl UpstreamTransport for NetworkTransport {
    async fn exchange(
        &self,
        server: SocketAddr,
        protocol: TransportProtocol,
        message: Bytes,
    ) -> Result<Bytes, DomainError> {
        match protocol {
            TransportProtocol::Udp => udp::UdpTransport::new(server).send(&message).await,
            TransportProtocol::Tcp => tcp::TcpTransport::new(server).send(&message).await,
        }
    }
}
