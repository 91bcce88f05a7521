use async_trait::async_trait;
use bytes::Bytes;
use relaydns_domain::DomainError;
use std::fmt;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportProtocol {
    Udp,
    Tcp,
}

impl TransportProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportProtocol::Udp => "udp",
            TransportProtocol::Tcp => "tcp",
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request/response exchange with an upstream nameserver.
///
/// Runs as a local task on the reactor thread. Implementations carry no
/// timeout of their own: the engine aborts the task when its timer fires.
#[async_trait(?Send)]
pub trait UpstreamTransport {
    async fn exchange(
        &self,
        server: SocketAddr,
        protocol: TransportProtocol,
        message: Bytes,
    ) -> Result<Bytes, DomainError>;
}
