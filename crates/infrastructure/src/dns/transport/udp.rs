use bytes::Bytes;
use relaydns_domain::DomainError;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::debug;

/// Maximum UDP DNS response size with EDNS(0)
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// DNS over UDP, one ephemeral socket per query.
pub struct UdpTransport {
    server_addr: SocketAddr,
}

impl UdpTransport {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self { server_addr }
    }

    pub fn protocol_name(&self) -> &'static str {
        "UDP"
    }

    /// Send `message_bytes` and wait for the datagram echoing its ID.
    pub async fn send(&self, message_bytes: &[u8]) -> Result<Bytes, DomainError> {
        if message_bytes.len() < 2 {
            return Err(DomainError::InvalidDnsResponse(
                "DNS message shorter than its ID".into(),
            ));
        }

        // Bind to ephemeral port (0 = OS assigns)
        let bind_addr: SocketAddr = if self.server_addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| DomainError::IoError(format!("Failed to bind UDP socket: {}", e)))?;

        // Connected socket: the kernel drops datagrams from other sources.
        socket.connect(self.server_addr).await.map_err(|e| {
            DomainError::IoError(format!(
                "Failed to connect UDP socket to {}: {}",
                self.server_addr, e
            ))
        })?;

        let bytes_sent = socket.send(message_bytes).await.map_err(|e| {
            DomainError::IoError(format!(
                "Failed to send UDP query to {}: {}",
                self.server_addr, e
            ))
        })?;

        debug!(server = %self.server_addr, bytes_sent = bytes_sent, "UDP query sent");

        let mut recv_buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        loop {
            let bytes_received = socket.recv(&mut recv_buf).await.map_err(|e| {
                DomainError::IoError(format!(
                    "Failed to receive UDP response from {}: {}",
                    self.server_addr, e
                ))
            })?;

            if bytes_received >= 2 && recv_buf[..2] == message_bytes[..2] {
                recv_buf.truncate(bytes_received);
                debug!(
                    server = %self.server_addr,
                    bytes_received = bytes_received,
                    "UDP response received"
                );
                return Ok(Bytes::from(recv_buf));
            }

            debug!(server = %self.server_addr, "Ignoring UDP datagram with foreign ID");
        }
    }
}
