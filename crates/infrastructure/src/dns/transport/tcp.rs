use bytes::Bytes;
use relaydns_domain::DomainError;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// DNS over TCP (RFC 1035 §4.2.2): 2-byte big-endian length prefix.
pub struct TcpTransport {
    server_addr: SocketAddr,
}

impl TcpTransport {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self { server_addr }
    }

    pub fn protocol_name(&self) -> &'static str {
        "TCP"
    }

    pub async fn send(&self, message_bytes: &[u8]) -> Result<Bytes, DomainError> {
        let len = u16::try_from(message_bytes.len()).map_err(|_| {
            DomainError::InvalidDnsResponse(format!(
                "DNS message too large for TCP framing: {} bytes",
                message_bytes.len()
            ))
        })?;

        let mut stream = TcpStream::connect(self.server_addr).await.map_err(|e| {
            DomainError::IoError(format!(
                "Failed to connect to {} over TCP: {}",
                self.server_addr, e
            ))
        })?;
        let _ = stream.set_nodelay(true);

        let mut frame = Vec::with_capacity(message_bytes.len() + 2);
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(message_bytes);
        stream.write_all(&frame).await.map_err(|e| {
            DomainError::IoError(format!(
                "Failed to send TCP query to {}: {}",
                self.server_addr, e
            ))
        })?;

        debug!(server = %self.server_addr, bytes_sent = frame.len(), "TCP query sent");

        let response_len = stream.read_u16().await.map_err(|e| {
            DomainError::IoError(format!(
                "Failed to read TCP response length from {}: {}",
                self.server_addr, e
            ))
        })? as usize;

        let mut response = vec![0u8; response_len];
        stream.read_exact(&mut response).await.map_err(|e| {
            DomainError::IoError(format!(
                "Failed to read TCP response from {}: {}",
                self.server_addr, e
            ))
        })?;

        debug!(
            server = %self.server_addr,
            bytes_received = response_len,
            "TCP response received"
        );

        Ok(Bytes::from(response))
    }
}
