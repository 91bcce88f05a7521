#![allow(dead_code)]
use super::scripted_transport::response;
use hickory_proto::op::{Message, ResponseCode};
use relaydns_domain::ResourceRecord;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::oneshot;

/// Loopback upstream answering every query with fixed records, over UDP
/// and TCP on the same port.
///
/// With `truncate_udp` set, UDP answers carry TC=1 and no records so the
/// client has to come back over TCP.
pub struct MockDnsServer {
    addr: SocketAddr,
    udp_queries: Arc<AtomicUsize>,
    tcp_queries: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockDnsServer {
    pub async fn start(records: Vec<ResourceRecord>, truncate_udp: bool) -> std::io::Result<Self> {
        let udp = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = udp.local_addr()?;
        let tcp = TcpListener::bind(addr).await?;

        let udp_queries = Arc::new(AtomicUsize::new(0));
        let tcp_queries = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let records = Arc::new(records);
        let udp_count = Arc::clone(&udp_queries);
        let tcp_count = Arc::clone(&tcp_queries);

        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    received = udp.recv_from(&mut buf) => {
                        let Ok((len, peer)) = received else { continue };
                        let Ok(request) = Message::from_vec(&buf[..len]) else { continue };
                        udp_count.fetch_add(1, Ordering::SeqCst);
                        let reply = if truncate_udp {
                            response(&request, ResponseCode::NoError, &[], true)
                        } else {
                            response(&request, ResponseCode::NoError, &records, false)
                        };
                        let _ = udp.send_to(&reply, peer).await;
                    }
                    accepted = tcp.accept() => {
                        let Ok((mut stream, _)) = accepted else { continue };
                        let records = Arc::clone(&records);
                        let tcp_count = Arc::clone(&tcp_count);
                        tokio::spawn(async move {
                            while let Ok(len) = stream.read_u16().await {
                                let mut request = vec![0u8; len as usize];
                                if stream.read_exact(&mut request).await.is_err() {
                                    break;
                                }
                                let Ok(request) = Message::from_vec(&request) else { break };
                                tcp_count.fetch_add(1, Ordering::SeqCst);
                                let reply = response(&request, ResponseCode::NoError, &records, false);
                                let _ = stream.write_u16(reply.len() as u16).await;
                                let _ = stream.write_all(&reply).await;
                            }
                        });
                    }
                }
            }
        });

        Ok(Self {
            addr,
            udp_queries,
            tcp_queries,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn udp_queries(&self) -> usize {
        self.udp_queries.load(Ordering::SeqCst)
    }

    pub fn tcp_queries(&self) -> usize {
        self.tcp_queries.load(Ordering::SeqCst)
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockDnsServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
