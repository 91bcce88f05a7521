use super::fixtures::TestDomains;
use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy)]
pub enum UpstreamMode {
    /// Answer from the fixtures after `delay`.
    Answer { delay: Duration },
    /// Read queries, never reply.
    Silent,
    /// UDP replies are empty with TC set; TCP answers normally.
    TruncateUdp,
}

/// Loopback nameserver standing in for the real upstreams.
pub struct FakeUpstream {
    addr: SocketAddr,
    udp_queries: Arc<AtomicUsize>,
    tcp_queries: Arc<AtomicUsize>,
    tasks: Vec<JoinHandle<()>>,
}

impl FakeUpstream {
    pub async fn start(mode: UpstreamMode) -> std::io::Result<Self> {
        let udp = Arc::new(UdpSocket::bind("127.0.0.1:0").await?);
        let addr = udp.local_addr()?;
        let tcp = TcpListener::bind(addr).await?;
        let udp_queries = Arc::new(AtomicUsize::new(0));
        let tcp_queries = Arc::new(AtomicUsize::new(0));

        let udp_task = {
            let counter = Arc::clone(&udp_queries);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                while let Ok((len, peer)) = udp.recv_from(&mut buf).await {
                    let Ok(request) = Message::from_vec(&buf[..len]) else { continue };
                    counter.fetch_add(1, Ordering::SeqCst);
                    let reply = match mode {
                        UpstreamMode::Silent => continue,
                        UpstreamMode::TruncateUdp => truncated(&request),
                        UpstreamMode::Answer { .. } => answer(&request),
                    };
                    let socket = Arc::clone(&udp);
                    let delay = match mode {
                        UpstreamMode::Answer { delay } => delay,
                        _ => Duration::ZERO,
                    };
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = socket.send_to(&reply, peer).await;
                    });
                }
            })
        };

        let tcp_task = {
            let counter = Arc::clone(&tcp_queries);
            tokio::spawn(async move {
                while let Ok((mut stream, _)) = tcp.accept().await {
                    let counter = Arc::clone(&counter);
                    tokio::spawn(async move {
                        while let Ok(len) = stream.read_u16().await {
                            let mut buf = vec![0u8; len as usize];
                            if stream.read_exact(&mut buf).await.is_err() {
                                break;
                            }
                            let Ok(request) = Message::from_vec(&buf) else { break };
                            counter.fetch_add(1, Ordering::SeqCst);
                            if matches!(mode, UpstreamMode::Silent) {
                                continue;
                            }
                            let reply = answer(&request);
                            let _ = stream.write_u16(reply.len() as u16).await;
                            let _ = stream.write_all(&reply).await;
                        }
                    });
                }
            })
        };

        Ok(Self {
            addr,
            udp_queries,
            tcp_queries,
            tasks: vec![udp_task, tcp_task],
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
}

impl Drop for FakeUpstream {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn reply_to(request: &Message, rcode: ResponseCode) -> Message {
    let mut message = Message::new();
    message
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_recursion_desired(request.recursion_desired())
        .set_recursion_available(true)
        .set_response_code(rcode);
    for query in request.queries() {
        message.add_query(query.clone());
    }
    message
}

fn truncated(request: &Message) -> Vec<u8> {
    let mut message = reply_to(request, ResponseCode::NoError);
    message.set_truncated(true);
    message.to_vec().unwrap_or_default()
}

fn answer(request: &Message) -> Vec<u8> {
    let Some(query) = request.queries().first() else {
        return reply_to(request, ResponseCode::FormErr).to_vec().unwrap_or_default();
    };
    let name = query.name().to_ascii().trim_end_matches('.').to_ascii_lowercase();

    if name == TestDomains::missing() {
        return reply_to(request, ResponseCode::NXDomain).to_vec().unwrap_or_default();
    }

    let mut message = reply_to(request, ResponseCode::NoError);
    if query.query_type() == RecordType::A {
        let owner = Name::from_ascii(format!("{name}.")).unwrap();
        if name == TestDomains::example() {
            message.add_answer(Record::from_rdata(
                owner,
                300,
                RData::A(A(TestDomains::example_ip())),
            ));
        } else if name == TestDomains::large() {
            for i in 0..TestDomains::large_record_count() {
                message.add_answer(Record::from_rdata(
                    owner.clone(),
                    300,
                    RData::A(A(Ipv4Addr::new(10, 0, 0, i as u8))),
                ));
            }
        }
    }
    message.to_vec().unwrap_or_default()
}
