use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RecordType};
use relaydns_application::UpstreamTransport;
use relaydns_domain::DomainError;
use relaydns_infrastructure::dns::{
    CachingServer, DnsClient, DnsListener, ListenerSettings, NetworkTransport,
    QueryContextPool, ResolverEngine, ResolverSettings,
};
use relaydns_reactor::Dispatcher;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

/// Full relaydns stack on its own reactor thread: engine, caching server
/// on a loopback port, and a client facade sharing the same engine.
pub struct TestServer {
    dispatcher: Dispatcher,
    addr: SocketAddr,
    client: DnsClient,
}

pub struct TestServerBuilder {
    upstreams: Vec<SocketAddr>,
    timeout: Duration,
    retries: u32,
    recursion_available: bool,
}

impl TestServerBuilder {
    pub fn new(upstreams: Vec<SocketAddr>) -> Self {
        Self {
            upstreams,
            timeout: Duration::from_millis(500),
            retries: 1,
            recursion_available: true,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn recursion_available(mut self, enabled: bool) -> Self {
        self.recursion_available = enabled;
        self
    }

    pub fn start(self) -> Result<TestServer, DomainError> {
        let dispatcher = Dispatcher::start("e2e-reactor")?;
        let settings = ResolverSettings {
            servers: self.upstreams,
            retries: self.retries,
            timeout: self.timeout,
            ..ResolverSettings::default()
        };
        let recursion_available = self.recursion_available;

        let (addr, client) = dispatcher.call(move |reactor| {
            let transport: Rc<dyn UpstreamTransport> = Rc::new(NetworkTransport::new());
            let engine = ResolverEngine::new(settings, transport);
            reactor.load_runnable(Rc::new(engine.clone()))?;

            let server = CachingServer::new(
                engine.clone(),
                QueryContextPool::new(32),
                recursion_available,
                1232,
            );
            let listener = Rc::new(DnsListener::new(
                ListenerSettings {
                    bind: SocketAddr::from(([127, 0, 0, 1], 0)),
                    tcp_idle_timeout: Duration::from_secs(5),
                },
                Rc::new(server),
            ));
            reactor.load_runnable(listener.clone())?;

            let client = DnsClient::install(reactor, engine)?;
            let addr = listener
                .local_addr()
                .ok_or_else(|| DomainError::StartFailed("listener not bound".into()))?;
            Ok::<_, DomainError>((addr, client))
        })??;

        Ok(TestServer {
            dispatcher,
            addr,
            client,
        })
    }
}

impl TestServer {
    pub fn start(upstream: SocketAddr) -> Result<Self, DomainError> {
        TestServerBuilder::new(vec![upstream]).start()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn client(&self) -> &DnsClient {
        &self.client
    }

    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.client.shutdown();
        self.dispatcher.stop();
        let _ = self.dispatcher.wait_stopped();
    }
}

/// Plain DNS client talking to a [`TestServer`] over the wire.
pub struct TestClient {
    server: SocketAddr,
}

impl TestClient {
    pub fn new(server: SocketAddr) -> Self {
        Self { server }
    }

    pub fn request(id: u16, name: &str, record_type: RecordType) -> Message {
        let mut message = Message::new();
        message
            .set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true);
        message.add_query(Query::query(
            Name::from_ascii(format!("{name}.")).unwrap(),
            record_type,
        ));
        message
    }

    pub async fn query(&self, name: &str, record_type: RecordType) -> std::io::Result<Message> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let request = Self::request(next_id(), name, record_type);
        socket.send_to(&request.to_vec().unwrap(), self.server).await?;

        let mut buf = vec![0u8; 4096];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
            .await
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::TimedOut))??;
        Ok(Message::from_vec(&buf[..len]).unwrap())
    }

    pub async fn query_tcp(&self, name: &str, record_type: RecordType) -> std::io::Result<Message> {
        let mut stream = TcpStream::connect(self.server).await?;
        let request = Self::request(next_id(), name, record_type).to_vec().unwrap();
        stream.write_u16(request.len() as u16).await?;
        stream.write_all(&request).await?;

        let len = tokio::time::timeout(Duration::from_secs(5), stream.read_u16())
            .await
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::TimedOut))??;
        let mut buf = vec![0u8; len as usize];
        stream.read_exact(&mut buf).await?;
        Ok(Message::from_vec(&buf).unwrap())
    }
}

fn next_id() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static NEXT: AtomicU16 = AtomicU16::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}
