use super::responder::Responder;
use crate::dns::forwarding::MessageBuilder;
use bytes::Bytes;
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use relaydns_domain::DomainError;
use relaydns_reactor::{Reactor, Runnable};
use std::cell::{Cell, RefCell};
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Largest datagram accepted from clients.
const MAX_UDP_REQUEST_SIZE: usize = 4096;

/// Pause after a failed accept (e.g. EMFILE) before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Receives every decoded inbound query.
pub trait QuestionHandler {
    fn handle_request(
        &self,
        reactor: &Reactor,
        request: Message,
        responder: Responder,
    ) -> Result<(), DomainError>;
}

#[derive(Debug, Clone)]
pub struct ListenerSettings {
    /// Port 0 picks a free port; TCP then binds the same port.
    pub bind: SocketAddr,
    pub tcp_idle_timeout: Duration,
}

/// UDP + TCP DNS listener bound on the reactor thread.
pub struct DnsListener {
    settings: ListenerSettings,
    handler: Rc<dyn QuestionHandler>,
    tasks: RefCell<Vec<AbortHandle>>,
    /// Cancelled on stop; every open TCP connection watches it.
    connections: RefCell<CancellationToken>,
    local_addr: Cell<Option<SocketAddr>>,
}

impl DnsListener {
    pub fn new(settings: ListenerSettings, handler: Rc<dyn QuestionHandler>) -> Self {
        Self {
            settings,
            handler,
            tasks: RefCell::new(Vec::new()),
            connections: RefCell::new(CancellationToken::new()),
            local_addr: Cell::new(None),
        }
    }

    /// Address both sockets are bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get()
    }

    fn bind(&self) -> Result<(UdpSocket, TcpListener), DomainError> {
        let bind_error = |proto: &str, addr: SocketAddr, e: std::io::Error| {
            DomainError::StartFailed(format!("cannot bind DNS {proto} socket on {addr}: {e}"))
        };

        let udp = std::net::UdpSocket::bind(self.settings.bind)
            .map_err(|e| bind_error("UDP", self.settings.bind, e))?;
        let addr = udp.local_addr()?;
        udp.set_nonblocking(true)?;
        let udp = UdpSocket::from_std(udp)?;

        let tcp = std::net::TcpListener::bind(addr).map_err(|e| bind_error("TCP", addr, e))?;
        tcp.set_nonblocking(true)?;
        let tcp = TcpListener::from_std(tcp)?;

        self.local_addr.set(Some(addr));
        Ok((udp, tcp))
    }
}

impl Runnable for DnsListener {
    fn start(&self, reactor: &Reactor) -> Result<(), DomainError> {
        let (udp, tcp) = self.bind()?;
        let addr = self.local_addr.get();
        let connections = CancellationToken::new();
        *self.connections.borrow_mut() = connections.clone();

        let udp_task = reactor.spawn(serve_udp(
            reactor.clone(),
            Rc::new(udp),
            Rc::clone(&self.handler),
        ));
        let tcp_task = reactor.spawn(serve_tcp(
            reactor.clone(),
            tcp,
            Rc::clone(&self.handler),
            self.settings.tcp_idle_timeout,
            connections,
        ));
        self.tasks.borrow_mut().extend([udp_task, tcp_task]);

        info!(addr = ?addr, "DNS listener started (UDP + TCP)");
        Ok(())
    }

    fn stop(&self, _reactor: &Reactor) {
        self.connections.borrow().cancel();
        for task in self.tasks.borrow_mut().drain(..) {
            task.abort();
        }
        info!(addr = ?self.local_addr.get(), "DNS listener stopped");
    }

    fn label(&self) -> &'static str {
        "dns-listener"
    }
}

async fn serve_udp(reactor: Reactor, socket: Rc<UdpSocket>, handler: Rc<dyn QuestionHandler>) {
    let mut buf = vec![0u8; MAX_UDP_REQUEST_SIZE];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                debug!(error = %e, "UDP receive failed");
                continue;
            }
        };

        let responder = Responder::Udp {
            socket: Rc::clone(&socket),
            peer,
        };
        dispatch(&reactor, handler.as_ref(), &buf[..len], responder);
    }
}

async fn serve_tcp(
    reactor: Reactor,
    listener: TcpListener,
    handler: Rc<dyn QuestionHandler>,
    idle_timeout: Duration,
    connections: CancellationToken,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "TCP accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        debug!(peer = %peer, "TCP connection accepted");
        reactor.spawn(serve_connection(
            reactor.clone(),
            stream,
            peer,
            Rc::clone(&handler),
            idle_timeout,
            connections.clone(),
        ));
    }
}

async fn serve_connection(
    reactor: Reactor,
    stream: TcpStream,
    peer: SocketAddr,
    handler: Rc<dyn QuestionHandler>,
    idle_timeout: Duration,
    shutdown: CancellationToken,
) {
    let _ = stream.set_nodelay(true);
    let (mut reader, writer) = stream.into_split();
    let (frames, pending) = mpsc::unbounded_channel();
    reactor.spawn(write_frames(writer, pending, peer, shutdown.clone()));

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(peer = %peer, "Listener stopped, closing TCP connection");
                break;
            }
            next = tokio::time::timeout(idle_timeout, read_frame(&mut reader)) => next,
        };
        let request = match next {
            Ok(Ok(Some(request))) => request,
            Ok(Ok(None)) => break,
            Ok(Err(e)) => {
                debug!(peer = %peer, error = %e, "TCP read failed");
                break;
            }
            Err(_) => {
                debug!(peer = %peer, "TCP connection idle, closing");
                break;
            }
        };

        let responder = Responder::Tcp {
            frames: frames.clone(),
            peer,
        };
        dispatch(&reactor, handler.as_ref(), &request, responder);
    }
    // The writer drains once every deferred responder is gone.
}

async fn read_frame(reader: &mut OwnedReadHalf) -> std::io::Result<Option<Vec<u8>>> {
    let len = match reader.read_u16().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut request = vec![0u8; len];
    reader.read_exact(&mut request).await?;
    Ok(Some(request))
}

async fn write_frames(
    mut writer: OwnedWriteHalf,
    mut pending: mpsc::UnboundedReceiver<Bytes>,
    peer: SocketAddr,
    shutdown: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = pending.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        let Ok(len) = u16::try_from(frame.len()) else {
            warn!(peer = %peer, size = frame.len(), "Response too large for TCP framing");
            continue;
        };
        let written = async {
            writer.write_all(&len.to_be_bytes()).await?;
            writer.write_all(&frame).await
        }
        .await;
        if let Err(e) = written {
            debug!(peer = %peer, error = %e, "TCP write failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
}

/// Decode one request and hand it to the handler. Undecodable requests that
/// still carry an ID get FORMERR; responses are ignored.
fn dispatch(reactor: &Reactor, handler: &dyn QuestionHandler, bytes: &[u8], responder: Responder) {
    let request = match Message::from_vec(bytes) {
        Ok(request) => request,
        Err(e) => {
            debug!(peer = %responder.peer(), error = %e, "Undecodable DNS request");
            if bytes.len() >= 2 {
                let id = u16::from_be_bytes([bytes[0], bytes[1]]);
                let reply = MessageBuilder::build_error(id, OpCode::Query, None, ResponseCode::FormErr)
                    .and_then(|reply| responder.send(reply));
                if let Err(e) = reply {
                    debug!(peer = %responder.peer(), error = %e, "FORMERR reply failed");
                }
            }
            return;
        }
    };

    if request.message_type() != MessageType::Query {
        debug!(peer = %responder.peer(), "Ignoring DNS response sent to the listener");
        return;
    }

    let peer = responder.peer();
    if let Err(e) = handler.handle_request(reactor, request, responder) {
        warn!(peer = %peer, error = %e, "Failed to answer DNS request");
    }
}
