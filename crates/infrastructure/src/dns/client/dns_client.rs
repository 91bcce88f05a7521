use super::adapter::{ClientAdapter, ClientRequest};
use super::resolve_future::ResolveFuture;
use crate::dns::engine::{ResolverEngine, ResolverSettings};
use relaydns_application::{ResolveFlags, UpstreamTransport};
use relaydns_domain::{DomainError, Question, RecordType};
use relaydns_reactor::{bridge, Dispatcher, Producer, Reactor, Runnable};
use std::net::IpAddr;
use std::rc::Rc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Thread-safe handle to a resolver engine running on a reactor.
///
/// Requests cross into the reactor through a bridge and come back as
/// [`ResolveFuture`]s, which can be awaited from any runtime or blocked on
/// with [`ResolveFuture::wait`].
///
/// ```ignore
/// let dispatcher = Dispatcher::start("resolver")?;
/// let client = DnsClient::spawn(&dispatcher, settings, || {
///     Rc::new(NetworkTransport::default())
/// })?;
/// let answer = client.resolve_a("example.com").wait()?;
/// ```
#[derive(Clone)]
pub struct DnsClient {
    requests: Producer<ClientRequest>,
    shutdown: CancellationToken,
}

impl DnsClient {
    /// Attach a client to an engine already loaded on `reactor`.
    ///
    /// Must be called on the reactor thread.
    pub fn install(reactor: &Reactor, engine: ResolverEngine) -> Result<Self, DomainError> {
        let (client, adapter) = Self::adapter(engine);
        let id = reactor.load_runnable(Rc::clone(&adapter) as Rc<dyn Runnable>)?;
        adapter.set_id(id);
        debug!(reactor = reactor.name(), "DNS client installed");
        Ok(client)
    }

    /// Build and load a dedicated engine plus client on `dispatcher`.
    ///
    /// The transport is created on the reactor thread, since transports are
    /// not `Send`. Both components are unloaded by [`DnsClient::shutdown`].
    pub fn spawn<F>(
        dispatcher: &Dispatcher,
        settings: ResolverSettings,
        transport_factory: F,
    ) -> Result<Self, DomainError>
    where
        F: FnOnce() -> Rc<dyn UpstreamTransport> + Send + 'static,
    {
        let client = dispatcher.call(move |reactor| {
            let engine = ResolverEngine::new(settings, transport_factory());
            let engine_id = reactor.load_runnable(Rc::new(engine.clone()))?;

            let (client, adapter) = Self::adapter(engine);
            match reactor.load_runnable(Rc::clone(&adapter) as Rc<dyn Runnable>) {
                Ok(id) => {
                    adapter.set_id(id);
                    adapter.set_owned_engine(engine_id);
                    Ok(client)
                }
                Err(e) => {
                    reactor.unload_runnable(engine_id);
                    Err(e)
                }
            }
        })??;

        info!(dispatcher = dispatcher.name(), "DNS client spawned");
        Ok(client)
    }

    fn adapter(engine: ResolverEngine) -> (Self, Rc<ClientAdapter>) {
        let (requests, consumer) = bridge::channel();
        let shutdown = CancellationToken::new();
        let adapter = ClientAdapter::new(engine, consumer, shutdown.clone());
        (Self { requests, shutdown }, adapter)
    }

    pub fn resolve(&self, question: Question) -> ResolveFuture {
        self.resolve_with(question, ResolveFlags::default())
    }

    pub fn resolve_with(&self, question: Question, flags: ResolveFlags) -> ResolveFuture {
        if self.shutdown.is_cancelled() {
            return ResolveFuture::failed(DomainError::ClientShutdown);
        }

        let (reply, receiver) = oneshot::channel();
        let request = ClientRequest {
            question,
            flags,
            reply,
        };
        match self.requests.produce(request) {
            Ok(()) => ResolveFuture::waiting(receiver),
            Err(_) => ResolveFuture::failed(DomainError::ClientShutdown),
        }
    }

    pub fn resolve_a(&self, name: &str) -> ResolveFuture {
        self.resolve_name(RecordType::A, name)
    }

    pub fn resolve_aaaa(&self, name: &str) -> ResolveFuture {
        self.resolve_name(RecordType::AAAA, name)
    }

    /// Reverse lookup of `ip`.
    pub fn resolve_ptr(&self, ip: IpAddr) -> ResolveFuture {
        self.resolve(Question::reverse(ip))
    }

    pub fn resolve_ns(&self, name: &str) -> ResolveFuture {
        self.resolve_name(RecordType::NS, name)
    }

    pub fn resolve_mx(&self, name: &str) -> ResolveFuture {
        self.resolve_name(RecordType::MX, name)
    }

    pub fn resolve_soa(&self, name: &str) -> ResolveFuture {
        self.resolve_name(RecordType::SOA, name)
    }

    pub fn resolve_srv(&self, name: &str) -> ResolveFuture {
        self.resolve_name(RecordType::SRV, name)
    }

    pub fn resolve_txt(&self, name: &str) -> ResolveFuture {
        self.resolve_name(RecordType::TXT, name)
    }

    fn resolve_name(&self, record_type: RecordType, name: &str) -> ResolveFuture {
        match Question::new(record_type, name) {
            Ok(question) => self.resolve(question),
            Err(e) => ResolveFuture::failed(e),
        }
    }

    /// Stop accepting requests and unload the reactor side. Idempotent and
    /// callable from any thread; outstanding futures fail with
    /// [`DomainError::ClientShutdown`].
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let discarded = self.requests.close();
        self.shutdown.cancel();
        debug!(discarded, "DNS client shutdown requested");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
