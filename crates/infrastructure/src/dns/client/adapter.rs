use super::resolve_future::Reply;
use crate::dns::engine::ResolverEngine;
use relaydns_application::{AnswerCallback, CallbackContext, Resolution, ResolveFlags};
use relaydns_domain::{Answer, DomainError, Question};
use relaydns_reactor::{BridgeRunnable, Consumer, Reactor, Runnable, RunnableId};
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Work item carried across the client bridge.
pub(super) struct ClientRequest {
    pub question: Question,
    pub flags: ResolveFlags,
    pub reply: oneshot::Sender<Reply>,
}

type RequestHandler = Box<dyn FnMut(&Reactor, &Consumer<ClientRequest>)>;

/// Reactor-side half of a [`DnsClient`](super::DnsClient).
///
/// Drains the request bridge into the engine and routes answers back to
/// the requesting threads. Each request is keyed by a token that doubles
/// as its callback context.
pub(super) struct ClientAdapter {
    engine: ResolverEngine,
    bridge: BridgeRunnable<ClientRequest, RequestHandler>,
    pending: RefCell<FxHashMap<u64, oneshot::Sender<Reply>>>,
    next_token: Cell<u64>,
    shutdown: CancellationToken,
    watcher: RefCell<Option<AbortHandle>>,
    id: Cell<Option<RunnableId>>,
    /// Engine loaded on behalf of this client, unloaded with it.
    owned_engine: Cell<Option<RunnableId>>,
    this: Weak<ClientAdapter>,
}

impl ClientAdapter {
    pub fn new(
        engine: ResolverEngine,
        requests: Consumer<ClientRequest>,
        shutdown: CancellationToken,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<ClientAdapter>| {
            let adapter = this.clone();
            let handler: RequestHandler = Box::new(move |reactor, consumer| {
                if let Some(adapter) = adapter.upgrade() {
                    adapter.drain(reactor, consumer);
                }
            });

            Self {
                engine,
                bridge: BridgeRunnable::new("dns-client-bridge", requests, handler),
                pending: RefCell::new(FxHashMap::default()),
                next_token: Cell::new(0),
                shutdown,
                watcher: RefCell::new(None),
                id: Cell::new(None),
                owned_engine: Cell::new(None),
                this: this.clone(),
            }
        })
    }

    pub fn set_id(&self, id: RunnableId) {
        self.id.set(Some(id));
    }

    pub fn set_owned_engine(&self, id: RunnableId) {
        self.owned_engine.set(Some(id));
    }

    fn drain(&self, _reactor: &Reactor, consumer: &Consumer<ClientRequest>) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let caller: Rc<dyn AnswerCallback> = this;

        while let Some(request) = consumer.consume() {
            let token = self.next_token.get();
            self.next_token.set(token.wrapping_add(1));

            debug!(question = %request.question, token, "Client request");
            self.pending.borrow_mut().insert(token, request.reply);

            let outcome = self.engine.resolve(
                request.question,
                Rc::clone(&caller),
                Box::new(token),
                request.flags,
            );
            let immediate = match outcome {
                Ok(Resolution::Pending) => continue,
                Ok(Resolution::Ready(answer, _)) => Ok(answer),
                Err(e) => Err(e),
            };
            if let Some(reply) = self.pending.borrow_mut().remove(&token) {
                let _ = reply.send(immediate);
            }
        }
    }

    /// Unload this adapter and the engine it owns.
    fn unload(&self, reactor: &Reactor) {
        if let Some(id) = self.id.take() {
            reactor.unload_runnable(id);
        }
        if let Some(id) = self.owned_engine.take() {
            reactor.unload_runnable(id);
        }
    }
}

impl AnswerCallback for ClientAdapter {
    fn answer_delivered(&self, _reactor: &Reactor, answer: &Arc<Answer>, context: CallbackContext) {
        let Ok(token) = context.downcast::<u64>() else {
            return;
        };
        let reply = self.pending.borrow_mut().remove(&token);
        match reply {
            // The receiver may be gone; the answer is cached regardless.
            Some(reply) => {
                let _ = reply.send(Ok(Arc::clone(answer)));
            }
            None => debug!(token = *token, "Answer for an unknown client request"),
        }
    }
}

impl Runnable for ClientAdapter {
    fn start(&self, reactor: &Reactor) -> Result<(), DomainError> {
        self.bridge.start(reactor)?;

        let shutdown = self.shutdown.clone();
        let adapter = self.this.clone();
        let task_reactor = reactor.clone();
        let watcher = reactor.spawn(async move {
            shutdown.cancelled().await;
            if let Some(adapter) = adapter.upgrade() {
                adapter.unload(&task_reactor);
            }
        });
        *self.watcher.borrow_mut() = Some(watcher);
        Ok(())
    }

    fn stop(&self, reactor: &Reactor) {
        if let Some(watcher) = self.watcher.borrow_mut().take() {
            watcher.abort();
        }
        self.shutdown.cancel();
        self.bridge.stop(reactor);

        let cancelled = match self.this.upgrade() {
            Some(this) => {
                let caller: Rc<dyn AnswerCallback> = this;
                self.engine.cancel(&caller)
            }
            None => 0,
        };

        let pending: Vec<_> = self.pending.borrow_mut().drain().collect();
        let failed = pending.len();
        for (_, reply) in pending {
            let _ = reply.send(Err(DomainError::ClientShutdown));
        }

        info!(cancelled, failed, "DNS client stopped");
    }

    fn label(&self) -> &'static str {
        "dns-client"
    }
}
