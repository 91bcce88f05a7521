use relaydns_domain::DomainError;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument, Span};

/// Long-lived component hosted by a reactor.
///
/// `start` and `stop` are always invoked on the reactor thread.
pub trait Runnable {
    fn start(&self, reactor: &Reactor) -> Result<(), DomainError>;

    fn stop(&self, reactor: &Reactor);

    fn label(&self) -> &'static str {
        "runnable"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunnableId(u64);

/// Handle to a scheduled timer callback.
#[derive(Debug)]
pub struct TimerHandle {
    abort: AbortHandle,
}

impl TimerHandle {
    /// Prevent the callback from running. No-op once it has fired.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Reactor-thread view of a dispatcher.
///
/// Cheap to clone, deliberately `!Send`. Outside of a [`Dispatcher`]
/// (tests, embedding) it must be driven inside a tokio `LocalSet`.
///
/// [`Dispatcher`]: crate::Dispatcher
#[derive(Clone)]
pub struct Reactor {
    inner: Rc<ReactorInner>,
}

struct ReactorInner {
    name: Arc<str>,
    span: Span,
    runnables: RefCell<Vec<(RunnableId, Rc<dyn Runnable>)>>,
    next_id: Cell<u64>,
    shutdown: CancellationToken,
}

impl Reactor {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self::with_shutdown(name.into(), CancellationToken::new())
    }

    pub(crate) fn with_shutdown(name: Arc<str>, shutdown: CancellationToken) -> Self {
        let span = info_span!("reactor", name = %name);
        Self {
            inner: Rc::new(ReactorInner {
                name,
                span,
                runnables: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                shutdown,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Span every reactor-side log line is recorded under.
    pub fn span(&self) -> &Span {
        &self.inner.span
    }

    /// Start `runnable` and keep it until unloaded or the reactor stops.
    ///
    /// A runnable whose `start` fails is not registered.
    pub fn load_runnable(&self, runnable: Rc<dyn Runnable>) -> Result<RunnableId, DomainError> {
        if self.is_stopping() {
            return Err(DomainError::DispatcherStopped(self.name().to_string()));
        }

        runnable.start(self)?;

        let id = RunnableId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        debug!(label = runnable.label(), id = id.0, "Runnable loaded");
        self.inner.runnables.borrow_mut().push((id, runnable));
        Ok(id)
    }

    /// Stop and forget a runnable. Returns `false` if it was not loaded.
    pub fn unload_runnable(&self, id: RunnableId) -> bool {
        let removed = {
            let mut runnables = self.inner.runnables.borrow_mut();
            runnables
                .iter()
                .position(|(rid, _)| *rid == id)
                .map(|pos| runnables.remove(pos).1)
        };

        match removed {
            Some(runnable) => {
                debug!(label = runnable.label(), id = id.0, "Runnable unloaded");
                runnable.stop(self);
                true
            }
            None => false,
        }
    }

    pub fn runnable_count(&self) -> usize {
        self.inner.runnables.borrow().len()
    }

    /// Run `callback` on this reactor after `delay`.
    pub fn submit_timer<F>(&self, delay: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce(&Reactor) + 'static,
    {
        let reactor = self.clone();
        let abort = self.spawn(async move {
            tokio::time::sleep(delay).await;
            callback(&reactor);
        });
        TimerHandle { abort }
    }

    /// Spawn a task on the reactor thread.
    pub fn spawn<F>(&self, future: F) -> AbortHandle
    where
        F: Future<Output = ()> + 'static,
    {
        tokio::task::spawn_local(future.instrument(self.inner.span.clone())).abort_handle()
    }

    /// Ask the owning loop to exit after the current batch.
    pub fn stop(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Stop every runnable, most recently loaded first.
    pub(crate) fn unload_all(&self) {
        loop {
            let next = self.inner.runnables.borrow_mut().pop();
            match next {
                Some((id, runnable)) => {
                    debug!(label = runnable.label(), id = id.0, "Stopping runnable");
                    runnable.stop(self);
                }
                None => break,
            }
        }
    }
}

impl Drop for ReactorInner {
    fn drop(&mut self) {
        let remaining = self.runnables.get_mut().len();
        if remaining > 0 {
            warn!(reactor = %self.name, remaining, "Reactor dropped with runnables still loaded");
        }
    }
}
