use crate::bridge::{self, Consumer, Producer};
use crate::reactor::Reactor;
use relaydns_domain::DomainError;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{JoinHandle, ThreadId};
use tokio::runtime::Runtime;
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

type Task = Box<dyn FnOnce(&Reactor) + Send>;

/// Owner of one reactor thread.
///
/// Clones share the same thread. When the last clone is dropped the loop is
/// asked to stop; [`Dispatcher::wait_stopped`] blocks until it has.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

struct Shared {
    name: Arc<str>,
    tasks: Producer<Task>,
    shutdown: CancellationToken,
    stopped: Arc<Latch>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[derive(Default)]
struct Latch {
    released: Mutex<bool>,
    cond: Condvar,
}

impl Latch {
    fn release(&self) {
        let mut released = self.released.lock().unwrap_or_else(|p| p.into_inner());
        *released = true;
        self.cond.notify_all();
    }

    fn is_released(&self) -> bool {
        *self.released.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn wait(&self) {
        let mut released = self.released.lock().unwrap_or_else(|p| p.into_inner());
        while !*released {
            released = self.cond.wait(released).unwrap_or_else(|p| p.into_inner());
        }
    }
}

/// Releases the stopped latch even if the loop panics.
struct LatchGuard(Arc<Latch>);

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

impl Dispatcher {
    /// Spawn the reactor thread `name` and return once it is running.
    pub fn start(name: &str) -> Result<Self, DomainError> {
        let name: Arc<str> = Arc::from(name);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DomainError::StartFailed(format!("{name}: {e}")))?;

        let (producer, consumer) = bridge::channel::<Task>();
        let shutdown = CancellationToken::new();
        let stopped = Arc::new(Latch::default());

        let thread = {
            let loop_name = Arc::clone(&name);
            let shutdown = shutdown.clone();
            let stopped = Arc::clone(&stopped);
            std::thread::Builder::new()
                .name(name.to_string())
                .spawn(move || run_loop(runtime, loop_name, consumer, shutdown, stopped))
                .map_err(|e| DomainError::StartFailed(format!("{name}: {e}")))?
        };

        info!(dispatcher = %name, "Dispatcher started");

        Ok(Self {
            shared: Arc::new(Shared {
                name,
                tasks: producer,
                shutdown,
                stopped,
                thread_id: thread.thread().id(),
                thread: Mutex::new(Some(thread)),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Queue `task` to run on the reactor thread.
    pub fn execute<F>(&self, task: F) -> Result<(), DomainError>
    where
        F: FnOnce(&Reactor) + Send + 'static,
    {
        if self.shared.shutdown.is_cancelled() {
            return Err(self.stopped_error());
        }
        self.shared
            .tasks
            .produce(Box::new(task))
            .map_err(|_| self.stopped_error())
    }

    /// Run `task` on the reactor thread and block until it returns.
    pub fn call<F, R>(&self, task: F) -> Result<R, DomainError>
    where
        F: FnOnce(&Reactor) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_reactor_thread() {
            return Err(DomainError::OnReactorThread(format!(
                "call() on dispatcher '{}'",
                self.name()
            )));
        }

        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        self.execute(move |reactor| {
            let _ = tx.send(task(reactor));
        })?;
        // The sender is dropped unrun if the loop exits first.
        rx.recv().map_err(|_| self.stopped_error())
    }

    /// Ask the loop to exit. Safe from any thread, idempotent.
    pub fn stop(&self) {
        if !self.shared.shutdown.is_cancelled() {
            debug!(dispatcher = %self.shared.name, "Stop requested");
            self.shared.shutdown.cancel();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.is_released()
    }

    /// Block until the reactor thread has exited.
    pub fn wait_stopped(&self) -> Result<(), DomainError> {
        if self.is_reactor_thread() {
            return Err(DomainError::OnReactorThread(format!(
                "wait_stopped() on dispatcher '{}'",
                self.name()
            )));
        }

        self.shared.stopped.wait();

        let handle = self
            .shared
            .thread
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(dispatcher = %self.shared.name, "Reactor thread panicked");
            }
        }
        Ok(())
    }

    pub fn is_reactor_thread(&self) -> bool {
        std::thread::current().id() == self.shared.thread_id
    }

    fn stopped_error(&self) -> DomainError {
        DomainError::DispatcherStopped(self.shared.name.to_string())
    }
}

fn run_loop(
    runtime: Runtime,
    name: Arc<str>,
    tasks: Consumer<Task>,
    shutdown: CancellationToken,
    stopped: Arc<Latch>,
) {
    let _release = LatchGuard(stopped);
    let local = LocalSet::new();
    let reactor = Reactor::with_shutdown(name, shutdown.clone());
    let span = reactor.span().clone();

    local.block_on(
        &runtime,
        async {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    ready = tasks.ready() => {
                        if !ready {
                            break;
                        }
                        while let Some(task) = tasks.consume() {
                            task(&reactor);
                        }
                    }
                }
            }

            reactor.unload_all();
            let dropped = tasks.close();
            info!(dropped, "Dispatcher stopped");
        }
        .instrument(span),
    );

    // Local tasks still hold sockets and timers; drop them inside the runtime.
    let _guard = runtime.enter();
    drop(local);
}
