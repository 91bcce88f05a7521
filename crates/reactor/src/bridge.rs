//! Cross-thread mailbox into a reactor.
//!
//! [`Producer`]s are `Send + Sync` and may be cloned onto any number of
//! threads. The single [`Consumer`] lives on the reactor: it is signalled
//! once per empty → non-empty transition and must drain with
//! [`Consumer::consume`] until it returns `None`.

use crate::reactor::{Reactor, Runnable};
use relaydns_domain::DomainError;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::task::AbortHandle;
use tracing::debug;

struct Queue<T> {
    items: VecDeque<T>,
    closed: bool,
}

struct Shared<T> {
    queue: Mutex<Queue<T>>,
    signal: Notify,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Queue<T>> {
        // A producer panicking mid-push leaves the queue consistent.
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Create a connected producer/consumer pair.
pub fn channel<T>() -> (Producer<T>, Consumer<T>) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(Queue {
            items: VecDeque::new(),
            closed: false,
        }),
        signal: Notify::new(),
    });
    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Producer<T> {
    /// Enqueue `item` and wake the consumer if the queue was empty.
    ///
    /// Never blocks beyond the short queue lock.
    pub fn produce(&self, item: T) -> Result<(), DomainError> {
        let was_empty = {
            let mut queue = self.shared.lock();
            if queue.closed {
                return Err(DomainError::BridgeClosed);
            }
            queue.items.push_back(item);
            queue.items.len() == 1
        };

        if was_empty {
            self.shared.signal.notify_one();
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Close from the producing side; queued items are dropped.
    pub fn close(&self) -> usize {
        close(&self.shared)
    }
}

pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Consumer<T> {
    /// Next queued item, in enqueue order.
    pub fn consume(&self) -> Option<T> {
        self.shared.lock().items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Wait for the next "work available" signal.
    ///
    /// Returns `false` once the bridge is closed.
    pub async fn ready(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.shared.signal.notified().await;
        !self.is_closed()
    }

    /// Refuse further items and drop the queued ones. Idempotent; returns
    /// how many items were discarded.
    pub fn close(&self) -> usize {
        close(&self.shared)
    }
}

fn close<T>(shared: &Shared<T>) -> usize {
    let discarded: Vec<T> = {
        let mut queue = shared.lock();
        if queue.closed {
            return 0;
        }
        queue.closed = true;
        queue.items.drain(..).collect()
    };
    shared.signal.notify_one();
    // Dropped outside the lock: items may own reply channels.
    let count = discarded.len();
    drop(discarded);
    count
}

/// Runs `handler` on the reactor once per wake-up of a bridge consumer.
pub struct BridgeRunnable<T, H> {
    consumer: Rc<Consumer<T>>,
    handler: Rc<RefCell<H>>,
    task: RefCell<Option<AbortHandle>>,
    label: &'static str,
}

impl<T, H> BridgeRunnable<T, H>
where
    T: 'static,
    H: FnMut(&Reactor, &Consumer<T>) + 'static,
{
    pub fn new(label: &'static str, consumer: Consumer<T>, handler: H) -> Self {
        Self {
            consumer: Rc::new(consumer),
            handler: Rc::new(RefCell::new(handler)),
            task: RefCell::new(None),
            label,
        }
    }

    pub fn consumer(&self) -> &Consumer<T> {
        &self.consumer
    }
}

impl<T, H> Runnable for BridgeRunnable<T, H>
where
    T: 'static,
    H: FnMut(&Reactor, &Consumer<T>) + 'static,
{
    fn start(&self, reactor: &Reactor) -> Result<(), DomainError> {
        if self.task.borrow().is_some() {
            return Ok(());
        }
        if self.consumer.is_closed() {
            return Err(DomainError::BridgeClosed);
        }

        let consumer = Rc::clone(&self.consumer);
        let handler = Rc::clone(&self.handler);
        let task_reactor = reactor.clone();
        let label = self.label;
        let handle = reactor.spawn(async move {
            while consumer.ready().await {
                (handler.borrow_mut())(&task_reactor, &consumer);
            }
            debug!(label, "Bridge consumer finished");
        });
        *self.task.borrow_mut() = Some(handle);
        Ok(())
    }

    fn stop(&self, _reactor: &Reactor) {
        let discarded = self.consumer.close();
        if let Some(task) = self.task.borrow_mut().take() {
            task.abort();
        }
        if discarded > 0 {
            debug!(label = self.label, discarded, "Bridge closed with pending items");
        }
    }

    fn label(&self) -> &'static str {
        self.label
    }
}
