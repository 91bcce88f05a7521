use super::responder::Responder;
use hickory_proto::op::{OpCode, Query};
use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;
use tracing::debug;

/// Per-query state kept while the engine resolves a question.
#[derive(Default)]
pub struct QueryContext {
    pub id: u16,
    pub op_code: Option<OpCode>,
    /// Question section as received, echoed in the response.
    pub query: Option<Query>,
    pub recursion_desired: bool,
    /// Largest response the client accepts over this transport.
    pub max_response_size: usize,
    pub responder: Option<Responder>,
}

impl QueryContext {
    fn reset(&mut self) {
        self.id = 0;
        self.op_code = None;
        self.query = None;
        self.recursion_desired = false;
        self.max_response_size = 0;
        self.responder = None;
    }
}

struct PoolState {
    free: Vec<Box<QueryContext>>,
    capacity: usize,
    in_use: usize,
}

/// Reactor-local pool of [`QueryContext`] slots.
///
/// Slots come back through [`PooledContext`]'s `Drop`, so every exit path
/// (immediate answer, deferred answer, send failure, engine shutdown)
/// releases them. At most `capacity` idle slots are retained.
#[derive(Clone)]
pub struct QueryContextPool {
    state: Rc<RefCell<PoolState>>,
}

impl QueryContextPool {
    pub fn new(capacity: usize) -> Self {
        let free = (0..capacity).map(|_| Box::default()).collect();
        Self {
            state: Rc::new(RefCell::new(PoolState {
                free,
                capacity,
                in_use: 0,
            })),
        }
    }

    pub fn acquire(&self) -> PooledContext {
        let mut state = self.state.borrow_mut();
        let context = state.free.pop().unwrap_or_else(|| {
            debug!(in_use = state.in_use, "Query context pool exhausted, allocating");
            Box::default()
        });
        state.in_use += 1;
        PooledContext {
            context: Some(context),
            pool: Rc::clone(&self.state),
        }
    }

    pub fn available(&self) -> usize {
        self.state.borrow().free.len()
    }

    pub fn in_use(&self) -> usize {
        self.state.borrow().in_use
    }
}

/// Checked-out slot; returned to its pool when dropped.
pub struct PooledContext {
    context: Option<Box<QueryContext>>,
    pool: Rc<RefCell<PoolState>>,
}

impl Deref for PooledContext {
    type Target = QueryContext;

    fn deref(&self) -> &QueryContext {
        // Only `Drop` takes the slot out.
        self.context.as_deref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledContext {
    fn deref_mut(&mut self) -> &mut QueryContext {
        self.context.as_deref_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledContext {
    fn drop(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.reset();
            let mut pool = self.pool.borrow_mut();
            pool.in_use = pool.in_use.saturating_sub(1);
            if pool.free.len() < pool.capacity {
                pool.free.push(context);
            }
        }
    }
}
