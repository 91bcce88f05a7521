//! Single-threaded reactor hosting the resolver engine and its front-ends.
//!
//! A [`Dispatcher`] owns one OS thread running a tokio current-thread
//! runtime and a `LocalSet`. Everything loaded into it (components,
//! timers, socket tasks) runs on that thread only, so reactor-side state
//! lives in `Rc<RefCell<_>>` without locks. Other threads talk to it
//! through the [`bridge`] (`Producer` / `Consumer`) and nothing else.

pub mod bridge;
pub mod dispatcher;
pub mod reactor;

pub use bridge::{BridgeRunnable, Consumer, Producer};
pub use dispatcher::Dispatcher;
pub use reactor::{Reactor, Runnable, RunnableId, TimerHandle};
