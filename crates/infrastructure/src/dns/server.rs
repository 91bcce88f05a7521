mod caching_server;
mod context_pool;
mod listener;
mod responder;

pub use caching_server::CachingServer;
pub use context_pool::{PooledContext, QueryContext, QueryContextPool};
pub use listener::{DnsListener, ListenerSettings, QuestionHandler};
pub use responder::Responder;
