pub mod cache;
pub mod client;
pub mod engine;
pub mod forwarding;
pub mod server;
pub mod transport;

pub use cache::AnswerCache;
pub use client::{DnsClient, ResolveFuture};
pub use engine::{EngineStats, ResolverEngine, ResolverSettings};
pub use server::{CachingServer, DnsListener, ListenerSettings, QueryContextPool};
pub use transport::NetworkTransport;
