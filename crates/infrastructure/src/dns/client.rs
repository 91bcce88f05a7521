mod adapter;
mod dns_client;
mod resolve_future;

pub use dns_client::DnsClient;
pub use resolve_future::ResolveFuture;
