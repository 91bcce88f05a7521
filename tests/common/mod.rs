#![allow(dead_code, unused_imports)]
pub mod fixtures;
pub mod test_server;
pub mod upstream;

pub use fixtures::TestDomains;
pub use test_server::{TestClient, TestServer, TestServerBuilder};
pub use upstream::{FakeUpstream, UpstreamMode};
