#![allow(dead_code, unused_imports)]
pub mod builders;
pub mod dns_server_mock;
pub mod scripted_transport;

pub use builders::{a_record, example_a, settings, settle, upstream, RecordingCallback};
pub use dns_server_mock::MockDnsServer;
pub use scripted_transport::{Reply, ScriptedTransport};
