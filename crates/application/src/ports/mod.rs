pub mod answer_callback;
pub mod resolver;
pub mod upstream_transport;

pub use answer_callback::{AnswerCallback, CallbackContext};
pub use resolver::{Resolution, ResolveFlags, Resolver};
pub use upstream_transport::{TransportProtocol, UpstreamTransport};
