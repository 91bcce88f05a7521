pub mod ports;

pub use ports::{
    AnswerCallback, CallbackContext, Resolution, ResolveFlags, Resolver, TransportProtocol,
    UpstreamTransport,
};
