use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid domain name: {0}")]
    InvalidDomainName(String),

    #[error("Unsupported query type: {0}")]
    UnsupportedQueryType(String),

    #[error("Invalid DNS response: {0}")]
    InvalidDnsResponse(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Resolver engine is not started")]
    NotStarted,

    #[error("Dispatcher '{0}' is stopped")]
    DispatcherStopped(String),

    #[error("Bridge is closed")]
    BridgeClosed,

    #[error("DNS client has been shut down")]
    ClientShutdown,

    #[error("Failed to send DNS response to {peer}: {reason}")]
    ResponseSend { peer: String, reason: String },

    #[error("Operation would block the reactor thread: {0}")]
    OnReactorThread(String),

    #[error("Component failed to start: {0}")]
    StartFailed(String),
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        DomainError::IoError(e.to_string())
    }
}
