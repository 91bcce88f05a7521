use relaydns_domain::{Answer, DomainError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

pub(super) type Reply = Result<Arc<Answer>, DomainError>;

/// Pending result of a [`DnsClient`](super::DnsClient) request.
///
/// Resolves once the reactor delivers the answer. Dropping it does not
/// cancel the upstream query; the answer is still cached.
#[must_use = "futures do nothing unless polled or waited on"]
pub struct ResolveFuture {
    state: State,
}

enum State {
    Waiting(oneshot::Receiver<Reply>),
    Failed(Option<DomainError>),
}

impl ResolveFuture {
    pub(super) fn waiting(reply: oneshot::Receiver<Reply>) -> Self {
        Self {
            state: State::Waiting(reply),
        }
    }

    pub(super) fn failed(error: DomainError) -> Self {
        Self {
            state: State::Failed(Some(error)),
        }
    }

    /// Block the current thread until the answer arrives.
    ///
    /// Must not be called on the reactor thread serving the client: the
    /// answer could never be delivered.
    pub fn wait(self) -> Reply {
        futures::executor::block_on(self)
    }
}

impl Future for ResolveFuture {
    type Output = Reply;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            State::Waiting(reply) => Pin::new(reply)
                .poll(cx)
                // Sender dropped unanswered: the bridge or adapter went away.
                .map(|received| received.unwrap_or(Err(DomainError::ClientShutdown))),
            State::Failed(error) => {
                Poll::Ready(Err(error.take().unwrap_or(DomainError::ClientShutdown)))
            }
        }
    }
}
