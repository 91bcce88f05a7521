use bytes::Bytes;
use relaydns_application::{AnswerCallback, CallbackContext, TransportProtocol};
use relaydns_domain::AnswerStatus;
use relaydns_reactor::TimerHandle;
use smallvec::SmallVec;
use std::rc::Rc;
use tokio::task::AbortHandle;

pub(super) struct Waiter {
    pub caller: Rc<dyn AnswerCallback>,
    pub context: CallbackContext,
}

impl Waiter {
    pub fn belongs_to(&self, caller: &Rc<dyn AnswerCallback>) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.caller), Rc::as_ptr(caller))
    }
}

/// Why the previous attempt failed; decides the terminal status once the
/// retry budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AttemptFailure {
    Timeout,
    Refused,
    Error { rcode: u16 },
}

impl AttemptFailure {
    pub fn terminal(self) -> (AnswerStatus, u16) {
        match self {
            AttemptFailure::Timeout => (AnswerStatus::Timeout, 0),
            AttemptFailure::Refused => (AnswerStatus::Refused, 5),
            AttemptFailure::Error { rcode } => (AnswerStatus::Error, rcode),
        }
    }
}

/// One question awaiting an upstream answer.
pub(super) struct InFlight {
    pub waiters: SmallVec<[Waiter; 2]>,
    pub query: Bytes,
    pub message_id: u16,
    /// Retries already spent (the first attempt is not a retry).
    pub retries_done: u32,
    pub server_idx: usize,
    pub protocol: TransportProtocol,
    /// Bumped per attempt; completions of older attempts are ignored.
    pub generation: u64,
    pub task: Option<AbortHandle>,
    pub timer: Option<TimerHandle>,
}

impl InFlight {
    pub fn new(query: Bytes, message_id: u16, server_idx: usize, protocol: TransportProtocol) -> Self {
        Self {
            waiters: SmallVec::new(),
            query,
            message_id,
            retries_done: 0,
            server_idx,
            protocol,
            generation: 0,
            task: None,
            timer: None,
        }
    }

    /// Abort the outstanding attempt and its timer.
    pub fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}
