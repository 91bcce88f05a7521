use relaydns_domain::Answer;
use relaydns_reactor::Reactor;
use std::any::Any;
use std::sync::Arc;

/// Opaque per-request value handed back with the answer.
pub type CallbackContext = Box<dyn Any>;

/// Receives answers for questions that were not answered synchronously.
///
/// Invoked on the reactor thread, once per waiter. The answer is a shared
/// snapshot; copy out what must outlive the call.
pub trait AnswerCallback {
    fn answer_delivered(&self, reactor: &Reactor, answer: &Arc<Answer>, context: CallbackContext);
}
