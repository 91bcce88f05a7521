use crate::ports::{AnswerCallback, CallbackContext};
use relaydns_domain::{Answer, DomainError, Question};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Outcome of [`Resolver::resolve`].
pub enum Resolution {
    /// Answered synchronously; the callback will not be invoked and the
    /// context is handed back unused.
    Ready(Arc<Answer>, CallbackContext),
    /// The callback receives the answer and the context later.
    Pending,
}

impl Resolution {
    pub fn is_pending(&self) -> bool {
        matches!(self, Resolution::Pending)
    }

    pub fn into_answer(self) -> Option<Arc<Answer>> {
        match self {
            Resolution::Ready(answer, _) => Some(answer),
            Resolution::Pending => None,
        }
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Ready(answer, _) => f.debug_tuple("Ready").field(answer).finish(),
            Resolution::Pending => f.write_str("Pending"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveFlags {
    /// Skip the cache lookup; the fresh answer is still cached.
    pub bypass_cache: bool,
    /// Never contact an upstream: a miss is answered `Refused`.
    pub cache_only: bool,
}

/// Reactor-thread resolution capability shared by every front-end.
pub trait Resolver {
    fn resolve(
        &self,
        question: Question,
        caller: Rc<dyn AnswerCallback>,
        context: CallbackContext,
        flags: ResolveFlags,
    ) -> Result<Resolution, DomainError>;

    /// Drop every pending waiter registered by `caller`. Returns how many
    /// were removed; unknown callers are a no-op.
    fn cancel(&self, caller: &Rc<dyn AnswerCallback>) -> usize;

    fn lookup_cached(&self, question: &Question) -> Option<Arc<Answer>>;
}
