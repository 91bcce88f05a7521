use super::context_pool::{PooledContext, QueryContextPool};
use super::listener::QuestionHandler;
use super::responder::Responder;
use crate::dns::engine::ResolverEngine;
use crate::dns::forwarding::{MessageBuilder, RecordTypeMapper, ResponseHeader};
use hickory_proto::op::{Message, OpCode, ResponseCode};
use relaydns_application::{
    AnswerCallback, CallbackContext, Resolution, ResolveFlags, TransportProtocol,
};
use relaydns_domain::{Answer, AnswerStatus, DomainError, Question};
use relaydns_reactor::Reactor;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Plain DNS over UDP without EDNS (RFC 1035).
const DEFAULT_UDP_PAYLOAD: usize = 512;

type SendErrorHook = Box<dyn Fn(&DomainError)>;

/// Answers inbound queries from a [`ResolverEngine`].
///
/// Cache hits are answered inline; misses park their pooled context in the
/// engine and are answered from [`AnswerCallback::answer_delivered`].
#[derive(Clone)]
pub struct CachingServer {
    inner: Rc<ServerInner>,
}

struct ServerInner {
    engine: ResolverEngine,
    pool: QueryContextPool,
    recursion_available: bool,
    max_udp_payload: u16,
    send_failures: Cell<u64>,
    send_error_hook: RefCell<Option<SendErrorHook>>,
}

impl CachingServer {
    pub fn new(
        engine: ResolverEngine,
        pool: QueryContextPool,
        recursion_available: bool,
        max_udp_payload: u16,
    ) -> Self {
        Self {
            inner: Rc::new(ServerInner {
                engine,
                pool,
                recursion_available,
                max_udp_payload,
                send_failures: Cell::new(0),
                send_error_hook: RefCell::new(None),
            }),
        }
    }

    pub fn pool(&self) -> &QueryContextPool {
        &self.inner.pool
    }

    pub fn engine(&self) -> &ResolverEngine {
        &self.inner.engine
    }

    /// Responses that could not be handed to the transport.
    pub fn send_failures(&self) -> u64 {
        self.inner.send_failures.get()
    }

    /// Called with every [`DomainError::ResponseSend`], inline or deferred,
    /// after the query context went back to the pool.
    pub fn on_send_error(&self, hook: impl Fn(&DomainError) + 'static) {
        *self.inner.send_error_hook.borrow_mut() = Some(Box::new(hook));
    }
}

impl QuestionHandler for CachingServer {
    fn handle_request(
        &self,
        _reactor: &Reactor,
        request: Message,
        responder: Responder,
    ) -> Result<(), DomainError> {
        let inner = &self.inner;
        let id = request.id();
        let op_code = request.op_code();
        let query = request.queries().first().cloned();

        if op_code != OpCode::Query {
            debug!(peer = %responder.peer(), op_code = ?op_code, "Unsupported opcode");
            return send_error(&responder, id, op_code, query.as_ref(), ResponseCode::NotImp);
        }

        let query = match (request.queries().len(), query) {
            (1, Some(query)) => query,
            (count, query) => {
                debug!(peer = %responder.peer(), questions = count, "Request must carry exactly one question");
                return send_error(&responder, id, op_code, query.as_ref(), ResponseCode::FormErr);
            }
        };

        let Some(record_type) = RecordTypeMapper::from_hickory(query.query_type()) else {
            debug!(peer = %responder.peer(), query_type = ?query.query_type(), "Unsupported query type");
            return send_error(&responder, id, op_code, Some(&query), ResponseCode::NotImp);
        };

        let question = match Question::new(record_type, &query.name().to_ascii()) {
            Ok(question) => question,
            Err(e) => {
                debug!(peer = %responder.peer(), error = %e, "Invalid question name");
                return send_error(&responder, id, op_code, Some(&query), ResponseCode::FormErr);
            }
        };

        let max_response_size = match responder.protocol() {
            TransportProtocol::Udp => usize::from(
                request
                    .extensions()
                    .as_ref()
                    .map(|edns| edns.max_payload().min(inner.max_udp_payload))
                    .unwrap_or(DEFAULT_UDP_PAYLOAD as u16)
                    .max(DEFAULT_UDP_PAYLOAD as u16),
            ),
            TransportProtocol::Tcp => usize::from(u16::MAX),
        };

        let mut ctx = inner.pool.acquire();
        ctx.id = id;
        ctx.op_code = Some(op_code);
        ctx.query = Some(query.clone());
        ctx.recursion_desired = request.recursion_desired();
        ctx.max_response_size = max_response_size;
        ctx.responder = Some(responder.clone());

        debug!(peer = %responder.peer(), question = %question, "Inbound query");

        let flags = ResolveFlags {
            bypass_cache: false,
            cache_only: !inner.recursion_available,
        };
        let caller: Rc<dyn AnswerCallback> = self.inner.clone();
        match inner.engine.resolve(question, caller, Box::new(ctx), flags) {
            Ok(Resolution::Ready(answer, context)) => {
                let ctx = downcast_context(context)?;
                let result = inner.respond(&ctx, &answer);
                drop(ctx);
                result.inspect_err(|e| inner.report_send_failure(e))
            }
            Ok(Resolution::Pending) => Ok(()),
            Err(e) => {
                warn!(peer = %responder.peer(), error = %e, "Resolver rejected query");
                send_error(&responder, id, op_code, Some(&query), ResponseCode::ServFail)
            }
        }
    }
}

impl AnswerCallback for ServerInner {
    fn answer_delivered(&self, _reactor: &Reactor, answer: &Arc<Answer>, context: CallbackContext) {
        let ctx = match downcast_context(context) {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(error = %e, "Answer delivered with a foreign context");
                return;
            }
        };

        let result = self.respond(&ctx, answer);
        // Slot goes back to the pool before the failure is reported.
        drop(ctx);
        if let Err(e) = result {
            warn!(error = %e, "Deferred DNS response failed");
            self.report_send_failure(&e);
        }
    }
}

impl ServerInner {
    fn report_send_failure(&self, error: &DomainError) {
        if !matches!(error, DomainError::ResponseSend { .. }) {
            return;
        }
        self.send_failures.set(self.send_failures.get() + 1);
        if let Some(hook) = self.send_error_hook.borrow().as_ref() {
            hook(error);
        }
    }

    fn respond(&self, ctx: &PooledContext, answer: &Answer) -> Result<(), DomainError> {
        let Some(responder) = ctx.responder.as_ref() else {
            return Err(DomainError::ResponseSend {
                peer: "unknown".into(),
                reason: "query context without responder".into(),
            });
        };

        let mut header = ResponseHeader {
            id: ctx.id,
            op_code: ctx.op_code.unwrap_or(OpCode::Query),
            recursion_desired: ctx.recursion_desired,
            recursion_available: self.recursion_available,
            truncated: false,
        };
        let rcode = response_code(answer.status);

        let mut bytes =
            MessageBuilder::build_response(&header, ctx.query.as_ref(), rcode, &answer.records)?;

        if bytes.len() > ctx.max_response_size {
            warn!(
                peer = %responder.peer(),
                size = bytes.len(),
                limit = ctx.max_response_size,
                "Response truncated (TC bit set)"
            );
            header.truncated = true;
            bytes = MessageBuilder::build_response(&header, ctx.query.as_ref(), rcode, &[])?;
        }

        debug!(
            peer = %responder.peer(),
            status = %answer.status,
            records = answer.records.len(),
            "Sending DNS response"
        );

        responder.send(bytes).inspect_err(|e| {
            warn!(peer = %responder.peer(), error = %e, "Failed to send DNS response");
        })
    }
}

fn response_code(status: AnswerStatus) -> ResponseCode {
    match status {
        AnswerStatus::Ok | AnswerStatus::NoData => ResponseCode::NoError,
        AnswerStatus::NoDomain => ResponseCode::NXDomain,
        AnswerStatus::Refused => ResponseCode::Refused,
        AnswerStatus::Error | AnswerStatus::Timeout => ResponseCode::ServFail,
    }
}

fn downcast_context(context: CallbackContext) -> Result<Box<PooledContext>, DomainError> {
    context
        .downcast::<PooledContext>()
        .map_err(|_| DomainError::InvalidDnsResponse("unexpected callback context".into()))
}

fn send_error(
    responder: &Responder,
    id: u16,
    op_code: OpCode,
    query: Option<&hickory_proto::op::Query>,
    rcode: ResponseCode,
) -> Result<(), DomainError> {
    let bytes = MessageBuilder::build_error(id, op_code, query, rcode)?;
    responder.send(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_to_rcode() {
        assert_eq!(response_code(AnswerStatus::Ok), ResponseCode::NoError);
        assert_eq!(response_code(AnswerStatus::NoData), ResponseCode::NoError);
        assert_eq!(response_code(AnswerStatus::NoDomain), ResponseCode::NXDomain);
        assert_eq!(response_code(AnswerStatus::Refused), ResponseCode::Refused);
        assert_eq!(response_code(AnswerStatus::Error), ResponseCode::ServFail);
        assert_eq!(response_code(AnswerStatus::Timeout), ResponseCode::ServFail);
    }
}
