#![allow(dead_code)]
use async_trait::async_trait;
use bytes::Bytes;
use hickory_proto::op::{Message, MessageType, ResponseCode};
use relaydns_application::{TransportProtocol, UpstreamTransport};
use relaydns_domain::{DomainError, ResourceRecord};
use relaydns_infrastructure::dns::forwarding::MessageBuilder;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the fake upstream answers one exchange.
#[derive(Debug, Clone)]
pub enum Reply {
    /// NOERROR carrying these answer records.
    Records(Vec<ResourceRecord>),
    /// Empty response with this rcode.
    Rcode(ResponseCode),
    /// Empty NOERROR response with TC set.
    Truncated,
    /// Valid response with an ID that does not match the query.
    WrongId,
    Garbage,
    /// Transport-level I/O error.
    Fail,
    /// Never answers.
    Hang,
}

#[derive(Debug, Clone)]
struct Script {
    reply: Reply,
    delay: Duration,
}

/// One exchange as seen by the fake upstream.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub server: SocketAddr,
    pub protocol: TransportProtocol,
    pub id: u16,
    pub name: String,
}

/// In-memory upstream answering from a script.
///
/// Queued replies are consumed in order; once the queue is empty every
/// exchange gets the fallback. Clones share the script and the log, so a
/// test can keep one while the engine owns another.
#[derive(Clone)]
pub struct ScriptedTransport {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    fallback: Arc<Mutex<Script>>,
    log: Arc<Mutex<Vec<Exchange>>>,
}

impl ScriptedTransport {
    pub fn new(fallback: Reply) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(Script {
                reply: fallback,
                delay: Duration::ZERO,
            })),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, reply: Reply) -> &Self {
        self.push_delayed(reply, Duration::ZERO)
    }

    pub fn push_delayed(&self, reply: Reply, delay: Duration) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script { reply, delay });
        self
    }

    pub fn set_fallback(&self, reply: Reply, delay: Duration) {
        *self.fallback.lock().unwrap() = Script { reply, delay };
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.log.lock().unwrap().clone()
    }

    pub fn exchange_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    fn next_script(&self) -> Script {
        self.scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().unwrap().clone())
    }
}

#[async_trait(?Send)]
impl UpstreamTransport for ScriptedTransport {
    async fn exchange(
        &self,
        server: SocketAddr,
        protocol: TransportProtocol,
        message: Bytes,
    ) -> Result<Bytes, DomainError> {
        let request = Message::from_vec(&message)
            .map_err(|e| DomainError::InvalidDnsResponse(e.to_string()))?;
        self.log.lock().unwrap().push(Exchange {
            server,
            protocol,
            id: request.id(),
            name: request
                .queries()
                .first()
                .map(|q| q.name().to_ascii())
                .unwrap_or_default(),
        });

        let script = self.next_script();
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }

        match script.reply {
            Reply::Records(records) => Ok(response(&request, ResponseCode::NoError, &records, false)),
            Reply::Rcode(rcode) => Ok(response(&request, rcode, &[], false)),
            Reply::Truncated => Ok(response(&request, ResponseCode::NoError, &[], true)),
            Reply::WrongId => {
                let mut request = request;
                request.set_id(request.id().wrapping_add(1));
                Ok(response(&request, ResponseCode::NoError, &[], false))
            }
            Reply::Garbage => Ok(Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef])),
            Reply::Fail => Err(DomainError::IoError("connection refused".into())),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Response to `request` echoing its ID and question.
pub fn response(
    request: &Message,
    rcode: ResponseCode,
    records: &[ResourceRecord],
    truncated: bool,
) -> Bytes {
    let mut message = Message::new();
    message
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_recursion_desired(request.recursion_desired())
        .set_recursion_available(true)
        .set_truncated(truncated)
        .set_response_code(rcode);
    for query in request.queries() {
        message.add_query(query.clone());
    }
    for record in records {
        message.add_answer(MessageBuilder::to_hickory_record(record).unwrap());
    }
    Bytes::from(message.to_vec().unwrap())
}
