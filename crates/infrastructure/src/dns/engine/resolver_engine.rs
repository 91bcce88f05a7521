use super::in_flight::{AttemptFailure, InFlight, Waiter};
use super::settings::ResolverSettings;
use crate::dns::cache::AnswerCache;
use crate::dns::forwarding::{MessageBuilder, ResponseParser};
use bytes::Bytes;
use hickory_proto::op::ResponseCode;
use relaydns_application::{
    AnswerCallback, CallbackContext, Resolution, ResolveFlags, Resolver, TransportProtocol,
    UpstreamTransport,
};
use relaydns_domain::{Answer, AnswerStatus, DomainError, Question, RecordType};
use relaydns_reactor::{Reactor, Runnable};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::net::{IpAddr, SocketAddr};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters exposed for observability and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub upstream_queries: u64,
    pub cache_hits: u64,
    /// Requests attached to an existing in-flight entry.
    pub coalesced: u64,
    pub timeouts: u64,
    pub in_flight: usize,
    pub cached: usize,
}

/// Asynchronous forwarding resolver living on one reactor thread.
///
/// Cloning yields another handle to the same engine. All methods must be
/// called on the reactor thread the engine was started on.
#[derive(Clone)]
pub struct ResolverEngine {
    inner: Rc<EngineInner>,
}

struct EngineInner {
    settings: ResolverSettings,
    transport: Rc<dyn UpstreamTransport>,
    state: RefCell<EngineState>,
}

struct EngineState {
    reactor: Option<Reactor>,
    cache: AnswerCache,
    in_flight: FxHashMap<Question, InFlight>,
    next_server: usize,
    next_generation: u64,
    stats: EngineStats,
}

/// Snapshot of the attempt a completion belongs to.
struct Attempt {
    reactor: Reactor,
    server: SocketAddr,
    protocol: TransportProtocol,
    message_id: u16,
}

impl ResolverEngine {
    pub fn new(settings: ResolverSettings, transport: Rc<dyn UpstreamTransport>) -> Self {
        let cache = AnswerCache::new(settings.cache_max_entries, settings.max_ttl);
        Self {
            inner: Rc::new(EngineInner {
                settings,
                transport,
                state: RefCell::new(EngineState {
                    reactor: None,
                    cache,
                    in_flight: FxHashMap::default(),
                    next_server: 0,
                    next_generation: 0,
                    stats: EngineStats::default(),
                }),
            }),
        }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.inner.settings
    }

    pub fn is_started(&self) -> bool {
        self.inner.state.borrow().reactor.is_some()
    }

    /// Resolve `question` from cache, by joining an in-flight query, or by
    /// starting a new upstream query.
    pub fn resolve(
        &self,
        question: Question,
        caller: Rc<dyn AnswerCallback>,
        context: CallbackContext,
        flags: ResolveFlags,
    ) -> Result<Resolution, DomainError> {
        let reactor = self.reactor()?;

        {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;

            if !flags.bypass_cache {
                if let Some(answer) = state.cache.get(&question) {
                    state.stats.cache_hits += 1;
                    debug!(question = %question, status = %answer.status, "Cache hit");
                    return Ok(Resolution::Ready(answer, context));
                }
            }

            if flags.cache_only {
                debug!(question = %question, "Cache miss with upstream queries disabled");
                let refused = Answer::failure(
                    AnswerStatus::Refused,
                    u16::from(ResponseCode::Refused),
                    question,
                );
                return Ok(Resolution::Ready(Arc::new(refused), context));
            }

            if let Some(entry) = state.in_flight.get_mut(&question) {
                entry.waiters.push(Waiter { caller, context });
                state.stats.coalesced += 1;
                debug!(
                    question = %question,
                    waiters = entry.waiters.len(),
                    "Joined in-flight query"
                );
                return Ok(Resolution::Pending);
            }

            let (message_id, query) = MessageBuilder::build_query(&question)?;
            let servers = self.inner.settings.servers.len();
            let server_idx = state.next_server % servers;
            state.next_server = (server_idx + 1) % servers;

            let mut entry = InFlight::new(
                Bytes::from(query),
                message_id,
                server_idx,
                self.initial_protocol(),
            );
            entry.waiters.push(Waiter { caller, context });
            state.in_flight.insert(question.clone(), entry);
        }

        self.send_attempt(&reactor, &question);
        Ok(Resolution::Pending)
    }

    pub fn resolve_a(
        &self,
        name: &str,
        caller: Rc<dyn AnswerCallback>,
        context: CallbackContext,
    ) -> Result<Resolution, DomainError> {
        self.resolve_name(RecordType::A, name, caller, context)
    }

    pub fn resolve_aaaa(
        &self,
        name: &str,
        caller: Rc<dyn AnswerCallback>,
        context: CallbackContext,
    ) -> Result<Resolution, DomainError> {
        self.resolve_name(RecordType::AAAA, name, caller, context)
    }

    /// Reverse lookup of `ip`.
    pub fn resolve_ptr(
        &self,
        ip: IpAddr,
        caller: Rc<dyn AnswerCallback>,
        context: CallbackContext,
    ) -> Result<Resolution, DomainError> {
        self.resolve(Question::reverse(ip), caller, context, ResolveFlags::default())
    }

    pub fn resolve_ns(
        &self,
        name: &str,
        caller: Rc<dyn AnswerCallback>,
        context: CallbackContext,
    ) -> Result<Resolution, DomainError> {
        self.resolve_name(RecordType::NS, name, caller, context)
    }

    pub fn resolve_mx(
        &self,
        name: &str,
        caller: Rc<dyn AnswerCallback>,
        context: CallbackContext,
    ) -> Result<Resolution, DomainError> {
        self.resolve_name(RecordType::MX, name, caller, context)
    }

    pub fn resolve_soa(
        &self,
        name: &str,
        caller: Rc<dyn AnswerCallback>,
        context: CallbackContext,
    ) -> Result<Resolution, DomainError> {
        self.resolve_name(RecordType::SOA, name, caller, context)
    }

    pub fn resolve_srv(
        &self,
        name: &str,
        caller: Rc<dyn AnswerCallback>,
        context: CallbackContext,
    ) -> Result<Resolution, DomainError> {
        self.resolve_name(RecordType::SRV, name, caller, context)
    }

    pub fn resolve_txt(
        &self,
        name: &str,
        caller: Rc<dyn AnswerCallback>,
        context: CallbackContext,
    ) -> Result<Resolution, DomainError> {
        self.resolve_name(RecordType::TXT, name, caller, context)
    }

    fn resolve_name(
        &self,
        record_type: RecordType,
        name: &str,
        caller: Rc<dyn AnswerCallback>,
        context: CallbackContext,
    ) -> Result<Resolution, DomainError> {
        let question = Question::new(record_type, name)?;
        self.resolve(question, caller, context, ResolveFlags::default())
    }

    /// Remove every waiter registered by `caller`; the upstream attempts
    /// keep running. Returns how many waiters were removed.
    pub fn cancel(&self, caller: &Rc<dyn AnswerCallback>) -> usize {
        let removed: Vec<Waiter> = {
            let mut state = self.inner.state.borrow_mut();
            let mut removed = Vec::new();
            for entry in state.in_flight.values_mut() {
                let mut i = 0;
                while i < entry.waiters.len() {
                    if entry.waiters[i].belongs_to(caller) {
                        removed.push(entry.waiters.remove(i));
                    } else {
                        i += 1;
                    }
                }
            }
            removed
        };

        let count = removed.len();
        if count > 0 {
            debug!(removed = count, "Cancelled waiters");
        }
        // Contexts are dropped outside the state borrow.
        drop(removed);
        count
    }

    pub fn lookup_cached(&self, question: &Question) -> Option<Arc<Answer>> {
        let mut state = self.inner.state.borrow_mut();
        let hit = state.cache.get(question);
        if hit.is_some() {
            state.stats.cache_hits += 1;
        }
        hit
    }

    /// Seconds left before the cached answer for `question` expires.
    pub fn cached_ttl(&self, question: &Question) -> Option<u32> {
        self.inner.state.borrow().cache.remaining_ttl(question)
    }

    pub fn stats(&self) -> EngineStats {
        let state = self.inner.state.borrow();
        EngineStats {
            in_flight: state.in_flight.len(),
            cached: state.cache.len(),
            ..state.stats
        }
    }

    fn reactor(&self) -> Result<Reactor, DomainError> {
        self.inner
            .state
            .borrow()
            .reactor
            .clone()
            .ok_or(DomainError::NotStarted)
    }

    fn initial_protocol(&self) -> TransportProtocol {
        if self.inner.settings.always_tcp {
            TransportProtocol::Tcp
        } else {
            TransportProtocol::Udp
        }
    }

    /// Launch the current attempt of `question` and arm its timeout.
    fn send_attempt(&self, reactor: &Reactor, question: &Question) {
        let (server, protocol, query, generation, retries_done) = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            let Some(entry) = state.in_flight.get_mut(question) else {
                return;
            };
            state.next_generation += 1;
            state.stats.upstream_queries += 1;

            entry.disarm();
            entry.generation = state.next_generation;
            (
                self.inner.settings.servers[entry.server_idx],
                entry.protocol,
                entry.query.clone(),
                entry.generation,
                entry.retries_done,
            )
        };

        debug!(
            question = %question,
            server = %server,
            protocol = %protocol,
            retry = retries_done,
            "Sending upstream query"
        );

        let engine = Rc::downgrade(&self.inner);
        let transport = Rc::clone(&self.inner.transport);
        let key = question.clone();
        let task = reactor.spawn(async move {
            let result = transport.exchange(server, protocol, query).await;
            if let Some(inner) = engine.upgrade() {
                ResolverEngine { inner }.on_response(&key, generation, result);
            }
        });

        let engine = Rc::downgrade(&self.inner);
        let key = question.clone();
        let timer = reactor.submit_timer(self.inner.settings.timeout, move |_| {
            if let Some(inner) = engine.upgrade() {
                ResolverEngine { inner }.on_timeout(&key, generation);
            }
        });

        let mut state = self.inner.state.borrow_mut();
        match state.in_flight.get_mut(question) {
            Some(entry) if entry.generation == generation => {
                entry.task = Some(task);
                entry.timer = Some(timer);
            }
            _ => {
                task.abort();
                timer.cancel();
            }
        }
    }

    /// Claim the completion of attempt `generation`; `None` when stale.
    fn claim_attempt(&self, question: &Question, generation: u64) -> Option<Attempt> {
        let mut guard = self.inner.state.borrow_mut();
        let state = &mut *guard;
        let reactor = state.reactor.clone()?;
        let entry = state.in_flight.get_mut(question)?;
        if entry.generation != generation {
            return None;
        }
        entry.task = None;
        if let Some(timer) = entry.timer.take() {
            timer.cancel();
        }
        Some(Attempt {
            reactor,
            server: self.inner.settings.servers[entry.server_idx],
            protocol: entry.protocol,
            message_id: entry.message_id,
        })
    }

    fn on_response(
        &self,
        question: &Question,
        generation: u64,
        result: Result<Bytes, DomainError>,
    ) {
        let Some(attempt) = self.claim_attempt(question, generation) else {
            return;
        };

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(question = %question, server = %attempt.server, error = %e, "Upstream exchange failed");
                return self.attempt_failed(&attempt.reactor, question, AttemptFailure::Error { rcode: 0 });
            }
        };

        let response = match ResponseParser::parse(&bytes) {
            Ok(response) => response,
            Err(e) => {
                warn!(question = %question, server = %attempt.server, error = %e, "Undecodable upstream response");
                return self.attempt_failed(&attempt.reactor, question, AttemptFailure::Error { rcode: 0 });
            }
        };

        if !response.answers(attempt.message_id, question) {
            warn!(
                question = %question,
                server = %attempt.server,
                id = response.id,
                "Upstream response does not match the query"
            );
            return self.attempt_failed(&attempt.reactor, question, AttemptFailure::Error { rcode: 0 });
        }

        if response.truncated && attempt.protocol == TransportProtocol::Udp {
            debug!(question = %question, server = %attempt.server, "Response truncated (TC bit), retrying via TCP");
            if let Some(entry) = self.inner.state.borrow_mut().in_flight.get_mut(question) {
                entry.protocol = TransportProtocol::Tcp;
            }
            return self.send_attempt(&attempt.reactor, question);
        }

        let negative_ttl = self.inner.settings.negative_ttl;
        let rcode = u16::from(response.rcode);
        match response.rcode {
            ResponseCode::NoError => {
                let status = if response.has_records_for(question) {
                    AnswerStatus::Ok
                } else {
                    AnswerStatus::NoData
                };
                let answer =
                    Answer::from_records(status, rcode, question.clone(), response.records, negative_ttl);
                self.complete(&attempt.reactor, question, answer);
            }
            ResponseCode::NXDomain => {
                let answer = Answer::from_records(
                    AnswerStatus::NoDomain,
                    rcode,
                    question.clone(),
                    response.records,
                    negative_ttl,
                );
                self.complete(&attempt.reactor, question, answer);
            }
            ResponseCode::Refused => {
                debug!(question = %question, server = %attempt.server, "Upstream refused the query");
                self.attempt_failed(&attempt.reactor, question, AttemptFailure::Refused);
            }
            other => {
                debug!(
                    question = %question,
                    server = %attempt.server,
                    rcode = ResponseParser::rcode_to_status(other),
                    "Upstream server error"
                );
                self.attempt_failed(&attempt.reactor, question, AttemptFailure::Error { rcode });
            }
        }
    }

    fn on_timeout(&self, question: &Question, generation: u64) {
        let reactor = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            let Some(reactor) = state.reactor.clone() else {
                return;
            };
            let Some(entry) = state.in_flight.get_mut(question) else {
                return;
            };
            if entry.generation != generation {
                return;
            }
            entry.timer = None;
            if let Some(task) = entry.task.take() {
                task.abort();
            }
            state.stats.timeouts += 1;
            reactor
        };

        debug!(question = %question, "Upstream query timed out");
        self.attempt_failed(&reactor, question, AttemptFailure::Timeout);
    }

    /// Retry against the next server, or give up once the budget is spent.
    fn attempt_failed(&self, reactor: &Reactor, question: &Question, failure: AttemptFailure) {
        let retry = {
            let mut state = self.inner.state.borrow_mut();
            let Some(entry) = state.in_flight.get_mut(question) else {
                return;
            };
            if entry.retries_done < self.inner.settings.retries {
                entry.retries_done += 1;
                entry.server_idx = (entry.server_idx + 1) % self.inner.settings.servers.len();
                entry.protocol = self.initial_protocol();
                Some(entry.retries_done)
            } else {
                None
            }
        };

        match retry {
            Some(retry) => {
                debug!(question = %question, retry, failure = ?failure, "Retrying against next server");
                self.send_attempt(reactor, question);
            }
            None => {
                let (status, rcode) = failure.terminal();
                warn!(question = %question, status = %status, "Giving up on upstream query");
                self.complete(reactor, question, Answer::failure(status, rcode, question.clone()));
            }
        }
    }

    /// Cache `answer`, drop the in-flight entry, then notify every waiter.
    fn complete(&self, reactor: &Reactor, question: &Question, answer: Answer) {
        let answer = Arc::new(answer);
        let waiters = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            let Some(mut entry) = state.in_flight.remove(question) else {
                return;
            };
            entry.disarm();
            state.cache.insert(Arc::clone(&answer));
            std::mem::take(&mut entry.waiters)
        };

        debug!(
            question = %question,
            status = %answer.status,
            records = answer.records.len(),
            waiters = waiters.len(),
            "Answer ready"
        );

        for waiter in waiters {
            waiter
                .caller
                .answer_delivered(reactor, &answer, waiter.context);
        }
    }
}

impl Runnable for ResolverEngine {
    fn start(&self, reactor: &Reactor) -> Result<(), DomainError> {
        let settings = &self.inner.settings;
        if settings.servers.is_empty() {
            return Err(DomainError::StartFailed(
                "resolver engine has no upstream servers".into(),
            ));
        }

        self.inner.state.borrow_mut().reactor = Some(reactor.clone());
        info!(
            servers = ?settings.servers,
            retries = settings.retries,
            timeout_ms = settings.timeout.as_millis() as u64,
            always_tcp = settings.always_tcp,
            "Resolver engine started"
        );
        Ok(())
    }

    fn stop(&self, reactor: &Reactor) {
        let entries: Vec<(Question, InFlight)> = {
            let mut state = self.inner.state.borrow_mut();
            state.reactor = None;
            state.cache.clear();
            state.in_flight.drain().collect()
        };

        let pending = entries.len();
        for (question, mut entry) in entries {
            entry.disarm();
            let answer = Arc::new(Answer::failure(AnswerStatus::Error, 0, question));
            for waiter in std::mem::take(&mut entry.waiters) {
                waiter
                    .caller
                    .answer_delivered(reactor, &answer, waiter.context);
            }
        }

        info!(abandoned = pending, "Resolver engine stopped");
    }

    fn label(&self) -> &'static str {
        "resolver-engine"
    }
}

impl Resolver for ResolverEngine {
    fn resolve(
        &self,
        question: Question,
        caller: Rc<dyn AnswerCallback>,
        context: CallbackContext,
        flags: ResolveFlags,
    ) -> Result<Resolution, DomainError> {
        ResolverEngine::resolve(self, question, caller, context, flags)
    }

    fn cancel(&self, caller: &Rc<dyn AnswerCallback>) -> usize {
        ResolverEngine::cancel(self, caller)
    }

    fn lookup_cached(&self, question: &Question) -> Option<Arc<Answer>> {
        ResolverEngine::lookup_cached(self, question)
    }
}
