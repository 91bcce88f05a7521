#![allow(dead_code)]
use relaydns_application::{AnswerCallback, CallbackContext};
use relaydns_domain::{Answer, RecordData, ResourceRecord};
use relaydns_infrastructure::dns::ResolverSettings;
use relaydns_reactor::Reactor;
use std::cell::RefCell;
use std::net::{Ipv4Addr, SocketAddr};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

/// Fake upstream addresses; scripted transports never dial them.
pub fn upstream(n: u8) -> SocketAddr {
    SocketAddr::from(([192, 0, 2, n], 53))
}

/// Settings against `servers` with a 1 s timeout.
pub fn settings(servers: &[SocketAddr], retries: u32) -> ResolverSettings {
    ResolverSettings {
        servers: servers.to_vec(),
        retries,
        timeout: Duration::from_secs(1),
        negative_ttl: 60,
        cache_max_entries: 128,
        max_ttl: 3600,
        always_tcp: false,
    }
}

pub fn a_record(name: &str, ip: [u8; 4], ttl: u32) -> ResourceRecord {
    ResourceRecord::new(
        name,
        ttl,
        RecordData::A(Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3])),
    )
}

pub fn example_a(ttl: u32) -> ResourceRecord {
    a_record("example.com", [93, 184, 216, 34], ttl)
}

/// Records every delivery together with its `u32` context.
#[derive(Default)]
pub struct RecordingCallback {
    deliveries: RefCell<Vec<(Arc<Answer>, u32)>>,
}

impl RecordingCallback {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.deliveries.borrow().len()
    }

    pub fn deliveries(&self) -> Vec<(Arc<Answer>, u32)> {
        self.deliveries.borrow().clone()
    }

    pub fn last(&self) -> Option<Arc<Answer>> {
        self.deliveries.borrow().last().map(|(a, _)| Arc::clone(a))
    }
}

impl AnswerCallback for RecordingCallback {
    fn answer_delivered(&self, _reactor: &Reactor, answer: &Arc<Answer>, context: CallbackContext) {
        let tag = context.downcast::<u32>().map(|t| *t).unwrap_or(u32::MAX);
        self.deliveries.borrow_mut().push((Arc::clone(answer), tag));
    }
}

/// Give spawned reactor tasks a chance to run. Under paused time this also
/// advances the clock by `ms`.
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
