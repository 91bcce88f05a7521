use super::{Question, RecordData, ResourceRecord};
use std::fmt;
use std::net::IpAddr;

/// Outcome class of a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnswerStatus {
    /// Upstream answered with at least one record.
    Ok,
    /// Name exists but has no record of the requested type.
    NoData,
    /// NXDOMAIN.
    NoDomain,
    /// Every upstream refused the query.
    Refused,
    /// Terminal failure other than a timeout (garbage, SERVFAIL, I/O).
    Error,
    /// No upstream answered within the retry budget.
    Timeout,
}

impl AnswerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerStatus::Ok => "OK",
            AnswerStatus::NoData => "NODATA",
            AnswerStatus::NoDomain => "NODOMAIN",
            AnswerStatus::Refused => "REFUSED",
            AnswerStatus::Error => "ERROR",
            AnswerStatus::Timeout => "TIMEOUT",
        }
    }

    /// Statuses that came from an actual upstream answer and may be cached.
    pub fn is_cacheable(&self) -> bool {
        matches!(
            self,
            AnswerStatus::Ok | AnswerStatus::NoData | AnswerStatus::NoDomain
        )
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, AnswerStatus::NoData | AnswerStatus::NoDomain)
    }
}

impl fmt::Display for AnswerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of resolving a [`Question`].
///
/// Built once by the resolver engine and then shared read-only as
/// `Arc<Answer>` between the cache and every waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub status: AnswerStatus,
    /// DNS response code as received (0 when no response was received).
    pub rcode: u16,
    pub question: Question,
    pub records: Vec<ResourceRecord>,
    /// Lifetime in seconds: minimum record TTL. Negative answers never
    /// outlive the negative TTL, even when they carry aliases.
    pub ttl: u32,
}

impl Answer {
    /// Answer from an upstream response. `ttl` falls back to `negative_ttl`
    /// when `records` is empty and is capped by it for negative statuses.
    pub fn from_records(
        status: AnswerStatus,
        rcode: u16,
        question: Question,
        records: Vec<ResourceRecord>,
        negative_ttl: u32,
    ) -> Self {
        let min_ttl = records.iter().map(|r| r.ttl).min();
        let ttl = match min_ttl {
            Some(ttl) if status.is_negative() => ttl.min(negative_ttl),
            Some(ttl) => ttl,
            None => negative_ttl,
        };
        Self {
            status,
            rcode,
            question,
            records,
            ttl,
        }
    }

    /// Terminal failure without records; never cached.
    pub fn failure(status: AnswerStatus, rcode: u16, question: Question) -> Self {
        Self {
            status,
            rcode,
            question,
            records: Vec::new(),
            ttl: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AnswerStatus::Ok
    }

    /// A/AAAA addresses in answer order.
    pub fn addresses(&self) -> Vec<IpAddr> {
        self.records
            .iter()
            .filter_map(|r| match r.data {
                RecordData::A(ip) => Some(IpAddr::V4(ip)),
                RecordData::Aaaa(ip) => Some(IpAddr::V6(ip)),
                _ => None,
            })
            .collect()
    }
}
