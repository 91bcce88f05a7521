use super::RecordType;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// Typed payload of a resource record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ptr(Arc<str>),
    Ns(Arc<str>),
    /// Aliases returned alongside the requested type.
    Cname(Arc<str>),
    Mx {
        preference: u16,
        exchange: Arc<str>,
    },
    Soa {
        mname: Arc<str>,
        rname: Arc<str>,
        serial: u32,
        refresh: i32,
        retry: i32,
        expire: i32,
        minimum: u32,
    },
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: Arc<str>,
    },
    Txt(Vec<String>),
}

impl RecordData {
    /// Query type this payload answers, `None` for CNAME.
    pub fn record_type(&self) -> Option<RecordType> {
        match self {
            RecordData::A(_) => Some(RecordType::A),
            RecordData::Aaaa(_) => Some(RecordType::AAAA),
            RecordData::Ptr(_) => Some(RecordType::PTR),
            RecordData::Ns(_) => Some(RecordType::NS),
            RecordData::Cname(_) => None,
            RecordData::Mx { .. } => Some(RecordType::MX),
            RecordData::Soa { .. } => Some(RecordType::SOA),
            RecordData::Srv { .. } => Some(RecordType::SRV),
            RecordData::Txt(_) => Some(RecordType::TXT),
        }
    }
}

impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordData::A(ip) => write!(f, "{ip}"),
            RecordData::Aaaa(ip) => write!(f, "{ip}"),
            RecordData::Ptr(name) | RecordData::Ns(name) | RecordData::Cname(name) => {
                write!(f, "{name}")
            }
            RecordData::Mx {
                preference,
                exchange,
            } => write!(f, "{preference} {exchange}"),
            RecordData::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{mname} {rname} {serial} {refresh} {retry} {expire} {minimum}"
            ),
            RecordData::Srv {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{priority} {weight} {port} {target}"),
            RecordData::Txt(parts) => {
                let quoted: Vec<String> = parts.iter().map(|p| format!("\"{p}\"")).collect();
                f.write_str(&quoted.join(" "))
            }
        }
    }
}

/// DNS resource record as returned in the answer section of an upstream
/// response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// Owner name
    pub name: Arc<str>,
    /// Time to live in seconds
    pub ttl: u32,
    pub data: RecordData,
}

impl ResourceRecord {
    pub fn new(name: impl Into<Arc<str>>, ttl: u32, data: RecordData) -> Self {
        Self {
            name: name.into(),
            ttl,
            data,
        }
    }

    /// Check if record is expired based on elapsed seconds since it was received
    pub fn is_expired(&self, elapsed_secs: u32) -> bool {
        elapsed_secs >= self.ttl
    }

    /// Get remaining TTL
    pub fn remaining_ttl(&self, elapsed_secs: u32) -> u32 {
        self.ttl.saturating_sub(elapsed_secs)
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let type_str = self.data.record_type().map_or("CNAME", |t| t.as_str());
        write!(f, "{} {} IN {} {}", self.name, self.ttl, type_str, self.data)
    }
}
