use super::record_type_map::RecordTypeMapper;
use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::{Name, RData, Record};
use relaydns_domain::{DomainError, Question, RecordData, ResourceRecord};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DnsResponse {
    pub id: u16,

    pub rcode: ResponseCode,

    pub truncated: bool,

    /// Answer-section records the domain model understands, in order.
    pub records: Vec<ResourceRecord>,

    pub message: Message,
}

impl DnsResponse {
    /// True when the response echoes `id` and exactly `question`.
    pub fn answers(&self, id: u16, question: &Question) -> bool {
        if self.id != id || self.message.queries().len() != 1 {
            return false;
        }
        let query = &self.message.queries()[0];
        RecordTypeMapper::from_hickory(query.query_type()) == Some(question.record_type)
            && query.name().to_ascii().to_ascii_lowercase() == question.query_name()
    }

    /// Whether any record has the type that was asked for (CNAMEs alone
    /// make a NODATA answer).
    pub fn has_records_for(&self, question: &Question) -> bool {
        self.records
            .iter()
            .any(|r| r.data.record_type() == Some(question.record_type))
    }
}

pub struct ResponseParser;

impl ResponseParser {
    pub fn parse(response_bytes: &[u8]) -> Result<DnsResponse, DomainError> {
        let message = Message::from_vec(response_bytes).map_err(|e| {
            DomainError::InvalidDnsResponse(format!("Failed to parse DNS response: {}", e))
        })?;

        if message.message_type() != MessageType::Response {
            return Err(DomainError::InvalidDnsResponse(
                "QR bit not set in upstream response".into(),
            ));
        }

        let rcode = message.response_code();
        let truncated = message.truncated();

        let records: Vec<ResourceRecord> = message
            .answers()
            .iter()
            .filter_map(Self::to_resource_record)
            .collect();

        debug!(
            id = message.id(),
            rcode = ?rcode,
            answers = message.answers().len(),
            kept = records.len(),
            truncated = truncated,
            "DNS response parsed"
        );

        Ok(DnsResponse {
            id: message.id(),
            rcode,
            truncated,
            records,
            message,
        })
    }

    /// Domain view of a hickory record; unsupported types yield `None`.
    pub fn to_resource_record(record: &Record) -> Option<ResourceRecord> {
        let data = match record.data() {
            RData::A(a) => RecordData::A(a.0),
            RData::AAAA(aaaa) => RecordData::Aaaa(aaaa.0),
            RData::PTR(ptr) => RecordData::Ptr(name_to_str(&ptr.0)),
            RData::NS(ns) => RecordData::Ns(name_to_str(&ns.0)),
            RData::CNAME(cname) => RecordData::Cname(name_to_str(&cname.0)),
            RData::MX(mx) => RecordData::Mx {
                preference: mx.preference(),
                exchange: name_to_str(mx.exchange()),
            },
            RData::SOA(soa) => RecordData::Soa {
                mname: name_to_str(soa.mname()),
                rname: name_to_str(soa.rname()),
                serial: soa.serial(),
                refresh: soa.refresh(),
                retry: soa.retry(),
                expire: soa.expire(),
                minimum: soa.minimum(),
            },
            RData::SRV(srv) => RecordData::Srv {
                priority: srv.priority(),
                weight: srv.weight(),
                port: srv.port(),
                target: name_to_str(srv.target()),
            },
            RData::TXT(txt) => RecordData::Txt(
                txt.txt_data()
                    .iter()
                    .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                    .collect(),
            ),
            other => {
                debug!(record_type = ?other.record_type(), "Skipping unsupported record");
                return None;
            }
        };

        Some(ResourceRecord::new(
            name_to_str(record.name()),
            record.ttl(),
            data,
        ))
    }

    pub fn rcode_to_status(rcode: ResponseCode) -> &'static str {
        match rcode {
            ResponseCode::NoError => "NOERROR",
            ResponseCode::NXDomain => "NXDOMAIN",
            ResponseCode::ServFail => "SERVFAIL",
            ResponseCode::Refused => "REFUSED",
            ResponseCode::NotImp => "NOTIMP",
            ResponseCode::FormErr => "FORMERR",
            _ => "UNKNOWN",
        }
    }
}

/// Lowercase presentation form without the trailing dot; the root stays `.`.
fn name_to_str(name: &Name) -> Arc<str> {
    let ascii = name.to_ascii().to_ascii_lowercase();
    match ascii.strip_suffix('.') {
        Some(stripped) if !stripped.is_empty() => Arc::from(stripped),
        _ => Arc::from("."),
    }
}
