//! DNS Message Builder
//!
//! Wire-format construction with `hickory-proto`: upstream queries for the
//! resolver engine and responses for the caching server.

use super::record_type_map::RecordTypeMapper;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, CNAME, MX, NS, PTR, SOA, SRV, TXT};
use hickory_proto::rr::{Name, RData, Record};
use relaydns_domain::{DomainError, Question, RecordData, ResourceRecord};

/// Header fields of a response, echoed from the request.
#[derive(Debug, Clone, Copy)]
pub struct ResponseHeader {
    pub id: u16,
    pub op_code: OpCode,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub truncated: bool,
}

pub struct MessageBuilder;

impl MessageBuilder {
    /// Build a recursive query for `question` with a random ID.
    pub fn build_query(question: &Question) -> Result<(u16, Vec<u8>), DomainError> {
        let id = fastrand::u16(..);
        let bytes = Self::build_query_with_id(question, id)?;
        Ok((id, bytes))
    }

    /// Single-question query with the RD flag set.
    pub fn build_query_with_id(question: &Question, id: u16) -> Result<Vec<u8>, DomainError> {
        let name = parse_name(&question.query_name())?;
        let query_type = RecordTypeMapper::to_hickory(&question.record_type);

        let mut message = Message::new();
        message
            .set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true);
        message.add_query(Query::query(name, query_type));

        Self::serialize_message(&message)
    }

    /// Response carrying `records` in the answer section only.
    ///
    /// A truncated header drops the records, the client retries over TCP.
    pub fn build_response(
        header: &ResponseHeader,
        query: Option<&Query>,
        response_code: ResponseCode,
        records: &[ResourceRecord],
    ) -> Result<Vec<u8>, DomainError> {
        let mut message = Message::new();
        message
            .set_id(header.id)
            .set_message_type(MessageType::Response)
            .set_op_code(header.op_code)
            .set_recursion_desired(header.recursion_desired)
            .set_recursion_available(header.recursion_available)
            .set_truncated(header.truncated)
            .set_response_code(response_code);

        if let Some(query) = query {
            message.add_query(query.clone());
        }

        if !header.truncated {
            for record in records {
                message.add_answer(Self::to_hickory_record(record)?);
            }
        }

        Self::serialize_message(&message)
    }

    /// Header-only error response (FORMERR, NOTIMP, SERVFAIL...).
    pub fn build_error(
        id: u16,
        op_code: OpCode,
        query: Option<&Query>,
        response_code: ResponseCode,
    ) -> Result<Vec<u8>, DomainError> {
        let mut message = Message::error_msg(id, op_code, response_code);
        if let Some(query) = query {
            message.add_query(query.clone());
        }
        Self::serialize_message(&message)
    }

    pub fn to_hickory_record(record: &ResourceRecord) -> Result<Record, DomainError> {
        let name = parse_name(&record.name)?;
        let rdata = match &record.data {
            RecordData::A(ip) => RData::A(A(*ip)),
            RecordData::Aaaa(ip) => RData::AAAA(AAAA(*ip)),
            RecordData::Ptr(target) => RData::PTR(PTR(parse_name(target)?)),
            RecordData::Ns(target) => RData::NS(NS(parse_name(target)?)),
            RecordData::Cname(target) => RData::CNAME(CNAME(parse_name(target)?)),
            RecordData::Mx {
                preference,
                exchange,
            } => RData::MX(MX::new(*preference, parse_name(exchange)?)),
            RecordData::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => RData::SOA(SOA::new(
                parse_name(mname)?,
                parse_name(rname)?,
                *serial,
                *refresh,
                *retry,
                *expire,
                *minimum,
            )),
            RecordData::Srv {
                priority,
                weight,
                port,
                target,
            } => RData::SRV(SRV::new(*priority, *weight, *port, parse_name(target)?)),
            RecordData::Txt(strings) => RData::TXT(TXT::new(strings.clone())),
        };
        Ok(Record::from_rdata(name, record.ttl, rdata))
    }

    fn serialize_message(message: &Message) -> Result<Vec<u8>, DomainError> {
        message.to_vec().map_err(|e| {
            DomainError::InvalidDnsResponse(format!("Failed to serialize DNS message: {}", e))
        })
    }
}

/// Fully qualified name from a stored name (with or without trailing dot).
fn parse_name(name: &str) -> Result<Name, DomainError> {
    if name.is_empty() || name == "." {
        return Ok(Name::root());
    }
    let fqdn = if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    };
    Name::from_ascii(&fqdn)
        .map_err(|e| DomainError::InvalidDomainName(format!("Invalid domain '{}': {}", name, e)))
}
