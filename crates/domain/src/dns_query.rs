use super::{DomainError, RecordType};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// What a question asks about: a domain name, or an address for reverse
/// (PTR) lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QuestionTarget {
    Name(Arc<str>),
    Address(IpAddr),
}

/// DNS question (record type + normalized target).
///
/// Two questions are the same in-flight unit iff they compare equal, so the
/// target is always stored normalized: lowercase, without the trailing dot,
/// and complete reverse names (`4.3.2.1.in-addr.arpa`) folded into their
/// address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Question {
    pub record_type: RecordType,
    pub target: QuestionTarget,
}

impl Question {
    /// Build a question from presentation input.
    ///
    /// For `PTR`, an IP literal or a complete reverse name both become
    /// [`QuestionTarget::Address`].
    pub fn new(record_type: RecordType, name: &str) -> Result<Self, DomainError> {
        if record_type == RecordType::PTR {
            if let Ok(ip) = name.trim().parse::<IpAddr>() {
                return Ok(Self::reverse(ip));
            }
        }

        let normalized = normalize_name(name)?;
        if record_type == RecordType::PTR {
            if let Some(ip) = parse_reverse_name(&normalized) {
                return Ok(Self::reverse(ip));
            }
        }

        Ok(Self {
            record_type,
            target: QuestionTarget::Name(normalized),
        })
    }

    /// Reverse lookup question for `ip`.
    pub fn reverse(ip: IpAddr) -> Self {
        Self {
            record_type: RecordType::PTR,
            target: QuestionTarget::Address(ip),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match &self.target {
            QuestionTarget::Name(name) => Some(name),
            QuestionTarget::Address(_) => None,
        }
    }

    /// Fully qualified name to put on the wire (with trailing dot).
    pub fn query_name(&self) -> String {
        match &self.target {
            QuestionTarget::Name(name) if &**name == "." => ".".to_string(),
            QuestionTarget::Name(name) => format!("{name}."),
            QuestionTarget::Address(ip) => reverse_name(ip),
        }
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            QuestionTarget::Name(name) => write!(f, "{} {}", self.record_type, name),
            QuestionTarget::Address(ip) => write!(f, "{} {}", self.record_type, ip),
        }
    }
}

/// Lowercase, trim and validate a domain name. The root is kept as `"."`.
pub fn normalize_name(name: &str) -> Result<Arc<str>, DomainError> {
    let trimmed = name.trim();
    if trimmed == "." {
        return Ok(Arc::from("."));
    }

    let without_dot = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if without_dot.is_empty() {
        return Err(DomainError::InvalidDomainName(
            "domain name cannot be empty".to_string(),
        ));
    }
    if without_dot.len() > MAX_NAME_LEN {
        return Err(DomainError::InvalidDomainName(format!(
            "domain name exceeds {MAX_NAME_LEN} characters"
        )));
    }

    for label in without_dot.split('.') {
        if label.is_empty() {
            return Err(DomainError::InvalidDomainName(format!(
                "empty label in '{trimmed}'"
            )));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(DomainError::InvalidDomainName(format!(
                "label '{label}' exceeds {MAX_LABEL_LEN} characters"
            )));
        }
        if label.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(DomainError::InvalidDomainName(format!(
                "invalid character in '{trimmed}'"
            )));
        }
    }

    Ok(Arc::from(without_dot.to_ascii_lowercase().as_str()))
}

/// `in-addr.arpa` / `ip6.arpa` name for `ip`, with trailing dot.
pub fn reverse_name(ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{d}.{c}.{b}.{a}.in-addr.arpa.")
        }
        IpAddr::V6(v6) => {
            let mut name = String::with_capacity(73);
            for byte in v6.octets().iter().rev() {
                name.push_str(&format!("{:x}.{:x}.", byte & 0x0f, byte >> 4));
            }
            name.push_str("ip6.arpa.");
            name
        }
    }
}

/// Inverse of [`reverse_name`] for complete reverse names (normalized, no
/// trailing dot). Partial zones such as `2.0.192.in-addr.arpa` yield `None`.
pub fn parse_reverse_name(name: &str) -> Option<IpAddr> {
    if let Some(prefix) = name.strip_suffix(".in-addr.arpa") {
        let octets: Vec<u8> = prefix
            .split('.')
            .map(|label| label.parse::<u8>().ok())
            .collect::<Option<_>>()?;
        if octets.len() != 4 {
            return None;
        }
        return Some(IpAddr::V4(Ipv4Addr::new(
            octets[3], octets[2], octets[1], octets[0],
        )));
    }

    if let Some(prefix) = name.strip_suffix(".ip6.arpa") {
        let nibbles: Vec<u8> = prefix
            .split('.')
            .map(|label| {
                let mut chars = label.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => c.to_digit(16).map(|d| d as u8),
                    _ => None,
                }
            })
            .collect::<Option<_>>()?;
        if nibbles.len() != 32 {
            return None;
        }
        let mut octets = [0u8; 16];
        for (i, pair) in nibbles.chunks(2).enumerate() {
            octets[15 - i] = (pair[1] << 4) | pair[0];
        }
        return Some(IpAddr::V6(Ipv6Addr::from(octets)));
    }

    None
}
