use crate::DomainError;
use std::fmt;
use std::str::FromStr;

/// Query types the resolver engine knows how to issue and cache.
///
/// The set is closed on purpose: anything outside of it is rejected at the
/// boundary with [`DomainError::UnsupportedQueryType`] instead of being sent
/// upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    AAAA,
    PTR,
    NS,
    MX,
    SOA,
    SRV,
    TXT,
}

impl RecordType {
    pub const ALL: [RecordType; 8] = [
        RecordType::A,
        RecordType::AAAA,
        RecordType::PTR,
        RecordType::NS,
        RecordType::MX,
        RecordType::SOA,
        RecordType::SRV,
        RecordType::TXT,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
            RecordType::PTR => "PTR",
            RecordType::NS => "NS",
            RecordType::MX => "MX",
            RecordType::SOA => "SOA",
            RecordType::SRV => "SRV",
            RecordType::TXT => "TXT",
        }
    }

    /// IANA type code used on the wire.
    pub fn code(&self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::SOA => 6,
            RecordType::PTR => 12,
            RecordType::MX => 15,
            RecordType::TXT => 16,
            RecordType::AAAA => 28,
            RecordType::SRV => 33,
        }
    }

    pub fn from_code(code: u16) -> Result<Self, DomainError> {
        RecordType::ALL
            .iter()
            .copied()
            .find(|t| t.code() == code)
            .ok_or_else(|| DomainError::UnsupportedQueryType(format!("TYPE{code}")))
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::UnsupportedQueryType(s.to_string()))
    }
}
