use relaydns_domain::RecordType;
use hickory_proto::rr::RecordType as HickoryRecordType;

pub struct RecordTypeMapper;

impl RecordTypeMapper {
    /// Convert domain RecordType → hickory RecordType (for building queries)
    pub fn to_hickory(record_type: &RecordType) -> HickoryRecordType {
        match record_type {
            RecordType::A => HickoryRecordType::A,
            RecordType::AAAA => HickoryRecordType::AAAA,
            RecordType::PTR => HickoryRecordType::PTR,
            RecordType::NS => HickoryRecordType::NS,
            RecordType::MX => HickoryRecordType::MX,
            RecordType::SOA => HickoryRecordType::SOA,
            RecordType::SRV => HickoryRecordType::SRV,
            RecordType::TXT => HickoryRecordType::TXT,
        }
    }

    /// Convert hickory RecordType → domain RecordType (for incoming queries)
    ///
    /// Returns `None` for unsupported record types.
    pub fn from_hickory(hickory_type: HickoryRecordType) -> Option<RecordType> {
        match hickory_type {
            HickoryRecordType::A => Some(RecordType::A),
            HickoryRecordType::AAAA => Some(RecordType::AAAA),
            HickoryRecordType::PTR => Some(RecordType::PTR),
            HickoryRecordType::NS => Some(RecordType::NS),
            HickoryRecordType::MX => Some(RecordType::MX),
            HickoryRecordType::SOA => Some(RecordType::SOA),
            HickoryRecordType::SRV => Some(RecordType::SRV),
            HickoryRecordType::TXT => Some(RecordType::TXT),
            _ => None,
        }
    }

    pub fn is_supported(hickory_type: HickoryRecordType) -> bool {
        Self::from_hickory(hickory_type).is_some()
    }
}
