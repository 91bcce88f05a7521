//! relaydns Domain Layer
pub mod answer;
pub mod config;
pub mod dns_query;
pub mod dns_record;
pub mod errors;

pub use answer::{Answer, AnswerStatus};
pub use config::{CliOverrides, Config, ConfigError};
pub use dns_query::{Question, QuestionTarget};
pub use dns_record::{RecordData, RecordType, ResourceRecord};
pub use errors::DomainError;
