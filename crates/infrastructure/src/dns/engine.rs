mod in_flight;
mod resolver_engine;
mod settings;

pub use resolver_engine::{EngineStats, ResolverEngine};
pub use settings::ResolverSettings;
