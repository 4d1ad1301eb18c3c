pub mod config;

pub use config::{BackboneRule, CompilerConfig, FhirRecordsConfig, ModelConfig};
