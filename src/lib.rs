//! # FHIR Records
//!
//! Schema-driven FHIR resource records with two interchangeable JSON
//! representations.
//!
//! ## Features
//!
//! - **Definition compiler**: Turn the official `profiles-resources.json` and
//!   `profiles-types.json` bundles into a compact element/type document
//! - **Type registry**: One record type per resource and complex type, with
//!   nested backbone types and expanded polymorphic (`[x]`) fields
//! - **Public/storage conversion**: Compact references and collapsed
//!   polymorphic values for storage, standard FHIR JSON for everything else
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fhir_records::*;
//! use serde_json::json;
//!
//! # fn example(resources: &str, types: &str) -> Result<()> {
//! let definitions = Definitions::from_json(resources, types)?;
//! let registry = TypeRegistry::build(definitions);
//!
//! let mut patient = registry.from_public(&json!({
//!     "resourceType": "Patient",
//!     "deceasedBoolean": false,
//!     "generalPractitioner": [{"reference": "Practitioner/p1"}]
//! }))?;
//!
//! patient.to_storage()?;
//! let stored = patient.to_json()?;
//! assert_eq!(stored["deceased"], json!({"boolean": false}));
//!
//! let restored = registry.from_storage(&stored, true)?;
//! # let _ = restored;
//! # Ok(())
//! # }
//! ```

pub mod converter;
pub mod core;
pub mod error;
pub mod record;
pub mod registry;
pub mod types;
pub mod utils;

pub use converter::{
    CompilationStats, CompiledDefinitions, CompiledElement, CompiledStructure, CompiledType,
    DefinitionCompiler,
};
pub use crate::core::{BackboneRule, CompilerConfig, FhirRecordsConfig, ModelConfig};
pub use error::Result; // Our Result type takes precedence
pub use error::FhirSchemaError;
pub use record::{ChoiceValue, CompactReference, FieldValue, Record};
pub use registry::{RecordKind, RecordTypeDescriptor, RegistryMetrics, TypeRegistry};
pub use types::{DefinitionRef, Definitions, ElementDefinition, StructureDefinition, TypeReference};
