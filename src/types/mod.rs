pub mod definitions;
pub mod element;
pub mod structure;

pub use definitions::{DefinitionRef, Definitions};
pub use element::{ElementDefinition, TypeReference};
pub use structure::StructureDefinition;
