// Compiled definition format: one flat element list per structure.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Structures keyed by name, in bundle order.
pub type CompiledDefinitions = IndexMap<String, CompiledStructure>;

/// Sentinel for an unbounded upper cardinality.
pub const UNLIMITED: &str = "*";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompiledStructure {
    pub name: String,
    #[serde(rename = "abstract")]
    pub abstract_: bool,
    pub base: Option<String>,
    pub elements: IndexMap<String, CompiledElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompiledElement {
    pub min: u32,
    pub max: String,
    pub types: Vec<CompiledType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompiledType {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
}

impl CompiledType {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            targets: None,
        }
    }

    pub fn reference_to<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            code: "Reference".to_string(),
            targets: Some(targets.into_iter().map(Into::into).collect()),
        }
    }
}

impl CompiledElement {
    pub fn new(min: u32, max: impl Into<String>, types: Vec<CompiledType>) -> Self {
        Self {
            min,
            max: max.into(),
            types,
        }
    }
}
