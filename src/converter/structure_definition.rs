use serde::{Deserialize, Serialize};

/// StructureDefinition as found in the official `profiles-*.json` bundles,
/// reduced to the keys the compiler reads. Entry filters run on the raw
/// JSON before deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawStructureDefinition {
    pub name: String,

    #[serde(rename = "abstract")]
    pub abstract_: bool,

    #[serde(rename = "baseDefinition")]
    pub base_definition: Option<String>,

    pub snapshot: RawSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawSnapshot {
    pub element: Vec<RawElementDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawElementDefinition {
    pub path: String,

    pub min: Option<u32>,
    pub max: Option<String>,

    #[serde(rename = "type")]
    pub element_type: Option<Vec<RawElementType>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawElementType {
    pub code: Option<String>,

    #[serde(rename = "targetProfile")]
    pub target_profile: Option<Vec<String>>,
}

impl RawElementDefinition {
    /// The root element carries the structure's bare name as its path.
    pub fn is_root(&self) -> bool {
        !self.path.contains('.')
    }
}
