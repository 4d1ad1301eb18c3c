use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FieldValue, Record};
use crate::registry::TypeRegistry;
use crate::{FhirSchemaError, Result};

const REFERENCE_TYPE: &str = "Reference";

/// Storage encoding of a `Reference`: the literal `Type/id` target split in two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompactReference {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl CompactReference {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            display: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Split a local `Type/id` reference. Anything other than exactly two
    /// non-empty segments is rejected.
    pub fn parse(reference: &str, display: Option<String>) -> Result<Self> {
        match reference.split('/').collect::<Vec<_>>().as_slice() {
            [resource_type, id] if !resource_type.is_empty() && !id.is_empty() => Ok(Self {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
                display,
            }),
            _ => Err(FhirSchemaError::invalid_reference(reference)),
        }
    }

    /// Compact form of a public `Reference` record.
    pub fn from_reference(reference: &Record) -> Result<Self> {
        let target = reference
            .get("reference")
            .ok()
            .and_then(FieldValue::as_str)
            .ok_or_else(|| {
                FhirSchemaError::invalid_reference(format!(
                    "{} without a literal reference",
                    reference.type_name()
                ))
            })?;
        let display = reference
            .get("display")
            .ok()
            .and_then(FieldValue::as_str)
            .map(str::to_string);
        Self::parse(target, display)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        Self::deserialize(value)
            .map_err(|e| FhirSchemaError::invalid_reference(format!("{value}: {e}")))
    }

    /// `Type/id`, the value a public reference carries.
    pub fn target(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }

    /// Expand back into a public `Reference` record.
    pub fn to_reference_record(&self, registry: &TypeRegistry) -> Result<Record> {
        let mut reference = registry.new_record(REFERENCE_TYPE)?;
        reference.set("reference", self.target())?;
        if let Some(display) = &self.display {
            reference.set("display", display.as_str())?;
        }
        Ok(reference)
    }
}
