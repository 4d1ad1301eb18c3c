// Element and type descriptors of the definition model

use std::collections::HashSet;

use crate::converter::{CompiledElement, CompiledType, UNLIMITED};
use crate::core::BackboneRule;
use crate::{FhirSchemaError, Result};

/// Cardinality and allowed types of one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDefinition {
    pub min: u32,
    /// `None` means unlimited.
    pub max: Option<u32>,
    pub types: Vec<TypeReference>,
}

/// A type allowed on an element, classified against the known complex types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeReference {
    code: String,
    targets: Option<Vec<String>>,
    is_complex: bool,
    is_backbone: bool,
}

impl ElementDefinition {
    pub fn new(min: u32, max: Option<u32>, types: Vec<TypeReference>) -> Self {
        Self { min, max, types }
    }

    pub(crate) fn from_compiled(
        path: &str,
        compiled: &CompiledElement,
        complex_types: &HashSet<String>,
        backbone_rule: BackboneRule,
    ) -> Result<Self> {
        let max = parse_max(&compiled.max).ok_or_else(|| {
            FhirSchemaError::malformed_schema(format!(
                "element {path} has invalid max cardinality '{}'",
                compiled.max
            ))
        })?;
        let types = compiled
            .types
            .iter()
            .map(|t| TypeReference::resolve(t, complex_types, backbone_rule))
            .collect();

        Ok(Self {
            min: compiled.min,
            max,
            types,
        })
    }

    pub fn to_compiled(&self) -> CompiledElement {
        CompiledElement {
            min: self.min,
            max: self
                .max
                .map_or_else(|| UNLIMITED.to_string(), |max| max.to_string()),
            types: self.types.iter().map(TypeReference::to_compiled).collect(),
        }
    }

    pub fn is_required(&self) -> bool {
        self.min > 0
    }

    pub fn is_unlimited(&self) -> bool {
        self.max.is_none()
    }

    pub fn is_single(&self) -> bool {
        self.max == Some(1)
    }

    pub fn is_array(&self) -> bool {
        !self.is_single()
    }

    pub fn is_polymorphic(&self) -> bool {
        self.types.len() != 1
    }

    /// The only allowed type, `None` for polymorphic or untyped elements.
    pub fn single_type(&self) -> Option<&TypeReference> {
        match self.types.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Same cardinality, type list narrowed to `type_ref`.
    pub fn to_single_type(&self, type_ref: &TypeReference) -> Result<ElementDefinition> {
        if !self.types.contains(type_ref) {
            return Err(FhirSchemaError::not_found(format!(
                "type {} is not allowed on this element",
                type_ref.code
            )));
        }
        Ok(ElementDefinition {
            min: self.min,
            max: self.max,
            types: vec![type_ref.clone()],
        })
    }
}

impl TypeReference {
    pub fn resolve(
        compiled: &CompiledType,
        complex_types: &HashSet<String>,
        backbone_rule: BackboneRule,
    ) -> Self {
        Self {
            is_complex: complex_types.contains(&compiled.code),
            is_backbone: backbone_rule.is_backbone(&compiled.code),
            code: compiled.code.clone(),
            targets: compiled.targets.clone(),
        }
    }

    pub fn to_compiled(&self) -> CompiledType {
        CompiledType {
            code: self.code.clone(),
            targets: self.targets.clone(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_reference(&self) -> bool {
        self.code == "Reference"
    }

    pub fn is_backbone(&self) -> bool {
        self.is_backbone
    }

    pub fn is_resource(&self) -> bool {
        self.code == "Resource"
    }

    pub fn is_complex(&self) -> bool {
        self.is_complex
    }

    pub fn is_primitive(&self) -> bool {
        !self.is_complex
    }

    /// Allowed reference targets. Empty for non-reference types.
    pub fn targets(&self) -> &[String] {
        match (&self.targets, self.is_reference()) {
            (Some(targets), true) => targets,
            _ => &[],
        }
    }

    /// A reference that may point at any resource.
    pub fn is_any(&self) -> bool {
        self.is_reference() && self.targets().is_empty()
    }
}

fn parse_max(max: &str) -> Option<Option<u32>> {
    if max == UNLIMITED {
        Some(None)
    } else {
        max.parse().ok().map(Some)
    }
}
