use std::collections::HashSet;

use indexmap::IndexMap;

use super::ElementDefinition;
use crate::converter::CompiledStructure;
use crate::core::BackboneRule;
use crate::Result;

/// A compiled resource or complex type: its flat, dotted-path element list.
///
/// `base` is informational only; elements are never inherited from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureDefinition {
    pub name: String,
    pub abstract_: bool,
    pub base: Option<String>,
    pub elements: IndexMap<String, ElementDefinition>,
}

impl StructureDefinition {
    pub(crate) fn from_compiled(
        compiled: &CompiledStructure,
        complex_types: &HashSet<String>,
        backbone_rule: BackboneRule,
    ) -> Result<Self> {
        let elements = compiled
            .elements
            .iter()
            .map(|(path, element)| {
                ElementDefinition::from_compiled(path, element, complex_types, backbone_rule)
                    .map(|element| (path.clone(), element))
            })
            .collect::<Result<IndexMap<_, _>>>()?;

        Ok(Self {
            name: compiled.name.clone(),
            abstract_: compiled.abstract_,
            base: compiled.base.clone(),
            elements,
        })
    }

    pub fn to_compiled(&self) -> CompiledStructure {
        CompiledStructure {
            name: self.name.clone(),
            abstract_: self.abstract_,
            base: self.base.clone(),
            elements: self
                .elements
                .iter()
                .map(|(path, element)| (path.clone(), element.to_compiled()))
                .collect(),
        }
    }

    pub fn element(&self, path: &str) -> Option<&ElementDefinition> {
        self.elements.get(path)
    }
}
