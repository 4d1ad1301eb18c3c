//! Definition compiler.
//!
//! Turns raw StructureDefinition entries (as shipped in the official
//! `profiles-resources.json` / `profiles-types.json` bundles) into the flat
//! compiled format: one element list per structure, each element carrying its
//! cardinality and allowed types.

mod compiled;
mod context;
mod structure_definition;

pub use compiled::*;
pub use context::*;
pub use structure_definition::*;

use serde::Deserialize;
use serde_json::Value;

use crate::core::CompilerConfig;
use crate::utils::resource_from_url;
use crate::{FhirSchemaError, Result};

const STRUCTURE_DEFINITION: &str = "StructureDefinition";
const PRIMITIVE_TYPE_KIND: &str = "primitive-type";

#[derive(Debug, Clone, Default)]
pub struct DefinitionCompiler {
    config: CompilerConfig,
}

impl DefinitionCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile resource (or any structure) definitions.
    pub fn compile<'a, I>(&self, entries: I) -> Result<CompiledDefinitions>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        self.compile_with_stats(entries, false).map(|(defs, _)| defs)
    }

    /// Compile complex type definitions: same transform, primitive kinds excluded.
    pub fn compile_types<'a, I>(&self, entries: I) -> Result<CompiledDefinitions>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        self.compile_with_stats(entries, true).map(|(defs, _)| defs)
    }

    pub fn compile_bundle(&self, bundle: &Value) -> Result<CompiledDefinitions> {
        self.compile(bundle_entries(bundle)?)
    }

    pub fn compile_types_bundle(&self, bundle: &Value) -> Result<CompiledDefinitions> {
        self.compile_types(bundle_entries(bundle)?)
    }

    pub fn compile_with_stats<'a, I>(
        &self,
        entries: I,
        skip_primitive_types: bool,
    ) -> Result<(CompiledDefinitions, CompilationStats)>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut context = CompilationContext::begin();
        let mut result = CompiledDefinitions::new();

        for entry in entries {
            context.stats.entries_seen += 1;

            if entry.get("resourceType").and_then(Value::as_str) != Some(STRUCTURE_DEFINITION) {
                context.stats.skipped_not_structure += 1;
                continue;
            }

            if skip_primitive_types
                && entry.get("kind").and_then(Value::as_str) == Some(PRIMITIVE_TYPE_KIND)
            {
                tracing::debug!("Skipping primitive type {}", entry_label(entry));
                context.stats.skipped_primitive += 1;
                continue;
            }

            let status = entry.get("status").and_then(Value::as_str);
            if !self.config.accepts_status(status) {
                tracing::debug!(
                    "Skipping {} with status {}",
                    entry_label(entry),
                    status.unwrap_or("<none>")
                );
                context.stats.skipped_status += 1;
                continue;
            }

            let structure = self.transform_definition(entry, &mut context)?;
            result.insert(structure.name.clone(), structure);
            context.stats.structures_compiled += 1;
        }

        Ok((result, context.finish()))
    }

    fn transform_definition(
        &self,
        entry: &Value,
        context: &mut CompilationContext,
    ) -> Result<CompiledStructure> {
        let definition = RawStructureDefinition::deserialize(entry).map_err(|e| {
            FhirSchemaError::malformed_schema(format!("{}: {e}", entry_label(entry)))
        })?;

        let base = definition
            .base_definition
            .as_deref()
            .map(resource_from_url);

        let mut elements = indexmap::IndexMap::new();
        for element in &definition.snapshot.element {
            if element.is_root() {
                continue;
            }
            let compiled = self.transform_element(&definition.name, element, context)?;
            elements.insert(element.path.clone(), compiled);
            context.stats.elements_compiled += 1;
        }

        Ok(CompiledStructure {
            name: definition.name,
            abstract_: definition.abstract_,
            base,
            elements,
        })
    }

    fn transform_element(
        &self,
        structure: &str,
        element: &RawElementDefinition,
        context: &mut CompilationContext,
    ) -> Result<CompiledElement> {
        let max = element.max.clone().unwrap_or_else(|| UNLIMITED.to_string());
        if max != UNLIMITED && max.parse::<u32>().is_err() {
            return Err(FhirSchemaError::malformed_schema(format!(
                "{structure}: element {} has invalid max cardinality '{max}'",
                element.path
            )));
        }

        let mut types = Vec::new();
        for raw_type in element.element_type.iter().flatten() {
            let Some(code) = &raw_type.code else {
                tracing::debug!("Dropping type without code on {}", element.path);
                context.stats.types_dropped += 1;
                continue;
            };

            let mut compiled = CompiledType::new(code.clone());
            if code == "Reference"
                && let Some(profiles) = &raw_type.target_profile
            {
                compiled.targets = Some(profiles.iter().map(|p| resource_from_url(p)).collect());
            }
            types.push(compiled);
        }

        Ok(CompiledElement {
            min: element.min.unwrap_or(0),
            max,
            types,
        })
    }
}

/// Resources carried by a bundle's `entry[*].resource`.
pub fn bundle_entries(bundle: &Value) -> Result<Vec<&Value>> {
    let entries = bundle
        .get("entry")
        .and_then(Value::as_array)
        .ok_or_else(|| FhirSchemaError::malformed_schema("bundle has no entry array"))?;

    entries
        .iter()
        .map(|entry| {
            entry.get("resource").ok_or_else(|| {
                FhirSchemaError::malformed_schema("bundle entry has no resource")
            })
        })
        .collect()
}

/// Keep StructureDefinition resources only.
pub fn structure_definitions<'a, I>(entries: I) -> Vec<&'a Value>
where
    I: IntoIterator<Item = &'a Value>,
{
    entries
        .into_iter()
        .filter(|e| e.get("resourceType").and_then(Value::as_str) == Some(STRUCTURE_DEFINITION))
        .collect()
}

fn entry_label(entry: &Value) -> String {
    ["name", "id", "url"]
        .iter()
        .find_map(|key| entry.get(*key).and_then(Value::as_str))
        .unwrap_or("<unnamed StructureDefinition>")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structure_definitions_filter() {
        let entries = [
            json!({"resourceType": "StructureDefinition", "name": "A"}),
            json!({"resourceType": "SearchParameter", "name": "B"}),
            json!({"name": "C"}),
        ];
        let kept = structure_definitions(&entries);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0]["name"], "A");
    }

    #[test]
    fn test_entry_label_fallbacks() {
        assert_eq!(entry_label(&json!({"name": "Patient", "id": "x"})), "Patient");
        assert_eq!(entry_label(&json!({"url": "http://example.org/SD/x"})), "http://example.org/SD/x");
        assert_eq!(entry_label(&json!({})), "<unnamed StructureDefinition>");
    }

    #[test]
    fn test_reference_targets_use_last_url_segment() {
        let entry = json!({
            "resourceType": "StructureDefinition",
            "name": "Encounter",
            "status": "active",
            "abstract": false,
            "snapshot": {"element": [
                {"path": "Encounter", "min": 0, "max": "*"},
                {"path": "Encounter.subject", "min": 0, "max": "1", "type": [{
                    "code": "Reference",
                    "targetProfile": [
                        "http://hl7.org/fhir/StructureDefinition/Patient",
                        "http://hl7.org/fhir/StructureDefinition/Group"
                    ]
                }]},
                {"path": "Encounter.period", "max": "1", "type": [{
                    "code": "Period",
                    "targetProfile": ["http://hl7.org/fhir/StructureDefinition/Ignored"]
                }]}
            ]}
        });
        let compiled = DefinitionCompiler::new().compile([&entry]).unwrap();
        let encounter = &compiled["Encounter"];

        assert_eq!(
            encounter.elements["Encounter.subject"].types,
            vec![CompiledType::reference_to(["Patient", "Group"])]
        );
        assert_eq!(
            encounter.elements["Encounter.period"].types,
            vec![CompiledType::new("Period")]
        );
    }
}
