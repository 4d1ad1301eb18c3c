use std::collections::HashSet;
use std::io::Read;

use indexmap::IndexMap;
use serde_json::Value;

use super::{ElementDefinition, StructureDefinition, TypeReference};
use crate::converter::{CompiledDefinitions, DefinitionCompiler};
use crate::core::{FhirRecordsConfig, ModelConfig};
use crate::utils::resource_from_path;
use crate::{FhirSchemaError, Result};

/// Read-only collection of compiled resource and complex type definitions.
#[derive(Debug, Clone)]
pub struct Definitions {
    resources: IndexMap<String, StructureDefinition>,
    types: IndexMap<String, StructureDefinition>,
    config: ModelConfig,
}

/// Result of [`Definitions::find`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefinitionRef<'a> {
    Structure(&'a StructureDefinition),
    Element(&'a ElementDefinition),
}

impl Definitions {
    /// Link compiled definitions into the model. Type flags are resolved
    /// against the names in `types`.
    pub fn new(
        resources: CompiledDefinitions,
        types: CompiledDefinitions,
        config: &ModelConfig,
    ) -> Result<Self> {
        let complex_types: HashSet<String> = types.keys().cloned().collect();
        let link = |defs: &CompiledDefinitions| {
            defs.iter()
                .map(|(name, compiled)| {
                    StructureDefinition::from_compiled(
                        compiled,
                        &complex_types,
                        config.backbone_rule,
                    )
                    .map(|definition| (name.clone(), definition))
                })
                .collect::<Result<IndexMap<_, _>>>()
        };

        let definitions = Self {
            resources: link(&resources)?,
            types: link(&types)?,
            config: config.clone(),
        };

        tracing::debug!(
            "Loaded {} resource and {} type definitions",
            definitions.resources.len(),
            definitions.types.len()
        );
        Ok(definitions)
    }

    /// Load pre-compiled resource and type definition documents.
    pub fn from_json(resources: &str, types: &str) -> Result<Self> {
        Self::from_json_with_config(resources, types, &ModelConfig::default())
    }

    pub fn from_json_with_config(
        resources: &str,
        types: &str,
        config: &ModelConfig,
    ) -> Result<Self> {
        let resources: CompiledDefinitions = serde_json::from_str(resources)?;
        let types: CompiledDefinitions = serde_json::from_str(types)?;
        Self::new(resources, types, config)
    }

    pub fn from_readers<R: Read, T: Read>(resources: R, types: T) -> Result<Self> {
        let resources: CompiledDefinitions = serde_json::from_reader(resources)?;
        let types: CompiledDefinitions = serde_json::from_reader(types)?;
        Self::new(resources, types, &ModelConfig::default())
    }

    /// Compile raw `profiles-resources` / `profiles-types` bundles and load them.
    pub fn from_bundles(
        resource_bundle: &Value,
        type_bundle: &Value,
        config: &FhirRecordsConfig,
    ) -> Result<Self> {
        let compiler = DefinitionCompiler::with_config(config.compiler.clone());
        let resources = compiler.compile_bundle(resource_bundle)?;
        let types = compiler.compile_types_bundle(type_bundle)?;
        Self::new(resources, types, &config.model)
    }

    pub fn resources(&self) -> &IndexMap<String, StructureDefinition> {
        &self.resources
    }

    pub fn types(&self) -> &IndexMap<String, StructureDefinition> {
        &self.types
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn is_resource(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    pub fn is_complex_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Resource definition first, then complex type.
    pub fn get_def(&self, name: &str) -> Result<&StructureDefinition> {
        self.resources
            .get(name)
            .or_else(|| self.types.get(name))
            .ok_or_else(|| FhirSchemaError::not_found(format!("definition {name}")))
    }

    /// The structure for a bare name, or the element at a dotted path.
    pub fn find(&self, path: &str) -> Result<DefinitionRef<'_>> {
        let name = resource_from_path(path);
        let structure = self.get_def(name)?;
        if name == path {
            return Ok(DefinitionRef::Structure(structure));
        }
        structure
            .element(path)
            .map(DefinitionRef::Element)
            .ok_or_else(|| FhirSchemaError::not_found(format!("element {path}")))
    }

    pub fn types_from_path(&self, path: &str) -> Result<&[TypeReference]> {
        match self.find(path)? {
            DefinitionRef::Element(element) => Ok(&element.types),
            DefinitionRef::Structure(_) => Err(FhirSchemaError::invalid_path(path)),
        }
    }

    /// Back to the compiled document format, resources then types.
    pub fn to_compiled(&self) -> (CompiledDefinitions, CompiledDefinitions) {
        let compile = |defs: &IndexMap<String, StructureDefinition>| -> CompiledDefinitions {
            defs.iter()
                .map(|(name, def)| (name.clone(), def.to_compiled()))
                .collect()
        };
        (compile(&self.resources), compile(&self.types))
    }
}
