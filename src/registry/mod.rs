//! Record type registry.
//!
//! Built once from [`Definitions`], the registry holds one
//! [`RecordTypeDescriptor`] per resource and per complex type. Nested backbone
//! descriptors hang off their owners. The registry is immutable after
//! [`TypeRegistry::build`] and can be shared across threads behind an `Arc`.

mod descriptor;

pub use descriptor::{RecordKind, RecordTypeDescriptor};

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::record::Record;
use crate::types::{Definitions, StructureDefinition, TypeReference};
use crate::{FhirSchemaError, Result};

/// Discriminant key naming a resource's own type.
pub const RESOURCE_TYPE_KEY: &str = "resourceType";

#[derive(Debug)]
pub struct TypeRegistry {
    definitions: Definitions,
    resources: IndexMap<String, Arc<RecordTypeDescriptor>>,
    types: IndexMap<String, Arc<RecordTypeDescriptor>>,
    metrics: RegistryMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryMetrics {
    pub resource_count: usize,
    pub complex_count: usize,
    pub nested_count: usize,
    pub polymorphic_groups: usize,
}

impl TypeRegistry {
    pub fn build(definitions: Definitions) -> Self {
        let types: IndexMap<_, _> = definitions
            .types()
            .iter()
            .map(|(name, def)| (name.clone(), Arc::new(describe(def, RecordKind::ComplexType))))
            .collect();
        let resources: IndexMap<_, _> = definitions
            .resources()
            .iter()
            .map(|(name, def)| (name.clone(), Arc::new(describe(def, RecordKind::Resource))))
            .collect();

        let all = || resources.values().chain(types.values());
        let metrics = RegistryMetrics {
            resource_count: resources.len(),
            complex_count: types.len(),
            nested_count: all().map(|d| d.count_nested()).sum(),
            polymorphic_groups: all().map(|d| d.count_polymorphic()).sum(),
        };

        tracing::info!(
            "Built type registry: {} resources, {} complex types, {} nested types, {} polymorphic fields",
            metrics.resource_count,
            metrics.complex_count,
            metrics.nested_count,
            metrics.polymorphic_groups
        );

        Self {
            definitions,
            resources,
            types,
            metrics,
        }
    }

    /// Resource descriptor first, then complex type.
    pub fn get(&self, name: &str) -> Result<&Arc<RecordTypeDescriptor>> {
        self.resources
            .get(name)
            .or_else(|| self.types.get(name))
            .ok_or_else(|| FhirSchemaError::not_found(format!("record type {name}")))
    }

    pub fn get_resource(&self, name: &str) -> Result<&Arc<RecordTypeDescriptor>> {
        self.resources
            .get(name)
            .ok_or_else(|| FhirSchemaError::not_found(format!("resource type {name}")))
    }

    pub fn get_type(&self, name: &str) -> Result<&Arc<RecordTypeDescriptor>> {
        self.types
            .get(name)
            .ok_or_else(|| FhirSchemaError::not_found(format!("complex type {name}")))
    }

    pub fn types_for_path(&self, path: &str) -> Result<&[TypeReference]> {
        self.definitions.types_from_path(path)
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn metrics(&self) -> &RegistryMetrics {
        &self.metrics
    }

    /// Empty record of a resource or complex type.
    pub fn new_record(&self, name: &str) -> Result<Record> {
        Ok(Record::new(self.get(name)?.clone()))
    }

    /// Build a resource from its public representation, dispatching on
    /// `resourceType`.
    pub fn from_public(&self, json: &Value) -> Result<Record> {
        let descriptor = self.resource_descriptor(json)?;
        Record::from_public(self, descriptor, json)
    }

    /// Build a resource from its storage representation. With
    /// `convert_to_public` the record is converted before it is returned.
    pub fn from_storage(&self, json: &Value, convert_to_public: bool) -> Result<Record> {
        let descriptor = self.resource_descriptor(json)?;
        let mut record = Record::from_storage(self, descriptor, json)?;
        if convert_to_public {
            record.to_public(self)?;
        }
        Ok(record)
    }

    fn resource_descriptor(&self, json: &Value) -> Result<&Arc<RecordTypeDescriptor>> {
        let resource_type = json
            .get(RESOURCE_TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| FhirSchemaError::not_found("resourceType discriminant"))?;
        self.get_resource(resource_type)
    }
}

fn describe(definition: &StructureDefinition, kind: RecordKind) -> RecordTypeDescriptor {
    RecordTypeDescriptor::synthesize(
        &definition.name,
        &definition.name,
        kind,
        definition
            .elements
            .iter()
            .map(|(path, element)| (path.as_str(), element)),
    )
}
