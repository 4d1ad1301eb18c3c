use std::collections::HashMap;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::types::ElementDefinition;
use crate::utils::{pascal_case, strip_polymorphic_marker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Carries a `resourceType` discriminant.
    Resource,
    ComplexType,
    /// Inline sub-structure of a resource or type, e.g. `Patient.contact`.
    Backbone,
}

/// Field layout of one resource, complex type or backbone element.
#[derive(Debug)]
pub struct RecordTypeDescriptor {
    name: String,
    qualified_name: String,
    kind: RecordKind,
    fields: IndexMap<String, ElementDefinition>,
    polymorphic: IndexMap<String, IndexSet<String>>,
    // concrete field -> logical name
    choice_of: HashMap<String, String>,
    nested: IndexMap<String, Arc<RecordTypeDescriptor>>,
}

impl RecordTypeDescriptor {
    /// Build the descriptor for `name` from element paths whose first segment
    /// is the owner (`Patient.contact.gender` for owner `Patient`).
    pub(crate) fn synthesize<'a, I>(
        name: &str,
        qualified_name: &str,
        kind: RecordKind,
        elements: I,
    ) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a ElementDefinition)>,
    {
        let mut fields = IndexMap::new();
        let mut polymorphic = IndexMap::new();
        let mut choice_of = HashMap::new();
        let mut backbones: IndexMap<&'a str, Vec<(&'a str, &'a ElementDefinition)>> =
            IndexMap::new();

        for (path, element) in elements {
            let Some((_, field)) = path.split_once('.') else {
                continue;
            };

            if let Some((head, _)) = field.split_once('.') {
                backbones.entry(head).or_default().push((field, element));
                continue;
            }

            match strip_polymorphic_marker(field) {
                Some(logical) => {
                    let mut concrete_names = IndexSet::new();
                    for type_ref in &element.types {
                        let concrete = format!("{logical}{}", pascal_case(type_ref.code()));
                        let narrowed = ElementDefinition {
                            min: element.min,
                            max: element.max,
                            types: vec![type_ref.clone()],
                        };
                        fields.insert(concrete.clone(), narrowed);
                        choice_of.insert(concrete.clone(), logical.to_string());
                        concrete_names.insert(concrete);
                    }
                    polymorphic.insert(logical.to_string(), concrete_names);
                }
                None => {
                    fields.insert(field.to_string(), element.clone());
                }
            }
        }

        let nested = backbones
            .into_iter()
            .map(|(segment, elements)| {
                let nested_name = pascal_case(segment);
                let nested_qualified = format!("{qualified_name}.{nested_name}");
                let descriptor = Self::synthesize(
                    &nested_name,
                    &nested_qualified,
                    RecordKind::Backbone,
                    elements,
                );
                (nested_name, Arc::new(descriptor))
            })
            .collect();

        Self {
            name: name.to_string(),
            qualified_name: qualified_name.to_string(),
            kind,
            fields,
            polymorphic,
            choice_of,
            nested,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted name including owners, e.g. `InsurancePlan.Plan.GeneralCost`.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn is_resource(&self) -> bool {
        self.kind == RecordKind::Resource
    }

    pub fn fields(&self) -> &IndexMap<String, ElementDefinition> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&ElementDefinition> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Logical name -> concrete field names, e.g. `deceased` ->
    /// {`deceasedBoolean`, `deceasedDateTime`}.
    pub fn polymorphic(&self) -> &IndexMap<String, IndexSet<String>> {
        &self.polymorphic
    }

    pub fn polymorphic_group(&self, logical: &str) -> Option<&IndexSet<String>> {
        self.polymorphic.get(logical)
    }

    pub fn logical_name_of(&self, concrete: &str) -> Option<&str> {
        self.choice_of.get(concrete).map(String::as_str)
    }

    pub fn nested_types(&self) -> &IndexMap<String, Arc<RecordTypeDescriptor>> {
        &self.nested
    }

    pub fn nested(&self, name: &str) -> Option<&Arc<RecordTypeDescriptor>> {
        self.nested.get(name)
    }

    pub(crate) fn count_nested(&self) -> usize {
        self.nested
            .values()
            .map(|nested| 1 + nested.count_nested())
            .sum()
    }

    pub(crate) fn count_polymorphic(&self) -> usize {
        self.polymorphic.len()
            + self
                .nested
                .values()
                .map(|nested| nested.count_polymorphic())
                .sum::<usize>()
    }
}
