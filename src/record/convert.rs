// Conversions between the public and the storage representation.
//
// Both directions dispatch on the owning descriptor's element types.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::{ChoiceValue, CompactReference, FieldValue, Record};
use crate::registry::{RecordTypeDescriptor, TypeRegistry};
use crate::types::ElementDefinition;
use crate::utils::pascal_case;
use crate::{FhirSchemaError, Result};

const REFERENCE_CODE: &str = "Reference";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldClass<'a> {
    /// Copied verbatim. Untyped elements land here too.
    Primitive,
    Resource,
    Reference,
    Nested { code: &'a str, backbone: bool },
}

fn classify(element: &ElementDefinition) -> FieldClass<'_> {
    let Some(type_ref) = element.single_type() else {
        return FieldClass::Primitive;
    };
    if type_ref.is_resource() {
        FieldClass::Resource
    } else if type_ref.is_reference() {
        FieldClass::Reference
    } else if type_ref.is_backbone() {
        FieldClass::Nested {
            code: type_ref.code(),
            backbone: true,
        }
    } else if type_ref.is_complex() {
        FieldClass::Nested {
            code: type_ref.code(),
            backbone: false,
        }
    } else {
        FieldClass::Primitive
    }
}

impl Record {
    /// Build a record from the public representation.
    pub fn from_public(
        registry: &TypeRegistry,
        descriptor: &Arc<RecordTypeDescriptor>,
        json: &Value,
    ) -> Result<Record> {
        let object = expect_object(descriptor, json)?;
        reject_polymorphic_conflicts(descriptor, object)?;

        let mut record = Record::new(Arc::clone(descriptor));
        for (key, value) in object {
            let Some(element) = descriptor.field(key) else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            let field_value = match classify(element) {
                FieldClass::Primitive => FieldValue::Primitive(value.clone()),
                FieldClass::Resource => map_items(descriptor, key, element, value, |item| {
                    registry.from_public(item).map(FieldValue::Record)
                })?,
                FieldClass::Reference => {
                    let nested = record_descriptor(registry, descriptor, key, REFERENCE_CODE, false)?;
                    map_items(descriptor, key, element, value, |item| {
                        Record::from_public(registry, &nested, item).map(FieldValue::Record)
                    })?
                }
                FieldClass::Nested { code, backbone } => {
                    let nested = record_descriptor(registry, descriptor, key, code, backbone)?;
                    map_items(descriptor, key, element, value, |item| {
                        Record::from_public(registry, &nested, item).map(FieldValue::Record)
                    })?
                }
            };

            if !field_value.is_empty() {
                record.fields.insert(key.clone(), field_value);
            }
        }

        tracing::trace!(
            "Built {} from public JSON with {} fields",
            descriptor.qualified_name(),
            record.len()
        );
        Ok(record)
    }

    /// Build a record from the storage representation. Collapsed polymorphic
    /// values are attached as-is until [`Record::to_public`] expands them.
    pub fn from_storage(
        registry: &TypeRegistry,
        descriptor: &Arc<RecordTypeDescriptor>,
        json: &Value,
    ) -> Result<Record> {
        let object = expect_object(descriptor, json)?;

        let mut record = Record::new(Arc::clone(descriptor));
        for (key, value) in object {
            if value.is_null() {
                continue;
            }

            if descriptor.polymorphic_group(key).is_some() {
                let choice = collapsed_choice(descriptor, key, value)?;
                record.fields.insert(key.clone(), FieldValue::Choice(choice));
                continue;
            }

            if descriptor.logical_name_of(key).is_some() {
                tracing::debug!(
                    "Ignoring expanded field {key} in storage input for {}",
                    descriptor.qualified_name()
                );
                continue;
            }

            let Some(element) = descriptor.field(key) else {
                continue;
            };
            let field_value = storage_value(registry, descriptor, key, element, value)?;
            if !field_value.is_empty() {
                record.fields.insert(key.clone(), field_value);
            }
        }

        tracing::trace!(
            "Built {} from storage JSON with {} fields",
            descriptor.qualified_name(),
            record.len()
        );
        Ok(record)
    }

    /// Convert in place to the storage representation: references become
    /// compact, polymorphic fields collapse to `{logical: {typeCode: value}}`.
    ///
    /// On error the record is left unchanged.
    pub fn to_storage(&mut self) -> Result<&mut Self> {
        let mut staged = self.clone();
        staged.storage_in_place()?;
        *self = staged;
        Ok(self)
    }

    fn storage_in_place(&mut self) -> Result<()> {
        let descriptor = Arc::clone(&self.descriptor);

        for (name, value) in self.fields.iter_mut() {
            let Some(element) = descriptor.field(name) else {
                continue;
            };
            match classify(element) {
                FieldClass::Primitive => {}
                FieldClass::Reference => for_each_item_mut(value, |item| {
                    if let FieldValue::Record(reference) = item {
                        let compact = CompactReference::from_reference(reference)?;
                        *item = FieldValue::Reference(compact);
                    }
                    Ok(())
                })?,
                FieldClass::Resource | FieldClass::Nested { .. } => {
                    for_each_item_mut(value, |item| {
                        if let FieldValue::Record(nested) = item {
                            nested.storage_in_place()?;
                        }
                        Ok(())
                    })?
                }
            }
        }

        self.collapse_polymorphic(&descriptor)
    }

    /// Convert in place back to the public representation. On error the
    /// record is left unchanged.
    pub fn to_public(&mut self, registry: &TypeRegistry) -> Result<&mut Self> {
        let mut staged = self.clone();
        staged.public_in_place(registry)?;
        *self = staged;
        Ok(self)
    }

    fn public_in_place(&mut self, registry: &TypeRegistry) -> Result<()> {
        let descriptor = Arc::clone(&self.descriptor);
        self.expand_polymorphic(registry, &descriptor)?;

        for (name, value) in self.fields.iter_mut() {
            let Some(element) = descriptor.field(name) else {
                continue;
            };
            match classify(element) {
                FieldClass::Primitive => {}
                FieldClass::Reference => for_each_item_mut(value, |item| {
                    match item {
                        FieldValue::Reference(compact) => {
                            let reference = compact.to_reference_record(registry)?;
                            *item = FieldValue::Record(reference);
                        }
                        FieldValue::Record(reference) => {
                            reference.public_in_place(registry)?;
                        }
                        _ => {}
                    }
                    Ok(())
                })?,
                FieldClass::Resource | FieldClass::Nested { .. } => {
                    for_each_item_mut(value, |item| {
                        if let FieldValue::Record(nested) = item {
                            nested.public_in_place(registry)?;
                        }
                        Ok(())
                    })?
                }
            }
        }
        Ok(())
    }

    /// Point every reference that targets `old` at `new`. Returns the number
    /// of rewritten references. An invalid `new` leaves the record unchanged.
    pub fn replace_refs(&mut self, old: &str, new: &str) -> Result<usize> {
        let mut staged = self.clone();
        let replaced = staged.replace_refs_in_place(old, new)?;
        *self = staged;
        Ok(replaced)
    }

    fn replace_refs_in_place(&mut self, old: &str, new: &str) -> Result<usize> {
        let descriptor = Arc::clone(&self.descriptor);
        let mut replaced = 0;
        for (name, value) in self.fields.iter_mut() {
            let is_reference = descriptor
                .field(name)
                .is_some_and(|element| classify(element) == FieldClass::Reference);
            replaced += replace_in_value(value, is_reference, old, new)?;
        }
        Ok(replaced)
    }

    fn collapse_polymorphic(&mut self, descriptor: &RecordTypeDescriptor) -> Result<()> {
        for (logical, group) in descriptor.polymorphic() {
            let present: Vec<&String> = group
                .iter()
                .filter(|concrete| self.fields.contains_key(concrete.as_str()))
                .collect();
            let concrete = match present.as_slice() {
                [] => continue,
                [concrete] => (*concrete).clone(),
                _ => {
                    return Err(FhirSchemaError::polymorphic_conflict(
                        descriptor.qualified_name(),
                        logical.as_str(),
                        present.iter().map(|name| (*name).clone()).collect(),
                    ));
                }
            };
            if self.fields.contains_key(logical.as_str()) {
                return Err(FhirSchemaError::polymorphic_conflict(
                    descriptor.qualified_name(),
                    logical.as_str(),
                    vec![logical.clone(), concrete],
                ));
            }

            let type_code = descriptor
                .field(&concrete)
                .and_then(ElementDefinition::single_type)
                .map(|type_ref| type_ref.code().to_string())
                .ok_or_else(|| FhirSchemaError::not_found(format!("type of {concrete}")))?;
            if let Some(value) = self.fields.shift_remove(concrete.as_str()) {
                self.fields.insert(
                    logical.clone(),
                    FieldValue::Choice(ChoiceValue::new(type_code, value)),
                );
            }
        }
        Ok(())
    }

    fn expand_polymorphic(
        &mut self,
        registry: &TypeRegistry,
        descriptor: &RecordTypeDescriptor,
    ) -> Result<()> {
        for (logical, group) in descriptor.polymorphic() {
            let Some(collapsed) = self.fields.shift_remove(logical.as_str()) else {
                continue;
            };
            let FieldValue::Choice(choice) = collapsed else {
                return Err(FhirSchemaError::invalid_value(
                    descriptor.qualified_name(),
                    logical.as_str(),
                    "expected a collapsed {typeCode: value} object",
                ));
            };

            let concrete = choice.concrete_name(logical);
            let element = descriptor
                .field(&concrete)
                .filter(|_| group.contains(&concrete))
                .ok_or_else(|| {
                    FhirSchemaError::invalid_value(
                        descriptor.qualified_name(),
                        logical.as_str(),
                        format!("type {} is not allowed", choice.type_code),
                    )
                })?;

            let present: Vec<String> = group
                .iter()
                .filter(|name| self.fields.contains_key(name.as_str()))
                .cloned()
                .collect();
            if !present.is_empty() {
                let mut conflicting = vec![logical.clone()];
                conflicting.extend(present);
                return Err(FhirSchemaError::polymorphic_conflict(
                    descriptor.qualified_name(),
                    logical.as_str(),
                    conflicting,
                ));
            }

            // Raw JSON from storage input is rebuilt against the concrete
            // field; values collapsed in memory are already records.
            let value = match *choice.value {
                FieldValue::Primitive(raw) => {
                    storage_value(registry, descriptor, &concrete, element, &raw)?
                }
                built => built,
            };
            self.fields.insert(concrete, value);
        }
        Ok(())
    }
}

fn storage_value(
    registry: &TypeRegistry,
    descriptor: &RecordTypeDescriptor,
    field: &str,
    element: &ElementDefinition,
    value: &Value,
) -> Result<FieldValue> {
    match classify(element) {
        FieldClass::Primitive => Ok(FieldValue::Primitive(value.clone())),
        FieldClass::Resource => map_items(descriptor, field, element, value, |item| {
            registry.from_storage(item, false).map(FieldValue::Record)
        }),
        FieldClass::Reference => map_items(descriptor, field, element, value, |item| {
            CompactReference::from_json(item).map(FieldValue::Reference)
        }),
        FieldClass::Nested { code, backbone } => {
            let nested = record_descriptor(registry, descriptor, field, code, backbone)?;
            map_items(descriptor, field, element, value, |item| {
                Record::from_storage(registry, &nested, item).map(FieldValue::Record)
            })
        }
    }
}

/// Descriptor for a complex or backbone field. Backbone fields resolve to the
/// owner's nested type, falling back to the complex type named by `code`.
fn record_descriptor(
    registry: &TypeRegistry,
    owner: &RecordTypeDescriptor,
    field: &str,
    code: &str,
    backbone: bool,
) -> Result<Arc<RecordTypeDescriptor>> {
    if backbone {
        if let Some(nested) = owner.nested(&pascal_case(field)) {
            return Ok(Arc::clone(nested));
        }
        tracing::warn!(
            "No nested type for backbone field {}.{field}, using {code}",
            owner.qualified_name()
        );
    }
    registry.get(code).map(Arc::clone)
}

fn map_items<F>(
    descriptor: &RecordTypeDescriptor,
    field: &str,
    element: &ElementDefinition,
    value: &Value,
    mut build: F,
) -> Result<FieldValue>
where
    F: FnMut(&Value) -> Result<FieldValue>,
{
    if element.is_array() {
        let items = value.as_array().ok_or_else(|| {
            FhirSchemaError::invalid_value(descriptor.qualified_name(), field, "expected an array")
        })?;
        items
            .iter()
            .map(|item| build(item))
            .collect::<Result<Vec<_>>>()
            .map(FieldValue::List)
    } else if value.is_array() {
        Err(FhirSchemaError::invalid_value(
            descriptor.qualified_name(),
            field,
            "expected a single value",
        ))
    } else {
        build(value)
    }
}

fn for_each_item_mut<F>(value: &mut FieldValue, mut apply: F) -> Result<()>
where
    F: FnMut(&mut FieldValue) -> Result<()>,
{
    match value {
        FieldValue::List(items) => items.iter_mut().try_for_each(|item| apply(item)),
        single => apply(single),
    }
}

fn replace_in_value(value: &mut FieldValue, is_reference: bool, old: &str, new: &str) -> Result<usize> {
    match value {
        FieldValue::Primitive(_) => Ok(0),
        FieldValue::Reference(compact) => {
            if compact.target() != old {
                return Ok(0);
            }
            *compact = CompactReference::parse(new, compact.display.clone())?;
            Ok(1)
        }
        FieldValue::Record(record) => {
            let mut replaced = 0;
            if is_reference
                && record.get("reference").ok().and_then(FieldValue::as_str) == Some(old)
            {
                record.set("reference", new)?;
                replaced += 1;
            }
            Ok(replaced + record.replace_refs_in_place(old, new)?)
        }
        FieldValue::Choice(choice) => {
            let is_reference = choice.type_code == REFERENCE_CODE;
            replace_in_value(&mut choice.value, is_reference, old, new)
        }
        FieldValue::List(items) => items.iter_mut().try_fold(0, |replaced, item| {
            Ok(replaced + replace_in_value(item, is_reference, old, new)?)
        }),
    }
}

fn expect_object<'a>(
    descriptor: &RecordTypeDescriptor,
    json: &'a Value,
) -> Result<&'a Map<String, Value>> {
    json.as_object().ok_or_else(|| {
        FhirSchemaError::invalid_value(
            descriptor.qualified_name(),
            "<root>",
            format!("expected an object, got {json}"),
        )
    })
}

fn reject_polymorphic_conflicts(
    descriptor: &RecordTypeDescriptor,
    object: &Map<String, Value>,
) -> Result<()> {
    let is_set = |key: &str| object.get(key).is_some_and(|v| !v.is_null());
    for (logical, group) in descriptor.polymorphic() {
        let mut present: Vec<String> = group
            .iter()
            .filter(|concrete| is_set(concrete.as_str()))
            .cloned()
            .collect();
        if !present.is_empty() && is_set(logical.as_str()) {
            present.insert(0, logical.clone());
        }
        if present.len() > 1 {
            return Err(FhirSchemaError::polymorphic_conflict(
                descriptor.qualified_name(),
                logical.as_str(),
                present,
            ));
        }
    }
    Ok(())
}

/// `{typeCode: value}` with exactly one entry.
fn collapsed_choice(
    descriptor: &RecordTypeDescriptor,
    logical: &str,
    value: &Value,
) -> Result<ChoiceValue> {
    let invalid = || {
        FhirSchemaError::invalid_value(
            descriptor.qualified_name(),
            logical,
            format!("expected a single-key {{typeCode: value}} object, got {value}"),
        )
    };
    let object = value.as_object().ok_or_else(invalid)?;
    let mut entries = object.iter();
    let (Some((type_code, inner)), None) = (entries.next(), entries.next()) else {
        return Err(invalid());
    };

    let choice = ChoiceValue::new(type_code.clone(), FieldValue::Primitive(inner.clone()));
    let allowed = descriptor
        .polymorphic_group(logical)
        .is_some_and(|group| group.contains(&choice.concrete_name(logical)));
    if !allowed {
        return Err(FhirSchemaError::invalid_value(
            descriptor.qualified_name(),
            logical,
            format!("type {type_code} is not allowed"),
        ));
    }
    Ok(choice)
}
