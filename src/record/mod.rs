//! Runtime records.
//!
//! A [`Record`] is an ordered field map bound to one [`RecordTypeDescriptor`].
//! Every write goes through the descriptor: undeclared fields are rejected,
//! empty values remove the field, and setting one member of a polymorphic
//! group clears the others.

mod convert;
mod reference;

pub use reference::CompactReference;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::registry::{RESOURCE_TYPE_KEY, RecordTypeDescriptor};
use crate::types::ElementDefinition;
use crate::utils::pascal_case;
use crate::{FhirSchemaError, Result};

#[derive(Debug, Clone)]
pub struct Record {
    descriptor: Arc<RecordTypeDescriptor>,
    fields: IndexMap<String, FieldValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// JSON literal, copied verbatim (arrays of primitives included).
    Primitive(Value),
    Record(Record),
    Reference(CompactReference),
    /// Collapsed polymorphic value, `{typeCode: value}` in storage form.
    Choice(ChoiceValue),
    List(Vec<FieldValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceValue {
    pub type_code: String,
    pub value: Box<FieldValue>,
}

impl Record {
    pub fn new(descriptor: Arc<RecordTypeDescriptor>) -> Self {
        Self {
            descriptor,
            fields: IndexMap::new(),
        }
    }

    pub fn descriptor(&self) -> &Arc<RecordTypeDescriptor> {
        &self.descriptor
    }

    pub fn type_name(&self) -> &str {
        self.descriptor.name()
    }

    /// The discriminant, for resources only.
    pub fn resource_type(&self) -> Option<&str> {
        self.descriptor
            .is_resource()
            .then(|| self.descriptor.name())
    }

    /// Read a field. A polymorphic logical name resolves to its collapsed
    /// value or to whichever concrete member is set.
    pub fn get(&self, name: &str) -> Result<&FieldValue> {
        let key = self.resolve_key(name)?;
        self.fields
            .get(key)
            .ok_or_else(|| self.missing(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut FieldValue> {
        let key = self.resolve_key(name)?.to_string();
        let missing = self.missing(name);
        self.fields.get_mut(&key).ok_or(missing)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Assign a declared field. Empty values (null, `[]`) remove it.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        let descriptor = Arc::clone(&self.descriptor);
        let element = descriptor
            .field(name)
            .ok_or_else(|| FhirSchemaError::unknown_field(descriptor.qualified_name(), name))?;

        let value = value.into();
        if value.is_empty() {
            self.fields.shift_remove(name);
            return Ok(());
        }
        check_value(&descriptor, name, element, &value)?;

        if let Some(logical) = descriptor.logical_name_of(name) {
            self.fields.shift_remove(logical);
            if let Some(group) = descriptor.polymorphic_group(logical) {
                for sibling in group.iter().filter(|sibling| sibling.as_str() != name) {
                    self.fields.shift_remove(sibling);
                }
            }
        }

        self.fields.insert(name.to_string(), value);
        Ok(())
    }

    /// Remove a field, or every member of a polymorphic group.
    pub fn unset(&mut self, name: &str) -> Result<Option<FieldValue>> {
        if let Some(group) = self.descriptor.polymorphic_group(name) {
            let group = group.clone();
            let mut removed = self.fields.shift_remove(name);
            for concrete in &group {
                if let Some(value) = self.fields.shift_remove(concrete) {
                    removed = Some(value);
                }
            }
            return Ok(removed);
        }

        if !self.descriptor.has_field(name) {
            return Err(FhirSchemaError::unknown_field(
                self.descriptor.qualified_name(),
                name,
            ));
        }
        Ok(self.fields.shift_remove(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Storage key for `name`: the collapsed or present concrete key of a
    /// polymorphic group, or the declared field itself.
    fn resolve_key<'a>(&'a self, name: &'a str) -> Result<&'a str> {
        if let Some(group) = self.descriptor.polymorphic_group(name) {
            if self.fields.contains_key(name) {
                return Ok(name);
            }
            return group
                .iter()
                .find(|concrete| self.fields.contains_key(concrete.as_str()))
                .map(String::as_str)
                .ok_or_else(|| self.missing(name));
        }
        if self.descriptor.has_field(name) {
            Ok(name)
        } else {
            Err(self.missing(name))
        }
    }

    fn missing(&self, name: &str) -> FhirSchemaError {
        FhirSchemaError::not_found(format!(
            "field {name} on {}",
            self.descriptor.qualified_name()
        ))
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.qualified_name() == other.descriptor.qualified_name()
            && self.fields == other.fields
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let discriminant = self.resource_type();
        let len = self.fields.len() + usize::from(discriminant.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(resource_type) = discriminant {
            map.serialize_entry(RESOURCE_TYPE_KEY, resource_type)?;
        }
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl FieldValue {
    /// Null and empty arrays count as "no value".
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Primitive(Value::Null) => true,
            FieldValue::Primitive(Value::Array(items)) => items.is_empty(),
            FieldValue::List(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn as_primitive(&self) -> Option<&Value> {
        match self {
            FieldValue::Primitive(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_primitive().and_then(Value::as_str)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_primitive().and_then(Value::as_bool)
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            FieldValue::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            FieldValue::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&CompactReference> {
        match self {
            FieldValue::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<&ChoiceValue> {
        match self {
            FieldValue::Choice(choice) => Some(choice),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<FieldValue>> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// List item, or the value itself at index 0 for single values.
    pub fn item(&self, index: usize) -> Option<&FieldValue> {
        match self {
            FieldValue::List(items) => items.get(index),
            single => (index == 0).then_some(single),
        }
    }
}

impl ChoiceValue {
    pub fn new(type_code: impl Into<String>, value: FieldValue) -> Self {
        Self {
            type_code: type_code.into(),
            value: Box::new(value),
        }
    }

    /// Concrete field name this value expands to under `logical`.
    pub fn concrete_name(&self, logical: &str) -> String {
        format!("{logical}{}", pascal_case(&self.type_code))
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Primitive(value) => value.serialize(serializer),
            FieldValue::Record(record) => record.serialize(serializer),
            FieldValue::Reference(reference) => reference.serialize(serializer),
            FieldValue::Choice(choice) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(&choice.type_code, choice.value.as_ref())?;
                map.end()
            }
            FieldValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Primitive(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Primitive(Value::String(value.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Primitive(Value::String(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Primitive(Value::Bool(value))
    }
}

impl From<Record> for FieldValue {
    fn from(record: Record) -> Self {
        FieldValue::Record(record)
    }
}

impl From<CompactReference> for FieldValue {
    fn from(reference: CompactReference) -> Self {
        FieldValue::Reference(reference)
    }
}

impl From<Vec<Record>> for FieldValue {
    fn from(records: Vec<Record>) -> Self {
        FieldValue::List(records.into_iter().map(FieldValue::Record).collect())
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(items: Vec<FieldValue>) -> Self {
        FieldValue::List(items)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Primitive(Value::Null), Into::into)
    }
}

/// Cardinality and type membership of a value about to be stored.
fn check_value(
    descriptor: &RecordTypeDescriptor,
    name: &str,
    element: &ElementDefinition,
    value: &FieldValue,
) -> Result<()> {
    let invalid = |message: String| {
        FhirSchemaError::invalid_value(descriptor.qualified_name(), name, message)
    };

    let count = match value {
        FieldValue::List(items) => Some(items.len()),
        FieldValue::Primitive(Value::Array(items)) => Some(items.len()),
        _ => None,
    };
    let items: Vec<&FieldValue> = match value {
        FieldValue::List(items) => items.iter().collect(),
        single => vec![single],
    };

    match (count, element.max) {
        (Some(_), Some(1)) => return Err(invalid("expected a single value".to_string())),
        (None, max) if max != Some(1) => return Err(invalid("expected an array".to_string())),
        (Some(count), Some(max)) if count > max as usize => {
            return Err(invalid(format!("{count} values exceed max {max}")));
        }
        _ => {}
    }

    let Some(type_ref) = element.single_type() else {
        return Ok(());
    };

    for item in items {
        let accepted = match item {
            FieldValue::Primitive(_) => type_ref.is_primitive() && !type_ref.is_resource(),
            FieldValue::Reference(_) => type_ref.is_reference(),
            FieldValue::Record(record) => {
                let item_descriptor = record.descriptor();
                if type_ref.is_resource() {
                    item_descriptor.is_resource()
                } else if type_ref.is_backbone() {
                    match descriptor.nested(&pascal_case(name)) {
                        Some(nested) => {
                            item_descriptor.qualified_name() == nested.qualified_name()
                        }
                        None => item_descriptor.name() == type_ref.code(),
                    }
                } else {
                    item_descriptor.name() == type_ref.code()
                }
            }
            FieldValue::Choice(_) | FieldValue::List(_) => false,
        };
        if !accepted {
            return Err(invalid(format!("value is not a {}", type_ref.code())));
        }
    }
    Ok(())
}
