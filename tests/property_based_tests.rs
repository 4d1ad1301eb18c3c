//! Property-based tests for record conversion.
//!
//! Uses proptest to generate public Patient resources and verify:
//! - Storage round trips reproduce the input exactly
//! - Polymorphic groups never hold more than one value
//! - Reference rewriting touches exactly the matching references

mod common;

use fhir_records::*;
use proptest::prelude::*;
use serde_json::{Map, Value, json};

// =============================================================================
// Strategies
// =============================================================================

fn identifier() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9-]{0,11}"
}

fn reference() -> impl Strategy<Value = (String, String)> {
    (
        prop_oneof![Just("Practitioner"), Just("Organization")],
        identifier(),
    )
        .prop_map(|(kind, id)| (kind.to_string(), id))
}

fn reference_json((kind, id): &(String, String), display: Option<&String>) -> Value {
    let mut reference = json!({"reference": format!("{kind}/{id}")});
    if let Some(display) = display {
        reference["display"] = json!(display);
    }
    reference
}

fn deceased() -> impl Strategy<Value = Option<(&'static str, Value)>> {
    prop_oneof![
        Just(None::<(&'static str, Value)>),
        any::<bool>().prop_map(|b| Some(("deceasedBoolean", json!(b)))),
        (1900u32..2024, 1u32..13, 1u32..29).prop_map(|(y, m, d)| {
            Some(("deceasedDateTime", json!(format!("{y:04}-{m:02}-{d:02}"))))
        }),
    ]
}

fn human_name() -> impl Strategy<Value = Value> {
    (
        "[A-Z][a-z]{1,10}",
        prop::collection::vec("[A-Z][a-z]{1,8}", 0..3),
        prop::option::of(prop_oneof![Just("official"), Just("usual")]),
    )
        .prop_map(|(family, given, usage)| {
            let mut name = json!({"family": family});
            if !given.is_empty() {
                name["given"] = json!(given);
            }
            if let Some(usage) = usage {
                name["use"] = json!(usage);
            }
            name
        })
}

fn contact() -> impl Strategy<Value = Value> {
    (
        prop_oneof![Just("male"), Just("female"), Just("unknown")],
        prop::option::of(identifier()),
    )
        .prop_map(|(gender, organization)| {
            let mut contact = json!({"gender": gender});
            if let Some(id) = organization {
                contact["organization"] = json!({"reference": format!("Organization/{id}")});
            }
            contact
        })
}

prop_compose! {
    fn patient()(
        id in identifier(),
        active in prop::option::of(any::<bool>()),
        deceased in deceased(),
        names in prop::collection::vec(human_name(), 0..3),
        practitioners in prop::collection::vec(
            (reference(), prop::option::of("[A-Z][a-z ]{0,12}")),
            0..4,
        ),
        contacts in prop::collection::vec(contact(), 0..3),
    ) -> Value {
        let mut patient = Map::new();
        patient.insert("resourceType".into(), json!("Patient"));
        patient.insert("id".into(), json!(id));
        if let Some(active) = active {
            patient.insert("active".into(), json!(active));
        }
        if let Some((field, value)) = deceased {
            patient.insert(field.into(), value);
        }
        if !names.is_empty() {
            patient.insert("name".into(), json!(names));
        }
        if !practitioners.is_empty() {
            let references: Vec<Value> = practitioners
                .iter()
                .map(|(target, display)| reference_json(target, display.as_ref()))
                .collect();
            patient.insert("generalPractitioner".into(), json!(references));
        }
        if !contacts.is_empty() {
            patient.insert("contact".into(), json!(contacts));
        }
        Value::Object(patient)
    }
}

fn count_references(value: &Value, target: &str) -> usize {
    match value {
        Value::Object(map) => {
            let own = usize::from(map.get("reference").and_then(Value::as_str) == Some(target));
            own + map.values().map(|v| count_references(v, target)).sum::<usize>()
        }
        Value::Array(items) => items.iter().map(|v| count_references(v, target)).sum(),
        _ => 0,
    }
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_storage_round_trip_is_lossless(public in patient()) {
        let registry = common::registry();

        let mut record = registry.from_public(&public).unwrap();
        record.to_storage().unwrap();
        let stored = record.to_json().unwrap();
        let restored = registry.from_storage(&stored, true).unwrap();

        prop_assert_eq!(restored.to_json().unwrap(), public);
    }

    #[test]
    fn prop_storage_form_has_no_expanded_members(public in patient()) {
        let registry = common::registry();

        let mut record = registry.from_public(&public).unwrap();
        record.to_storage().unwrap();
        let stored = record.to_json().unwrap();

        prop_assert!(stored.get("deceasedBoolean").is_none());
        prop_assert!(stored.get("deceasedDateTime").is_none());
        prop_assert_eq!(
            stored.get("deceased").is_some(),
            public.get("deceasedBoolean").is_some() || public.get("deceasedDateTime").is_some()
        );
        if let Some(references) = stored.get("generalPractitioner").and_then(Value::as_array) {
            for reference in references {
                prop_assert!(reference.get("reference").is_none());
                prop_assert!(reference.get("resourceType").is_some());
            }
        }
    }

    #[test]
    fn prop_polymorphic_group_holds_one_value(
        choices in prop::collection::vec(deceased(), 1..6)
    ) {
        let registry = common::registry();
        let mut patient = registry.new_record("Patient").unwrap();

        for (field, value) in choices.iter().flatten() {
            patient.set(field, value.clone()).unwrap();
        }

        let set: Vec<_> = ["deceasedBoolean", "deceasedDateTime"]
            .into_iter()
            .filter(|name| patient.contains(name))
            .collect();
        match choices.iter().flatten().last() {
            Some((field, _)) => prop_assert_eq!(set, vec![*field]),
            None => prop_assert!(set.is_empty()),
        }
    }

    #[test]
    fn prop_replace_refs_counts_matches(public in patient(), target in reference()) {
        let registry = common::registry();
        let old = format!("{}/{}", target.0, target.1);
        let expected = count_references(&public, &old);

        let mut record = registry.from_public(&public).unwrap();
        let replaced = record.replace_refs(&old, "Organization/REPLACED").unwrap();

        prop_assert_eq!(replaced, expected);
        prop_assert_eq!(count_references(&record.to_json().unwrap(), &old), 0);
    }

    #[test]
    fn prop_compact_reference_needs_two_segments(
        segments in prop::collection::vec("[A-Za-z0-9]{0,6}", 1..5)
    ) {
        let reference = segments.join("/");
        let valid = segments.len() == 2 && segments.iter().all(|s| !s.is_empty());

        match CompactReference::parse(&reference, None) {
            Ok(compact) => {
                prop_assert!(valid);
                prop_assert_eq!(compact.target(), reference);
            }
            Err(err) => {
                prop_assert!(!valid);
                let is_invalid_reference = matches!(err, FhirSchemaError::InvalidReference { .. });
                prop_assert!(is_invalid_reference);
            }
        }
    }
}
