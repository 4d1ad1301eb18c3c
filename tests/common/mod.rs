use std::sync::{Arc, Once, OnceLock};

use fhir_records::*;
use serde_json::Value;

pub const RESOURCE_BUNDLE: &str = include_str!("../fixtures/profiles-resources.json");
pub const TYPE_BUNDLE: &str = include_str!("../fixtures/profiles-types.json");

static TRACING: Once = Once::new();

/// Route library logs to the test harness; `RUST_LOG` selects the level.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[allow(dead_code)]
pub fn resource_bundle() -> Value {
    serde_json::from_str(RESOURCE_BUNDLE).unwrap()
}

#[allow(dead_code)]
pub fn type_bundle() -> Value {
    serde_json::from_str(TYPE_BUNDLE).unwrap()
}

#[allow(dead_code)]
pub fn load_definitions(config: &FhirRecordsConfig) -> Definitions {
    init_tracing();
    Definitions::from_bundles(&resource_bundle(), &type_bundle(), config).unwrap()
}

/// Registry over the fixture bundles with the default configuration.
#[allow(dead_code)]
pub fn registry() -> Arc<TypeRegistry> {
    static REGISTRY: OnceLock<Arc<TypeRegistry>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| {
            Arc::new(TypeRegistry::build(load_definitions(
                &FhirRecordsConfig::default(),
            )))
        })
        .clone()
}

/// Follow a `field[.index].field` path through nested records.
#[allow(dead_code)]
pub fn field_at<'a>(record: &'a Record, path: &str) -> &'a FieldValue {
    let mut segments = path.split('.').peekable();
    let mut current = record;
    loop {
        let name = segments.next().unwrap();
        let mut value = current.get(name).unwrap();
        if let Some(index) = segments.peek().and_then(|s| s.parse::<usize>().ok()) {
            segments.next();
            value = value.item(index).unwrap();
        }
        if segments.peek().is_none() {
            return value;
        }
        current = value.as_record().unwrap();
    }
}
