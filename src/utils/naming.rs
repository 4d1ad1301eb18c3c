use url::Url;

/// Suffix that marks a polymorphic element path, e.g. `Patient.deceased[x]`.
pub const POLYMORPHIC_MARKER: &str = "[x]";

/// Uppercase the first character, leave the rest as is (`dateTime` -> `DateTime`).
pub fn pascal_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Owner segment of a dotted path (`Patient.contact.gender` -> `Patient`).
pub fn resource_from_path(path: &str) -> &str {
    match path.split_once('.') {
        Some((owner, _)) => owner,
        None => path,
    }
}

/// Last path segment of a canonical URL
/// (`http://hl7.org/fhir/StructureDefinition/Patient` -> `Patient`).
pub fn resource_from_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string(),
        Err(_) => url.rsplit('/').next().unwrap_or_default().to_string(),
    }
}

/// Logical name of a polymorphic field, `None` when the marker is absent.
pub fn strip_polymorphic_marker(field: &str) -> Option<&str> {
    field.strip_suffix(POLYMORPHIC_MARKER)
}
