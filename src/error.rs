use thiserror::Error;

#[derive(Error, Debug)]
pub enum FhirSchemaError {
    /// Schema input is missing keys the compiler needs. Aborts the whole load.
    #[error("Malformed schema: {message}")]
    MalformedSchema { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Path does not point to an element: {path}")]
    InvalidPath { path: String },

    #[error("Unknown field {field} on {type_name}")]
    UnknownField { type_name: String, field: String },

    #[error("Invalid reference: {reference}")]
    InvalidReference { reference: String },

    #[error("Polymorphic conflict on {type_name}.{field}: {present:?} are set together")]
    PolymorphicConflict {
        type_name: String,
        field: String,
        present: Vec<String>,
    },

    #[error("Invalid value for {type_name}.{field}: {message}")]
    InvalidValue {
        type_name: String,
        field: String,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FhirSchemaError>;

impl FhirSchemaError {
    pub fn malformed_schema<S: Into<String>>(message: S) -> Self {
        Self::MalformedSchema {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn invalid_path<S: Into<String>>(path: S) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    pub fn unknown_field(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            type_name: type_name.into(),
            field: field.into(),
        }
    }

    pub fn invalid_reference<S: Into<String>>(reference: S) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
        }
    }

    pub fn polymorphic_conflict(
        type_name: impl Into<String>,
        field: impl Into<String>,
        present: Vec<String>,
    ) -> Self {
        Self::PolymorphicConflict {
            type_name: type_name.into(),
            field: field.into(),
            present,
        }
    }

    pub fn invalid_value(
        type_name: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            type_name: type_name.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
