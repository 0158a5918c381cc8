//! Error types for spec loading, value transformation and validation.

use std::path::PathBuf;
use thiserror::Error;

use serde_json::Value;

use crate::value::Native;

/// Longest rendering of an offending value kept in an error message.
const MAX_VALUE_LEN: usize = 200;

/// Errors while loading a spec document and building its schema graph.
#[derive(Debug, Error)]
pub enum SpecError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    // Schema errors (exit code 2)
    #[error("cannot resolve $ref \"{reference}\" at {path}")]
    UnresolvableRef { path: String, reference: String },

    #[error("invalid schema at {path}: {message}")]
    InvalidSchema { path: String, message: String },

    #[error("unknown schema \"{name}\": not a definition name or JSON pointer in this spec")]
    UnknownSchema { name: String },
}

impl SpecError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SpecError::FileNotFound { .. } | SpecError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            SpecError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors raised while a compiled transform runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("expected list like type for {schema}, got {actual}: {value}")]
    NotAList {
        schema: String,
        actual: &'static str,
        value: String,
    },

    #[error("expected object for value {value} to map to {model}, got {actual} instead")]
    NotAnObject {
        model: String,
        actual: &'static str,
        value: String,
    },

    #[error("spec {schema} is a required value")]
    NullNotAllowed { schema: String },

    #[error("don't know how to transform value {value} with a type of {type_name}")]
    UnknownType { type_name: String, value: String },

    #[error("unknown model {model} when trying to transform {value}")]
    UnknownModel { model: String, value: String },

    #[error("transform for schema {schema} was used after its spec was dropped")]
    Detached { schema: String },

    #[error("invalid {format} value {value}: {message}")]
    Format {
        format: String,
        value: String,
        message: String,
    },
}

impl TransformError {
    /// True for errors caused by a value whose shape does not match its schema.
    pub fn is_mapping_error(&self) -> bool {
        matches!(
            self,
            TransformError::NotAList { .. }
                | TransformError::NotAnObject { .. }
                | TransformError::NullNotAllowed { .. }
                | TransformError::UnknownType { .. }
        )
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors during validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Spec(e) => e.exit_code(),
            ValidateError::Invalid { .. } => 1,
        }
    }
}

/// Single validation error with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid field.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors from the validate-and-transform helpers.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error(transparent)]
    Validate(#[from] ValidateError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl PayloadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            PayloadError::Validate(e) => e.exit_code(),
            PayloadError::Transform(e) => e.exit_code(),
        }
    }
}

/// Compact rendering of a wire value for error messages.
pub(crate) fn describe(value: &Value) -> String {
    truncate(value.to_string())
}

/// Compact rendering of a native value for error messages.
pub(crate) fn describe_native(value: &Native) -> String {
    truncate(value.to_wire().to_string())
}

fn truncate(mut rendered: String) -> String {
    if rendered.len() > MAX_VALUE_LEN {
        let mut cut = MAX_VALUE_LEN;
        while !rendered.is_char_boundary(cut) {
            cut -= 1;
        }
        rendered.truncate(cut);
        rendered.push_str("...");
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spec_error_exit_codes() {
        let err = SpecError::FileNotFound {
            path: PathBuf::from("swagger.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = SpecError::UnresolvableRef {
            path: "/definitions/Pet".into(),
            reference: "other.json#/Pet".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn validate_error_exit_codes() {
        let err = ValidateError::Invalid {
            errors: vec![SchemaError {
                path: "/id".into(),
                message: "missing required field".into(),
            }],
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn mapping_error_classification() {
        let err = TransformError::NullNotAllowed {
            schema: "Pet".into(),
        };
        assert!(err.is_mapping_error());

        let err = TransformError::UnknownModel {
            model: "Ghost".into(),
            value: "{}".into(),
        };
        assert!(!err.is_mapping_error());
    }

    #[test]
    fn not_an_object_display() {
        let err = TransformError::NotAnObject {
            model: "Pet".into(),
            actual: "string",
            value: describe(&json!("rex")),
        };
        assert_eq!(
            err.to_string(),
            r#"expected object for value "rex" to map to Pet, got string instead"#
        );
    }

    #[test]
    fn describe_truncates_long_values() {
        let long = json!("x".repeat(500));
        let rendered = describe(&long);
        assert!(rendered.len() <= MAX_VALUE_LEN + 3);
        assert!(rendered.ends_with("..."));
    }
}
