//! Schema Transform
//!
//! Compiles the schemas of a Swagger / OpenAPI document into reusable
//! transformation functions that convert wire payloads (`serde_json::Value`)
//! into native values and back.
//!
//! Transforms are compiled lazily, once per schema node, and cached on the
//! [`Spec`]. Recursive and mutually recursive schemas are supported.
//!
//! # Example
//!
//! ```
//! use schema_transform::{unmarshal, Native, Spec, SpecConfig};
//! use serde_json::json;
//!
//! let spec = Spec::from_value(
//!     json!({
//!         "definitions": {
//!             "Pet": {
//!                 "type": "object",
//!                 "required": ["name"],
//!                 "discriminator": "type",
//!                 "properties": {
//!                     "name": { "type": "string" },
//!                     "type": { "type": "string" }
//!                 }
//!             },
//!             "Dog": {
//!                 "allOf": [
//!                     { "$ref": "#/definitions/Pet" },
//!                     { "properties": { "birth_date": { "type": "string", "format": "date" } } }
//!                 ]
//!             }
//!         }
//!     }),
//!     SpecConfig::default(),
//! )
//! .unwrap();
//!
//! let pet = spec.definition_schema("Pet").unwrap();
//! let value = unmarshal(
//!     &spec,
//!     pet,
//!     &json!({ "name": "Rex", "type": "Dog", "birth_date": "2019-05-01" }),
//! )
//! .unwrap();
//!
//! // The discriminator selected the Dog model, so the date was parsed.
//! assert_eq!(value.as_model().unwrap().name(), "Dog");
//! assert!(matches!(value.get("birth_date"), Some(Native::Date(_))));
//! ```
//!
//! # Null handling
//!
//! | Input | Schema | Result |
//! |-------|--------|--------|
//! | null | has `default` | the default, unconverted |
//! | null | required, not nullable | `TransformError::NullNotAllowed` |
//! | null | otherwise | null |
//! | non-null | any | converted by the schema's kind |

mod cache;
mod compiler;
mod config;
mod conversion;
mod error;
mod format;
mod loader;
mod spec;
mod types;
mod validator;
mod value;

pub use cache::{CacheKey, CompilationCache};
pub use compiler::{get_transform, marshal, transform, unmarshal};
pub use config::SpecConfig;
pub use conversion::{Conversion, Marshal, Transform, Unmarshal};
pub use error::{PayloadError, SchemaError, SpecError, TransformError, ValidateError};
pub use format::{FormatConverter, FormatRegistry};
pub use loader::{is_url, load_spec, load_spec_auto, load_spec_str, navigate_fragment};
pub use spec::Spec;
pub use types::{
    json_type_name, ModelDescriptor, PrimitiveType, SchemaId, SchemaKind, SchemaNode,
};
pub use validator::{marshal_request, unmarshal_response, validate};
pub use value::{Model, Native};

#[cfg(feature = "remote")]
pub use loader::load_spec_url;
