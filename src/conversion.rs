//! Transformation directions.
//!
//! The compiler is generic over a [`Conversion`], which says how to read the
//! input side and build the output side. [`Unmarshal`] reads wire values and
//! builds [`Native`] values; [`Marshal`] is its mirror.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::cache::CompilationCache;
use crate::error::{describe, describe_native, TransformError};
use crate::format::FormatConverter;
use crate::spec::Spec;
use crate::types::json_type_name;
use crate::value::{Model, Native};

/// A compiled transformation function.
pub type Transform<C> = Arc<
    dyn Fn(&<C as Conversion>::Input) -> Result<<C as Conversion>::Output, TransformError>
        + Send
        + Sync,
>;

/// One direction of transformation.
pub trait Conversion: Sized + Send + Sync + 'static {
    type Input: Send + Sync + 'static;
    type Output: Send + Sync + 'static;

    /// Direction name used in logs.
    const NAME: &'static str;

    /// The spec-owned cache for this direction.
    fn cache(spec: &Spec) -> &CompilationCache<Self>;

    fn is_null(value: &Self::Input) -> bool;

    fn null() -> Self::Output;

    /// A declared schema default, returned without further conversion.
    fn from_default(default: &Value) -> Self::Output;

    /// The value unchanged, re-expressed on the output side.
    fn passthrough(value: &Self::Input) -> Self::Output;

    fn type_name(value: &Self::Input) -> &'static str;

    fn describe(value: &Self::Input) -> String;

    fn as_list(value: &Self::Input) -> Option<&[Self::Input]>;

    fn list(items: Vec<Self::Output>) -> Self::Output;

    /// Entries of a mapping-like input, or `None` if it isn't one.
    fn entries(value: &Self::Input) -> Option<Vec<(&str, &Self::Input)>>;

    fn as_str(value: &Self::Input) -> Option<&str>;

    /// Build an object; `model` is set when a typed result was requested.
    fn object(model: Option<&str>, fields: IndexMap<String, Self::Output>) -> Self::Output;

    fn convert_format(
        converter: &FormatConverter,
        value: &Self::Input,
    ) -> Result<Self::Output, TransformError>;
}

/// Wire → native.
#[derive(Debug, Clone, Copy)]
pub struct Unmarshal;

/// Native → wire.
#[derive(Debug, Clone, Copy)]
pub struct Marshal;

impl Conversion for Unmarshal {
    type Input = Value;
    type Output = Native;

    const NAME: &'static str = "unmarshal";

    fn cache(spec: &Spec) -> &CompilationCache<Self> {
        &spec.unmarshal_cache
    }

    fn is_null(value: &Value) -> bool {
        value.is_null()
    }

    fn null() -> Native {
        Native::Null
    }

    fn from_default(default: &Value) -> Native {
        Native::from(default)
    }

    fn passthrough(value: &Value) -> Native {
        Native::from(value)
    }

    fn type_name(value: &Value) -> &'static str {
        json_type_name(value)
    }

    fn describe(value: &Value) -> String {
        describe(value)
    }

    fn as_list(value: &Value) -> Option<&[Value]> {
        value.as_array().map(Vec::as_slice)
    }

    fn list(items: Vec<Native>) -> Native {
        Native::List(items)
    }

    fn entries(value: &Value) -> Option<Vec<(&str, &Value)>> {
        value
            .as_object()
            .map(|map| map.iter().map(|(k, v)| (k.as_str(), v)).collect())
    }

    fn as_str(value: &Value) -> Option<&str> {
        value.as_str()
    }

    fn object(model: Option<&str>, fields: IndexMap<String, Native>) -> Native {
        match model {
            Some(name) => Native::Model(Model::new(name, fields)),
            None => Native::Map(fields),
        }
    }

    fn convert_format(converter: &FormatConverter, value: &Value) -> Result<Native, TransformError> {
        converter.to_native(value)
    }
}

impl Conversion for Marshal {
    type Input = Native;
    type Output = Value;

    const NAME: &'static str = "marshal";

    fn cache(spec: &Spec) -> &CompilationCache<Self> {
        &spec.marshal_cache
    }

    fn is_null(value: &Native) -> bool {
        value.is_null()
    }

    fn null() -> Value {
        Value::Null
    }

    fn from_default(default: &Value) -> Value {
        default.clone()
    }

    fn passthrough(value: &Native) -> Value {
        value.to_wire()
    }

    fn type_name(value: &Native) -> &'static str {
        value.type_name()
    }

    fn describe(value: &Native) -> String {
        describe_native(value)
    }

    fn as_list(value: &Native) -> Option<&[Native]> {
        match value {
            Native::List(items) => Some(items),
            _ => None,
        }
    }

    fn list(items: Vec<Value>) -> Value {
        Value::Array(items)
    }

    fn entries(value: &Native) -> Option<Vec<(&str, &Native)>> {
        let map = match value {
            Native::Map(map) => map,
            Native::Model(model) => model.properties(),
            _ => return None,
        };
        Some(map.iter().map(|(k, v)| (k.as_str(), v)).collect())
    }

    fn as_str(value: &Native) -> Option<&str> {
        value.as_str()
    }

    fn object(_model: Option<&str>, fields: IndexMap<String, Value>) -> Value {
        Value::Object(fields.into_iter().collect::<Map<String, Value>>())
    }

    fn convert_format(converter: &FormatConverter, value: &Native) -> Result<Value, TransformError> {
        converter.to_wire(value)
    }
}
