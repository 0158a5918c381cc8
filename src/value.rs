//! Native (unmarshaled) value representation.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

/// A value after unmarshaling.
///
/// Mirrors the wire shapes of [`Value`] and adds the typed forms produced by
/// format converters and bound models.
#[derive(Debug, Clone, PartialEq)]
pub enum Native {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    List(Vec<Native>),
    Map(IndexMap<String, Native>),
    Model(Model),
}

/// An instance of a named model.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    name: String,
    properties: IndexMap<String, Native>,
}

impl Model {
    pub fn new(name: impl Into<String>, properties: IndexMap<String, Native>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    /// Name of the model this instance was built from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, property: &str) -> Option<&Native> {
        self.properties.get(property)
    }

    pub fn properties(&self) -> &IndexMap<String, Native> {
        &self.properties
    }
}

impl Native {
    pub fn is_null(&self) -> bool {
        matches!(self, Native::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Native::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&Model> {
        match self {
            Native::Model(model) => Some(model),
            _ => None,
        }
    }

    /// Property lookup on maps and models.
    pub fn get(&self, key: &str) -> Option<&Native> {
        match self {
            Native::Map(map) => map.get(key),
            Native::Model(model) => model.get(key),
            _ => None,
        }
    }

    /// Type name for error messages, in the vocabulary of [`json_type_name`](crate::json_type_name).
    pub fn type_name(&self) -> &'static str {
        match self {
            Native::Null => "null",
            Native::Bool(_) => "boolean",
            Native::Number(_) => "number",
            Native::String(_) => "string",
            Native::Date(_) => "date",
            Native::DateTime(_) => "date-time",
            Native::List(_) => "array",
            Native::Map(_) => "object",
            Native::Model(_) => "model",
        }
    }

    /// Render as a wire value without consulting any schema.
    ///
    /// Dates use ISO-8601 and models flatten to plain objects.
    pub fn to_wire(&self) -> Value {
        match self {
            Native::Null => Value::Null,
            Native::Bool(b) => Value::Bool(*b),
            Native::Number(n) => Value::Number(n.clone()),
            Native::String(s) => Value::String(s.clone()),
            Native::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Native::DateTime(dt) => {
                Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Native::List(items) => Value::Array(items.iter().map(Native::to_wire).collect()),
            Native::Map(map) => Value::Object(wire_object(map)),
            Native::Model(model) => Value::Object(wire_object(&model.properties)),
        }
    }
}

fn wire_object(map: &IndexMap<String, Native>) -> Map<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), v.to_wire())).collect()
}

impl From<Value> for Native {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Native::Null,
            Value::Bool(b) => Native::Bool(b),
            Value::Number(n) => Native::Number(n),
            Value::String(s) => Native::String(s),
            Value::Array(items) => Native::List(items.into_iter().map(Native::from).collect()),
            Value::Object(map) => {
                Native::Map(map.into_iter().map(|(k, v)| (k, Native::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for Native {
    fn from(value: &Value) -> Self {
        Native::from(value.clone())
    }
}

impl From<&str> for Native {
    fn from(s: &str) -> Self {
        Native::String(s.to_string())
    }
}

impl From<Model> for Native {
    fn from(model: Model) -> Self {
        Native::Model(model)
    }
}
