//! Named format converters (`date`, `date-time`, ...).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, SecondsFormat};
use serde_json::{Number, Value};

use crate::error::{describe, describe_native, TransformError};
use crate::types::json_type_name;
use crate::value::Native;

type ToNativeFn = dyn Fn(&Value) -> Result<Native, String> + Send + Sync;
type ToWireFn = dyn Fn(&Native) -> Result<Value, String> + Send + Sync;

/// A pair of conversion functions registered under a format name.
#[derive(Clone)]
pub struct FormatConverter {
    name: String,
    to_native: Arc<ToNativeFn>,
    to_wire: Arc<ToWireFn>,
}

impl FormatConverter {
    pub fn new<N, W>(name: impl Into<String>, to_native: N, to_wire: W) -> Self
    where
        N: Fn(&Value) -> Result<Native, String> + Send + Sync + 'static,
        W: Fn(&Native) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            to_native: Arc::new(to_native),
            to_wire: Arc::new(to_wire),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Convert a wire value into its native form.
    pub fn to_native(&self, value: &Value) -> Result<Native, TransformError> {
        (self.to_native)(value).map_err(|message| TransformError::Format {
            format: self.name.clone(),
            value: describe(value),
            message,
        })
    }

    /// Convert a native value into its wire form.
    pub fn to_wire(&self, value: &Native) -> Result<Value, TransformError> {
        (self.to_wire)(value).map_err(|message| TransformError::Format {
            format: self.name.clone(),
            value: describe_native(value),
            message,
        })
    }
}

impl fmt::Debug for FormatConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatConverter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Format converters keyed by format name.
///
/// [`FormatRegistry::default`] carries the built-in formats; user formats
/// registered under the same name replace them.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: HashMap<String, FormatConverter>,
}

impl FormatRegistry {
    /// A registry without any formats.
    pub fn empty() -> Self {
        Self {
            formats: HashMap::new(),
        }
    }

    pub fn register(&mut self, converter: FormatConverter) -> &mut Self {
        self.formats.insert(converter.name.clone(), converter);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, converter: FormatConverter) -> Self {
        self.register(converter);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FormatConverter> {
        self.formats.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formats.keys().map(String::as_str)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::empty()
            .with(date())
            .with(date_time())
            .with(integer("int32", i32::MIN.into(), i32::MAX.into()))
            .with(integer("int64", i64::MIN, i64::MAX))
            .with(float("float"))
            .with(float("double"))
    }
}

fn date() -> FormatConverter {
    FormatConverter::new(
        "date",
        |value| {
            let s = expect_str(value)?;
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Native::Date)
                .map_err(|e| e.to_string())
        },
        |native| match native {
            Native::Date(d) => Ok(Value::String(d.format("%Y-%m-%d").to_string())),
            Native::DateTime(dt) => Ok(Value::String(dt.date_naive().format("%Y-%m-%d").to_string())),
            Native::String(s) => Ok(Value::String(s.clone())),
            other => Err(format!("expected date, got {}", other.type_name())),
        },
    )
}

fn date_time() -> FormatConverter {
    FormatConverter::new(
        "date-time",
        |value| {
            let s = expect_str(value)?;
            DateTime::parse_from_rfc3339(s)
                .map(Native::DateTime)
                .map_err(|e| e.to_string())
        },
        |native| match native {
            Native::DateTime(dt) => Ok(Value::String(
                dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            )),
            Native::String(s) => Ok(Value::String(s.clone())),
            other => Err(format!("expected date-time, got {}", other.type_name())),
        },
    )
}

fn integer(name: &'static str, min: i64, max: i64) -> FormatConverter {
    let check = move |n: &Number| -> Result<Number, String> {
        match n.as_i64() {
            Some(i) if (min..=max).contains(&i) => Ok(n.clone()),
            Some(i) => Err(format!("{} is out of range for {}", i, name)),
            None => Err(format!("{} is not an integer", n)),
        }
    };
    FormatConverter::new(
        name,
        move |value| match value {
            Value::Number(n) => check(n).map(Native::Number),
            other => Err(format!("expected number, got {}", json_type_name(other))),
        },
        move |native| match native {
            Native::Number(n) => check(n).map(Value::Number),
            other => Err(format!("expected number, got {}", other.type_name())),
        },
    )
}

fn float(name: &'static str) -> FormatConverter {
    let widen = |n: &Number| -> Result<Number, String> {
        n.as_f64()
            .and_then(Number::from_f64)
            .ok_or_else(|| format!("{} is not a finite number", n))
    };
    FormatConverter::new(
        name,
        move |value| match value {
            Value::Number(n) => widen(n).map(Native::Number),
            other => Err(format!("expected number, got {}", json_type_name(other))),
        },
        move |native| match native {
            Native::Number(n) => widen(n).map(Value::Number),
            other => Err(format!("expected number, got {}", other.type_name())),
        },
    )
}

fn expect_str(value: &Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected string, got {}", json_type_name(value)))
}
