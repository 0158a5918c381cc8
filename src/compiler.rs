//! Schema-driven transform compiler.
//!
//! [`get_transform`] turns a schema node into a reusable [`Transform`] for one
//! [`Conversion`] direction. Compilation walks the schema graph once; running
//! the transform walks the value once.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::conversion::{Conversion, Marshal, Transform, Unmarshal};
use crate::error::TransformError;
use crate::spec::Spec;
use crate::types::{SchemaId, SchemaKind, SchemaNode};
use crate::value::Native;

/// Compiled transform for `schema`, built at most once per `(schema, required)`.
///
/// `required` selects how a null input is treated when the schema declares no
/// default: required values reject it, optional ones map it to null.
pub fn get_transform<C: Conversion>(spec: &Spec, schema: SchemaId, required: bool) -> Transform<C> {
    let schema = spec.deref(schema);
    C::cache(spec).get_or_compile((schema, required), || compile::<C>(spec, schema, required))
}

/// Transform `value` under `schema` in direction `C`.
pub fn transform<C: Conversion>(
    spec: &Spec,
    schema: SchemaId,
    value: &C::Input,
) -> Result<C::Output, TransformError> {
    get_transform::<C>(spec, schema, true)(value)
}

/// Convert a wire value into its native form.
///
/// # Errors
///
/// Returns a [`TransformError`] when the value's shape doesn't match the schema.
pub fn unmarshal(spec: &Spec, schema: SchemaId, value: &Value) -> Result<Native, TransformError> {
    transform::<Unmarshal>(spec, schema, value)
}

/// Convert a native value into its wire form.
///
/// # Errors
///
/// Returns a [`TransformError`] when the value's shape doesn't match the schema.
pub fn marshal(spec: &Spec, schema: SchemaId, value: &Native) -> Result<Value, TransformError> {
    transform::<Marshal>(spec, schema, value)
}

fn compile<C: Conversion>(spec: &Spec, schema: SchemaId, required: bool) -> Transform<C> {
    let node = spec.node(schema);
    tracing::debug!(
        direction = C::NAME,
        schema = %node.label(),
        kind = node.kind.name(),
        required,
        "compiling transform"
    );

    let core = match &node.kind {
        SchemaKind::Primitive { format, .. } => primitive::<C>(spec, format.as_deref()),
        SchemaKind::Array { items } => array::<C>(spec, node, *items),
        SchemaKind::Object {
            properties,
            required: required_properties,
            model,
            ..
        } => object::<C>(spec, node, properties, required_properties, model.as_deref()),
        SchemaKind::File => identity::<C>(),
        SchemaKind::Untyped => return identity::<C>(),
        SchemaKind::Unknown(type_name) => return unknown_type::<C>(type_name.clone()),
        SchemaKind::Ref(target) => return get_transform::<C>(spec, *target, required),
    };
    with_null_policy::<C>(node, required, core)
}

/// Shared handling of null input, applied around every typed compiler.
fn with_null_policy<C: Conversion>(
    node: &SchemaNode,
    required: bool,
    core: Transform<C>,
) -> Transform<C> {
    let default = node.default.clone();
    let reject_null = required && !node.nullable;
    let label = node.label();

    Arc::new(move |value: &C::Input| {
        if !C::is_null(value) {
            return core(value);
        }
        match &default {
            Some(default) => Ok(C::from_default(default)),
            None if reject_null => Err(TransformError::NullNotAllowed {
                schema: label.clone(),
            }),
            None => Ok(C::null()),
        }
    })
}

fn identity<C: Conversion>() -> Transform<C> {
    Arc::new(|value: &C::Input| Ok(C::passthrough(value)))
}

fn unknown_type<C: Conversion>(type_name: String) -> Transform<C> {
    Arc::new(move |value: &C::Input| {
        Err(TransformError::UnknownType {
            type_name: type_name.clone(),
            value: C::describe(value),
        })
    })
}

fn unknown_model<C: Conversion>(model: String) -> Transform<C> {
    Arc::new(move |value: &C::Input| {
        Err(TransformError::UnknownModel {
            model: model.clone(),
            value: C::describe(value),
        })
    })
}

fn primitive<C: Conversion>(spec: &Spec, format: Option<&str>) -> Transform<C> {
    match format.and_then(|name| spec.get_format(name)) {
        Some(converter) => {
            let converter = converter.clone();
            Arc::new(move |value: &C::Input| C::convert_format(&converter, value))
        }
        None => identity::<C>(),
    }
}

fn array<C: Conversion>(spec: &Spec, node: &SchemaNode, items: Option<SchemaId>) -> Transform<C> {
    let Some(items) = items else {
        return identity::<C>();
    };
    let item = get_transform::<C>(spec, items, true);
    let label = node.label();

    Arc::new(move |value: &C::Input| {
        let list = C::as_list(value).ok_or_else(|| TransformError::NotAList {
            schema: label.clone(),
            actual: C::type_name(value),
            value: C::describe(value),
        })?;
        list.iter()
            .map(|element| item(element))
            .collect::<Result<Vec<_>, _>>()
            .map(C::list)
    })
}

/// Everything an object transform needs at run time.
struct ObjectPlan<C: Conversion> {
    /// Model name, or the schema label for unbound objects.
    expected: String,
    properties: IndexMap<String, Transform<C>>,
    defaults: IndexMap<String, Value>,
    discriminator: Option<String>,
    subtypes: HashMap<String, Transform<C>>,
    typed_model: Option<String>,
    include_missing: bool,
}

fn object<C: Conversion>(
    spec: &Spec,
    node: &SchemaNode,
    own_properties: &IndexMap<String, SchemaId>,
    own_required: &BTreeSet<String>,
    model: Option<&str>,
) -> Transform<C> {
    let descriptor = match model {
        Some(name) => match spec.model(name) {
            Some(descriptor) => Some(descriptor),
            None => return unknown_model::<C>(name.to_string()),
        },
        None => None,
    };

    let (properties, required) = match descriptor {
        Some(d) => (&d.properties, &d.required),
        None => (own_properties, own_required),
    };

    let property_transforms = properties
        .iter()
        .map(|(name, id)| {
            let transform = get_transform::<C>(spec, *id, required.contains(name));
            (name.clone(), transform)
        })
        .collect();

    let discriminator = descriptor.and_then(|d| d.discriminator.clone());
    let subtypes = match (&discriminator, descriptor) {
        (Some(_), Some(d)) => polymorphic_mapping::<C>(spec, &d.name),
        _ => HashMap::new(),
    };

    let plan: ObjectPlan<C> = ObjectPlan {
        expected: descriptor.map_or_else(|| node.label(), |d| d.name.clone()),
        properties: property_transforms,
        defaults: match descriptor {
            Some(d) => d.defaults.clone(),
            None => spec.property_defaults(properties),
        },
        discriminator,
        subtypes,
        typed_model: descriptor
            .filter(|d| d.use_typed_result)
            .map(|d| d.name.clone()),
        include_missing: descriptor.map_or(spec.config().include_missing_properties, |d| {
            d.include_missing_properties
        }),
    };

    Arc::new(move |value: &C::Input| plan.run(value))
}

/// Subtype transforms keyed by model name, for every model inheriting from `base`.
fn polymorphic_mapping<C: Conversion>(spec: &Spec, base: &str) -> HashMap<String, Transform<C>> {
    spec.definitions()
        .values()
        .filter(|descriptor| descriptor.ancestors.contains(base))
        .map(|descriptor| {
            let transform = get_transform::<C>(spec, descriptor.schema, true);
            (descriptor.name.clone(), transform)
        })
        .collect()
}

impl<C: Conversion> ObjectPlan<C> {
    fn run(&self, value: &C::Input) -> Result<C::Output, TransformError> {
        let entries = C::entries(value).ok_or_else(|| TransformError::NotAnObject {
            model: self.expected.clone(),
            actual: C::type_name(value),
            value: C::describe(value),
        })?;

        if let Some(subtype) = self.subtype_for(&entries) {
            return subtype(value);
        }

        let mut fields = IndexMap::with_capacity(entries.len());
        for (name, property) in entries {
            let transformed = match self.properties.get(name) {
                Some(transform) => transform(property)?,
                None => C::passthrough(property),
            };
            fields.insert(name.to_string(), transformed);
        }

        if self.include_missing {
            for name in self.properties.keys() {
                if !fields.contains_key(name) {
                    let filler = self
                        .defaults
                        .get(name)
                        .map_or_else(C::null, C::from_default);
                    fields.insert(name.clone(), filler);
                }
            }
        }

        Ok(C::object(self.typed_model.as_deref(), fields))
    }

    /// Subtype transform selected by the discriminator, if the value names one.
    ///
    /// Unrecognized discriminator values fall through to the base model; the
    /// validator is responsible for rejecting them.
    fn subtype_for(&self, entries: &[(&str, &C::Input)]) -> Option<&Transform<C>> {
        let discriminator = self.discriminator.as_deref()?;
        let (_, tag) = entries.iter().find(|(name, _)| *name == discriminator)?;
        self.subtypes.get(C::as_str(tag)?)
    }
}
