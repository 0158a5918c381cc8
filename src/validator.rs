//! Payload validation against spec schemas.

use std::sync::Arc;

use serde_json::Value;

use crate::compiler::{marshal, unmarshal};
use crate::error::{PayloadError, SchemaError, SpecError, ValidateError};
use crate::loader::escape_pointer_segment;
use crate::spec::Spec;
use crate::types::{SchemaId, SchemaKind};
use crate::value::Native;

/// Validate a wire payload against the schema at `schema`.
///
/// Runs JSON Schema (draft 4) validation on the document fragment, then checks
/// that every discriminator value names the base model or one of its subtypes.
///
/// # Errors
///
/// Returns `ValidateError::Spec` if the fragment can't be compiled as a JSON
/// Schema, or `ValidateError::Invalid` if the payload doesn't match.
pub fn validate(spec: &Spec, schema: SchemaId, payload: &Value) -> Result<(), ValidateError> {
    let validator = validator_for(spec, schema)?;

    let mut errors: Vec<SchemaError> = validator
        .iter_errors(payload)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();
    check_discriminators(spec, schema, payload, "", &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        tracing::debug!(errors = errors.len(), "payload failed validation");
        Err(ValidateError::Invalid { errors })
    }
}

/// Validate (when `validate_responses` is set) and unmarshal a response body.
pub fn unmarshal_response(
    spec: &Spec,
    schema: SchemaId,
    payload: &Value,
) -> Result<Native, PayloadError> {
    if spec.config().validate_responses {
        validate(spec, schema, payload)?;
    }
    Ok(unmarshal(spec, schema, payload)?)
}

/// Marshal and validate (when `validate_requests` is set) a request body.
pub fn marshal_request(
    spec: &Spec,
    schema: SchemaId,
    value: &Native,
) -> Result<Value, PayloadError> {
    let payload = marshal(spec, schema, value)?;
    if spec.config().validate_requests {
        validate(spec, schema, &payload)?;
    }
    Ok(payload)
}

fn validator_for(spec: &Spec, schema: SchemaId) -> Result<Arc<jsonschema::Validator>, SpecError> {
    if let Some(validator) = spec.validators.get(&schema) {
        return Ok(Arc::clone(validator.value()));
    }

    let node = spec.node(schema);
    let document = validation_document(spec.document(), &node.pointer);
    let validator = jsonschema::options()
        .with_draft(jsonschema::Draft::Draft4)
        .build(&document)
        .map_err(|e| SpecError::InvalidSchema {
            path: node.pointer.clone(),
            message: e.to_string(),
        })?;

    let validator = Arc::new(validator);
    spec.validators.insert(schema, Arc::clone(&validator));
    Ok(validator)
}

/// The whole document rooted at `pointer`, so local `$ref`s keep resolving.
///
/// Swagger extensions are rewritten into plain JSON Schema: nullable markers
/// widen `type` to include `"null"`, and `type: file` is dropped.
fn validation_document(document: &Value, pointer: &str) -> Value {
    let mut document = document.clone();
    to_json_schema(&mut document);
    if !pointer.is_empty() {
        if let Value::Object(root) = &mut document {
            root.insert("$ref".to_string(), Value::String(format!("#{}", pointer)));
        }
    }
    document
}

fn to_json_schema(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let nullable = ["x-nullable", "nullable"]
                .iter()
                .any(|key| map.get(*key).and_then(Value::as_bool).unwrap_or(false));
            match map.get("type").cloned() {
                Some(Value::String(ty)) if ty == "file" => {
                    map.remove("type");
                }
                Some(Value::String(ty)) if nullable => {
                    map.insert("type".to_string(), serde_json::json!([ty, "null"]));
                }
                _ => {}
            }
            for child in map.values_mut() {
                to_json_schema(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(to_json_schema),
        _ => {}
    }
}

/// Walk `payload` alongside the schema graph, recording discriminator values
/// that don't name a known subtype.
fn check_discriminators(
    spec: &Spec,
    schema: SchemaId,
    payload: &Value,
    path: &str,
    errors: &mut Vec<SchemaError>,
) {
    let node = spec.node(spec.deref(schema));
    match (&node.kind, payload) {
        (SchemaKind::Array { items: Some(items) }, Value::Array(values)) => {
            for (i, value) in values.iter().enumerate() {
                check_discriminators(spec, *items, value, &format!("{}/{}", path, i), errors);
            }
        }
        (
            SchemaKind::Object {
                properties, model, ..
            },
            Value::Object(map),
        ) => {
            let descriptor = model.as_deref().and_then(|name| spec.model(name));

            if let Some(base) = descriptor {
                if let Some(tag) = base.discriminator.as_ref().and_then(|d| map.get(d)) {
                    let subtype = tag
                        .as_str()
                        .and_then(|name| spec.model(name))
                        .filter(|candidate| candidate.is_a(&base.name));
                    match subtype {
                        Some(sub) if sub.name != base.name => {
                            return check_discriminators(spec, sub.schema, payload, path, errors);
                        }
                        Some(_) => {}
                        None => errors.push(SchemaError {
                            path: format!(
                                "{}/{}",
                                path,
                                escape_pointer_segment(base.discriminator.as_deref().unwrap_or_default())
                            ),
                            message: format!("{} is not a known subtype of {}", tag, base.name),
                        }),
                    }
                }
            }

            let properties = descriptor.map_or(properties, |d| &d.properties);
            for (name, value) in map {
                if let Some(id) = properties.get(name) {
                    let child = format!("{}/{}", path, escape_pointer_segment(name));
                    check_discriminators(spec, *id, value, &child, errors);
                }
            }
        }
        _ => {}
    }
}
