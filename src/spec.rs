//! The schema registry: an arena of schema nodes built from a spec document.
//!
//! Every schema fragment reachable from the document's definitions and paths
//! becomes one [`SchemaNode`] with a stable [`SchemaId`]. `$ref` pointers are
//! kept as [`SchemaKind::Ref`] edges and resolved with [`Spec::deref`], so
//! recursive schemas stay finite.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::cache::CompilationCache;
use crate::config::SpecConfig;
use crate::conversion::{Marshal, Unmarshal};
use crate::error::SpecError;
use crate::format::{FormatConverter, FormatRegistry};
use crate::loader::{escape_pointer_segment, navigate_fragment};
use crate::types::{
    json_type_name, ModelDescriptor, PrimitiveType, SchemaId, SchemaKind, SchemaNode,
};

/// Locations whose entries are named schemas.
const DEFINITION_CONTAINERS: &[&str] = &["/definitions", "/components/schemas"];

/// Marker naming the model an object schema binds to.
const MODEL_MARKER: &str = "x-model";

/// A loaded spec: schema arena, model descriptors, formats and config.
///
/// Also owns the compilation caches, so transforms are built at most once per
/// spec for the lifetime of the value.
pub struct Spec {
    document: Value,
    nodes: Vec<SchemaNode>,
    pointers: HashMap<String, SchemaId>,
    definitions: IndexMap<String, ModelDescriptor>,
    config: SpecConfig,
    formats: FormatRegistry,
    pub(crate) unmarshal_cache: CompilationCache<Unmarshal>,
    pub(crate) marshal_cache: CompilationCache<Marshal>,
    pub(crate) validators: DashMap<SchemaId, Arc<jsonschema::Validator>>,
}

impl std::fmt::Debug for Spec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spec")
            .field("nodes", &self.nodes.len())
            .field("definitions", &self.definitions.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Spec {
    /// Build a spec with the built-in formats.
    ///
    /// # Errors
    ///
    /// Returns `SpecError::UnresolvableRef` for `$ref`s that don't point into
    /// the document and `SpecError::InvalidSchema` for malformed fragments.
    pub fn from_value(document: Value, config: SpecConfig) -> Result<Self, SpecError> {
        Self::with_formats(document, config, FormatRegistry::default())
    }

    /// Build a spec with a caller-supplied format registry.
    pub fn with_formats(
        document: Value,
        config: SpecConfig,
        formats: FormatRegistry,
    ) -> Result<Self, SpecError> {
        let mut builder = Builder::new(&document);
        builder.build_definitions()?;
        builder.build_paths()?;
        let Builder {
            nodes,
            pointers,
            model_pointers,
            parents,
            ..
        } = builder;

        let nodes = nodes
            .into_iter()
            .enumerate()
            .map(|(i, node)| {
                node.ok_or_else(|| SpecError::InvalidSchema {
                    path: format!("node {}", i),
                    message: "schema node was never built".to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        check_ref_cycles(&nodes)?;

        let mut spec = Spec {
            document,
            nodes,
            pointers,
            definitions: IndexMap::new(),
            config,
            formats,
            unmarshal_cache: CompilationCache::new(),
            marshal_cache: CompilationCache::new(),
            validators: DashMap::new(),
        };
        spec.definitions = spec.build_descriptors(&model_pointers, &parents);

        tracing::debug!(
            nodes = spec.nodes.len(),
            models = spec.definitions.len(),
            "spec loaded"
        );
        Ok(spec)
    }

    /// Follow `$ref` edges until a concrete node is reached.
    pub fn deref(&self, mut id: SchemaId) -> SchemaId {
        // Ref cycles are rejected at build time.
        while let SchemaKind::Ref(target) = self.nodes[id.0].kind {
            id = target;
        }
        id
    }

    /// The node for `id`, without dereferencing.
    ///
    /// # Panics
    ///
    /// Panics if `id` came from a different spec.
    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Model descriptors keyed by model name.
    pub fn definitions(&self) -> &IndexMap<String, ModelDescriptor> {
        &self.definitions
    }

    pub fn model(&self, name: &str) -> Option<&ModelDescriptor> {
        self.definitions.get(name)
    }

    pub fn config(&self) -> &SpecConfig {
        &self.config
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Look up a format converter; `None` means "no conversion".
    pub fn get_format(&self, name: &str) -> Option<&FormatConverter> {
        self.formats.get(name)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Node built from the fragment at `pointer` (leading `#` optional).
    pub fn schema_at(&self, pointer: &str) -> Option<SchemaId> {
        self.pointers
            .get(pointer.trim_start_matches('#'))
            .copied()
    }

    /// Node for a definition key or model name.
    pub fn definition_schema(&self, name: &str) -> Option<SchemaId> {
        let escaped = escape_pointer_segment(name);
        DEFINITION_CONTAINERS
            .iter()
            .find_map(|container| self.schema_at(&format!("{}/{}", container, escaped)))
            .or_else(|| self.model(name).map(|model| model.schema))
    }

    /// Resolve a user-facing schema reference: a `#/...` pointer or a definition name.
    ///
    /// # Errors
    ///
    /// Returns `SpecError::UnknownSchema` when nothing matches.
    pub fn resolve_schema(&self, reference: &str) -> Result<SchemaId, SpecError> {
        let found = if reference.starts_with('#') || reference.starts_with('/') {
            self.schema_at(reference)
        } else {
            self.definition_schema(reference)
        };
        found.ok_or_else(|| SpecError::UnknownSchema {
            name: reference.to_string(),
        })
    }

    /// Default values declared by each property schema.
    pub fn property_defaults(&self, properties: &IndexMap<String, SchemaId>) -> IndexMap<String, Value> {
        properties
            .iter()
            .filter_map(|(name, id)| {
                let node = self.node(self.deref(*id));
                node.default.clone().map(|default| (name.clone(), default))
            })
            .collect()
    }

    /// Compilation cache for the unmarshal direction.
    pub fn unmarshal_cache(&self) -> &CompilationCache<Unmarshal> {
        &self.unmarshal_cache
    }

    /// Compilation cache for the marshal direction.
    pub fn marshal_cache(&self) -> &CompilationCache<Marshal> {
        &self.marshal_cache
    }

    fn build_descriptors(
        &self,
        model_pointers: &IndexMap<String, String>,
        parents: &HashMap<String, Vec<String>>,
    ) -> IndexMap<String, ModelDescriptor> {
        let mut definitions = IndexMap::new();
        for (pointer, name) in model_pointers {
            let Some(schema) = self.schema_at(pointer) else {
                continue;
            };
            let SchemaKind::Object {
                properties,
                required,
                discriminator,
                ..
            } = &self.node(schema).kind
            else {
                continue;
            };

            definitions.insert(
                name.clone(),
                ModelDescriptor {
                    name: name.clone(),
                    schema,
                    properties: properties.clone(),
                    required: required.clone(),
                    discriminator: discriminator.clone(),
                    ancestors: ancestors_of(name, parents),
                    use_typed_result: self.config.use_models,
                    include_missing_properties: self.config.include_missing_properties,
                    defaults: self.property_defaults(properties),
                },
            );
        }
        definitions
    }
}

/// Transitive closure of `parents` starting at `name`, excluding `name`.
fn ancestors_of(name: &str, parents: &HashMap<String, Vec<String>>) -> BTreeSet<String> {
    let mut ancestors = BTreeSet::new();
    let mut pending: Vec<&str> = parents
        .get(name)
        .map(|p| p.iter().map(String::as_str).collect())
        .unwrap_or_default();
    while let Some(parent) = pending.pop() {
        if parent == name || !ancestors.insert(parent.to_string()) {
            continue;
        }
        if let Some(grand) = parents.get(parent) {
            pending.extend(grand.iter().map(String::as_str));
        }
    }
    ancestors
}

fn check_ref_cycles(nodes: &[SchemaNode]) -> Result<(), SpecError> {
    for (start, node) in nodes.iter().enumerate() {
        let mut current = &node.kind;
        let mut steps = 0;
        while let SchemaKind::Ref(target) = current {
            steps += 1;
            if steps > nodes.len() {
                return Err(SpecError::InvalidSchema {
                    path: nodes[start].pointer.clone(),
                    message: "circular $ref chain".to_string(),
                });
            }
            current = &nodes[target.0].kind;
        }
    }
    Ok(())
}

/// Parses a document into the node arena.
struct Builder<'a> {
    document: &'a Value,
    nodes: Vec<Option<SchemaNode>>,
    pointers: HashMap<String, SchemaId>,
    /// Definition pointer -> model name, in document order.
    model_pointers: IndexMap<String, String>,
    /// Model name -> directly inherited model names.
    parents: HashMap<String, Vec<String>>,
}

impl<'a> Builder<'a> {
    fn new(document: &'a Value) -> Self {
        Self {
            document,
            nodes: Vec::new(),
            pointers: HashMap::new(),
            model_pointers: IndexMap::new(),
            parents: HashMap::new(),
        }
    }

    fn build_definitions(&mut self) -> Result<(), SpecError> {
        let document = self.document;
        let mut roots = Vec::new();
        let mut bound: HashMap<String, String> = HashMap::new();
        for container in DEFINITION_CONTAINERS {
            let Some(Value::Object(defs)) = navigate_fragment(document, container) else {
                continue;
            };
            for (key, schema) in defs {
                let pointer = format!("{}/{}", container, escape_pointer_segment(key));
                if is_object_schema(schema) {
                    let name = model_name(schema).unwrap_or(key).to_string();
                    if let Some(first) = bound.insert(name.clone(), pointer.clone()) {
                        return Err(SpecError::InvalidSchema {
                            path: pointer,
                            message: format!(
                                "duplicate model name \"{}\", also bound by #{}",
                                name, first
                            ),
                        });
                    }
                    self.model_pointers.insert(pointer.clone(), name);
                }
                roots.push(pointer);
            }
        }
        // Models must all be known before any node is parsed so that refs
        // into a model bind to it regardless of document order.
        for pointer in roots {
            self.node_at(&pointer, &pointer)?;
        }
        Ok(())
    }

    /// Parse every inline `schema` found under `/paths`.
    fn build_paths(&mut self) -> Result<(), SpecError> {
        let document = self.document;
        let Some(paths) = document.get("paths") else {
            return Ok(());
        };
        let mut found = Vec::new();
        collect_schema_pointers(paths, "/paths", &mut found);
        for pointer in found {
            self.node_at(&pointer, &pointer)?;
        }
        Ok(())
    }

    /// Id of the node at `pointer`, parsing it on first sight.
    fn node_at(&mut self, pointer: &str, referrer: &str) -> Result<SchemaId, SpecError> {
        if let Some(id) = self.pointers.get(pointer) {
            return Ok(*id);
        }
        let document = self.document;
        let raw = navigate_fragment(document, pointer).ok_or_else(|| SpecError::UnresolvableRef {
            path: referrer.to_string(),
            reference: format!("#{}", pointer),
        })?;

        let id = SchemaId(self.nodes.len());
        self.nodes.push(None);
        self.pointers.insert(pointer.to_string(), id);

        let node = self.parse(raw, pointer)?;
        self.nodes[id.0] = Some(node);
        Ok(id)
    }

    fn parse(&mut self, raw: &'a Value, pointer: &str) -> Result<SchemaNode, SpecError> {
        let map = match raw {
            Value::Object(map) => map,
            // Boolean schemas carry no shape. `false` is treated like `true`
            // here and rejected by validation instead.
            Value::Bool(_) => return Ok(node(SchemaKind::Untyped, raw, pointer, None, false)),
            other => {
                return Err(SpecError::InvalidSchema {
                    path: pointer.to_string(),
                    message: format!("expected object, got {}", json_type_name(other)),
                })
            }
        };

        let default = map.get("default").cloned();
        let nullable = is_nullable(map);

        if let Some(reference) = map.get("$ref") {
            let target = self.ref_target(reference, pointer)?;
            let id = self.node_at(&target, pointer)?;
            return Ok(node(SchemaKind::Ref(id), raw, pointer, default, nullable));
        }

        let kind = match declared_type(map) {
            None => SchemaKind::Untyped,
            Some("object") => self.parse_object(map, pointer)?,
            Some("array") => {
                let items = match map.get("items") {
                    Some(Value::Object(_)) | Some(Value::Bool(_)) => {
                        Some(self.node_at(&format!("{}/items", pointer), pointer)?)
                    }
                    _ => None,
                };
                SchemaKind::Array { items }
            }
            Some("file") => SchemaKind::File,
            Some(other) => match PrimitiveType::parse(other) {
                Some(ty) => SchemaKind::Primitive {
                    ty,
                    format: map.get("format").and_then(Value::as_str).map(String::from),
                },
                None => SchemaKind::Unknown(other.to_string()),
            },
        };

        Ok(node(kind, raw, pointer, default, nullable))
    }

    fn parse_object(
        &mut self,
        map: &'a Map<String, Value>,
        pointer: &str,
    ) -> Result<SchemaKind, SpecError> {
        let mut properties = IndexMap::new();
        let mut required = BTreeSet::new();
        let mut visited = HashSet::new();
        self.collapse(map, pointer, &mut properties, &mut required, &mut visited)?;

        let model = map
            .get(MODEL_MARKER)
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| self.model_pointers.get(pointer).cloned());

        if let Some(name) = self.model_pointers.get(pointer).cloned() {
            let direct = self.direct_parents(map, pointer)?;
            self.parents.insert(name, direct);
        }

        let discriminator = match map.get("discriminator") {
            Some(Value::String(name)) => Some(name.clone()),
            Some(Value::Object(obj)) => obj
                .get("propertyName")
                .and_then(Value::as_str)
                .map(String::from),
            _ => None,
        };

        Ok(SchemaKind::Object {
            properties,
            required,
            discriminator,
            model,
        })
    }

    /// Merge properties and required names from `allOf` members, then the
    /// schema's own, into the accumulators.
    fn collapse(
        &mut self,
        map: &'a Map<String, Value>,
        pointer: &str,
        properties: &mut IndexMap<String, SchemaId>,
        required: &mut BTreeSet<String>,
        visited: &mut HashSet<String>,
    ) -> Result<(), SpecError> {
        if !visited.insert(pointer.to_string()) {
            return Ok(());
        }

        if let Some(Value::Array(members)) = map.get("allOf") {
            for (i, member) in members.iter().enumerate() {
                let member_pointer = match member.get("$ref") {
                    Some(reference) => {
                        let target = self.ref_target(reference, pointer)?;
                        self.concrete_pointer(target, pointer)?
                    }
                    None => format!("{}/allOf/{}", pointer, i),
                };
                let document = self.document;
                let member_map = navigate_fragment(document, &member_pointer)
                    .and_then(Value::as_object)
                    .ok_or_else(|| SpecError::UnresolvableRef {
                        path: pointer.to_string(),
                        reference: format!("#{}", member_pointer),
                    })?;
                self.collapse(member_map, &member_pointer, properties, required, visited)?;
            }
        }

        if let Some(Value::Object(own)) = map.get("properties") {
            for name in own.keys() {
                let property_pointer =
                    format!("{}/properties/{}", pointer, escape_pointer_segment(name));
                let id = self.node_at(&property_pointer, pointer)?;
                properties.insert(name.clone(), id);
            }
        }

        if let Some(Value::Array(names)) = map.get("required") {
            required.extend(names.iter().filter_map(Value::as_str).map(String::from));
        }
        Ok(())
    }

    /// Models named by `$ref` members of `allOf`.
    fn direct_parents(
        &self,
        map: &Map<String, Value>,
        pointer: &str,
    ) -> Result<Vec<String>, SpecError> {
        let mut direct = Vec::new();
        if let Some(Value::Array(members)) = map.get("allOf") {
            for member in members {
                if let Some(reference) = member.get("$ref") {
                    let target = self.ref_target(reference, pointer)?;
                    let target = self.concrete_pointer(target, pointer)?;
                    if let Some(parent) = self.model_pointers.get(&target) {
                        direct.push(parent.clone());
                    }
                }
            }
        }
        Ok(direct)
    }

    /// Follow `$ref` aliases from `target` to the first fragment that isn't one.
    fn concrete_pointer(&self, mut target: String, pointer: &str) -> Result<String, SpecError> {
        let mut seen = HashSet::new();
        while let Some(reference) =
            navigate_fragment(self.document, &target).and_then(|v| v.get("$ref"))
        {
            if !seen.insert(target.clone()) {
                return Err(SpecError::InvalidSchema {
                    path: pointer.to_string(),
                    message: "circular $ref chain".to_string(),
                });
            }
            target = self.ref_target(reference, &target)?;
        }
        Ok(target)
    }

    /// Pointer (without `#`) targeted by a local `$ref`.
    fn ref_target(&self, reference: &Value, pointer: &str) -> Result<String, SpecError> {
        let unresolvable = || SpecError::UnresolvableRef {
            path: pointer.to_string(),
            reference: reference.as_str().unwrap_or_default().to_string(),
        };
        let fragment = reference
            .as_str()
            .and_then(|r| r.strip_prefix('#'))
            .ok_or_else(unresolvable)?;
        if fragment.is_empty() || fragment.starts_with('/') {
            Ok(fragment.to_string())
        } else {
            Err(unresolvable())
        }
    }
}

fn node(
    kind: SchemaKind,
    raw: &Value,
    pointer: &str,
    default: Option<Value>,
    nullable: bool,
) -> SchemaNode {
    SchemaNode {
        kind,
        default,
        nullable,
        pointer: pointer.to_string(),
        raw: raw.clone(),
    }
}

/// The effective `type`, inferring `object` from `properties`/`allOf`.
fn declared_type(map: &Map<String, Value>) -> Option<&str> {
    match map.get("type") {
        Some(Value::String(ty)) => Some(ty.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|ty| *ty != "null"),
        _ if map.contains_key("properties") || map.contains_key("allOf") => Some("object"),
        _ => None,
    }
}

fn is_nullable(map: &Map<String, Value>) -> bool {
    let flagged = |key: &str| map.get(key).and_then(Value::as_bool).unwrap_or(false);
    let null_in_type = matches!(
        map.get("type"),
        Some(Value::Array(types)) if types.iter().any(|t| t == "null")
    );
    flagged("x-nullable") || flagged("nullable") || null_in_type
}

fn is_object_schema(schema: &Value) -> bool {
    match schema {
        Value::Object(map) => !map.contains_key("$ref") && declared_type(map) == Some("object"),
        _ => false,
    }
}

/// Name a definition binds to: `x-model`, then `title`.
fn model_name(schema: &Value) -> Option<&str> {
    schema
        .get(MODEL_MARKER)
        .or_else(|| schema.get("title"))
        .and_then(Value::as_str)
}

fn collect_schema_pointers(value: &Value, pointer: &str, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_pointer = format!("{}/{}", pointer, escape_pointer_segment(key));
                if key == "schema" && child.is_object() {
                    found.push(child_pointer);
                } else {
                    collect_schema_pointers(child, &child_pointer, found);
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_schema_pointers(item, &format!("{}/{}", pointer, i), found);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Native;
    use serde_json::json;

    fn pets() -> Value {
        json!({
            "swagger": "2.0",
            "definitions": {
                "Pet": {
                    "type": "object",
                    "discriminator": "type",
                    "required": ["name", "type"],
                    "properties": {
                        "name": { "type": "string" },
                        "type": { "type": "string" }
                    }
                },
                "Dog": {
                    "allOf": [
                        { "$ref": "#/definitions/Pet" },
                        {
                            "type": "object",
                            "properties": {
                                "birth_date": { "type": "string", "format": "date" }
                            }
                        }
                    ]
                },
                "Puppy": {
                    "allOf": [{ "$ref": "#/definitions/Dog" }]
                }
            }
        })
    }

    #[test]
    fn definitions_become_models() {
        let spec = Spec::from_value(pets(), SpecConfig::default()).unwrap();
        let names: Vec<_> = spec.definitions().keys().cloned().collect();
        assert_eq!(names, ["Pet", "Dog", "Puppy"]);
    }

    #[test]
    fn all_of_collapses_properties_and_required() {
        let spec = Spec::from_value(pets(), SpecConfig::default()).unwrap();
        let dog = spec.model("Dog").unwrap();
        let props: Vec<_> = dog.properties.keys().cloned().collect();
        assert_eq!(props, ["name", "type", "birth_date"]);
        assert!(dog.required.contains("name"));
        assert!(dog.discriminator.is_none());
    }

    #[test]
    fn ancestors_are_transitive() {
        let spec = Spec::from_value(pets(), SpecConfig::default()).unwrap();
        let puppy = spec.model("Puppy").unwrap();
        assert!(puppy.ancestors.contains("Dog"));
        assert!(puppy.ancestors.contains("Pet"));
        assert!(spec.model("Pet").unwrap().ancestors.is_empty());
    }

    #[test]
    fn inherited_properties_share_nodes() {
        let spec = Spec::from_value(pets(), SpecConfig::default()).unwrap();
        let pet = spec.model("Pet").unwrap();
        let dog = spec.model("Dog").unwrap();
        assert_eq!(pet.properties["name"], dog.properties["name"]);
    }

    #[test]
    fn refs_deref_to_definition() {
        let doc = json!({
            "definitions": {
                "Node": {
                    "type": "object",
                    "properties": { "next": { "$ref": "#/definitions/Node" } }
                }
            }
        });
        let spec = Spec::from_value(doc, SpecConfig::default()).unwrap();
        let node = spec.definition_schema("Node").unwrap();
        let next = spec.model("Node").unwrap().properties["next"];
        assert_ne!(next, node);
        assert_eq!(spec.deref(next), node);
    }

    #[test]
    fn structurally_equal_nodes_are_distinct() {
        let doc = json!({
            "definitions": {
                "A": { "type": "string" },
                "B": { "type": "string" }
            }
        });
        let spec = Spec::from_value(doc, SpecConfig::default()).unwrap();
        assert_ne!(
            spec.definition_schema("A").unwrap(),
            spec.definition_schema("B").unwrap()
        );
    }

    #[test]
    fn model_name_prefers_marker_then_title() {
        let doc = json!({
            "definitions": {
                "a": { "type": "object", "x-model": "Alpha", "title": "Ignored" },
                "b": { "type": "object", "title": "Beta" },
                "c": { "type": "object" }
            }
        });
        let spec = Spec::from_value(doc, SpecConfig::default()).unwrap();
        let names: Vec<_> = spec.definitions().keys().cloned().collect();
        assert_eq!(names, ["Alpha", "Beta", "c"]);
        assert_eq!(
            spec.definition_schema("a"),
            spec.definition_schema("Alpha")
        );
    }

    #[test]
    fn external_ref_rejected() {
        let doc = json!({
            "definitions": {
                "A": { "$ref": "other.json#/definitions/B" }
            }
        });
        let err = Spec::from_value(doc, SpecConfig::default()).unwrap_err();
        assert!(matches!(err, SpecError::UnresolvableRef { .. }));
    }

    #[test]
    fn dangling_ref_rejected() {
        let doc = json!({
            "definitions": {
                "A": { "$ref": "#/definitions/Missing" }
            }
        });
        let err = Spec::from_value(doc, SpecConfig::default()).unwrap_err();
        assert!(matches!(err, SpecError::UnresolvableRef { .. }));
    }

    #[test]
    fn ref_cycle_rejected() {
        let doc = json!({
            "definitions": {
                "A": { "$ref": "#/definitions/B" },
                "B": { "$ref": "#/definitions/A" }
            }
        });
        let err = Spec::from_value(doc, SpecConfig::default()).unwrap_err();
        assert!(matches!(err, SpecError::InvalidSchema { .. }));
    }

    #[test]
    fn nullable_markers() {
        let doc = json!({
            "definitions": {
                "A": { "type": "integer", "x-nullable": true },
                "B": { "type": "integer", "nullable": true },
                "C": { "type": ["integer", "null"] },
                "D": { "type": "integer" }
            }
        });
        let spec = Spec::from_value(doc, SpecConfig::default()).unwrap();
        for name in ["A", "B", "C"] {
            let id = spec.definition_schema(name).unwrap();
            assert!(spec.node(id).nullable, "{} should be nullable", name);
        }
        let c = spec.definition_schema("C").unwrap();
        assert!(matches!(
            spec.node(c).kind,
            SchemaKind::Primitive {
                ty: PrimitiveType::Integer,
                ..
            }
        ));
        assert!(!spec.node(spec.definition_schema("D").unwrap()).nullable);
    }

    #[test]
    fn path_schemas_are_indexed() {
        let doc = json!({
            "paths": {
                "/pets": {
                    "get": {
                        "responses": {
                            "200": {
                                "schema": {
                                    "type": "array",
                                    "items": { "$ref": "#/definitions/Pet" }
                                }
                            }
                        }
                    }
                }
            },
            "definitions": {
                "Pet": { "type": "object", "properties": { "name": { "type": "string" } } }
            }
        });
        let spec = Spec::from_value(doc, SpecConfig::default()).unwrap();
        let id = spec
            .resolve_schema("#/paths/~1pets/get/responses/200/schema")
            .unwrap();
        assert!(matches!(spec.node(id).kind, SchemaKind::Array { items: Some(_) }));
    }

    #[test]
    fn resolve_schema_unknown() {
        let spec = Spec::from_value(pets(), SpecConfig::default()).unwrap();
        assert!(spec.resolve_schema("Pet").is_ok());
        assert!(matches!(
            spec.resolve_schema("Ghost"),
            Err(SpecError::UnknownSchema { .. })
        ));
    }

    #[test]
    fn duplicate_model_names_rejected() {
        let doc = json!({
            "definitions": {
                "A": {
                    "type": "object",
                    "title": "Same",
                    "properties": { "when": { "type": "string", "format": "date" } }
                },
                "B": {
                    "type": "object",
                    "title": "Same",
                    "properties": { "n": { "type": "integer" } }
                }
            }
        });
        match Spec::from_value(doc, SpecConfig::default()) {
            Err(SpecError::InvalidSchema { path, message }) => {
                assert_eq!(path, "/definitions/B");
                assert!(message.contains("/definitions/A"), "{}", message);
            }
            other => panic!("expected duplicate model error, got {:?}", other),
        }
    }

    #[test]
    fn all_of_follows_ref_aliases() {
        let doc = json!({
            "definitions": {
                "Base": {
                    "type": "object",
                    "discriminator": "kind",
                    "properties": {
                        "kind": { "type": "string" },
                        "born": { "type": "string", "format": "date" }
                    }
                },
                "Alias": { "$ref": "#/definitions/Base" },
                "Child": {
                    "allOf": [
                        { "$ref": "#/definitions/Alias" },
                        { "properties": { "x": { "type": "integer" } } }
                    ]
                }
            }
        });
        let spec = Spec::from_value(doc, SpecConfig::default()).unwrap();
        let child = spec.model("Child").unwrap();
        let props: Vec<_> = child.properties.keys().cloned().collect();
        assert_eq!(props, ["kind", "born", "x"]);
        assert!(child.is_a("Base"));
        assert!(spec.model("Alias").is_none());
    }

    #[test]
    fn alias_cycle_in_all_of_rejected() {
        let doc = json!({
            "definitions": {
                "A": { "$ref": "#/definitions/B" },
                "B": { "$ref": "#/definitions/A" },
                "C": { "allOf": [{ "$ref": "#/definitions/A" }] }
            }
        });
        let err = Spec::from_value(doc, SpecConfig::default()).unwrap_err();
        assert!(matches!(err, SpecError::InvalidSchema { .. }));
    }

    #[test]
    fn boolean_schemas_are_untyped() {
        let doc = json!({
            "definitions": {
                "Holder": {
                    "type": "object",
                    "properties": { "yes": true, "no": false }
                }
            }
        });
        let spec = Spec::from_value(doc, SpecConfig::default()).unwrap();
        let holder = spec.model("Holder").unwrap();
        for name in ["yes", "no"] {
            assert_eq!(spec.node(holder.properties[name]).kind, SchemaKind::Untyped);
        }
    }

    #[test]
    fn custom_format_registry_is_kept() {
        let formats = FormatRegistry::empty().with(FormatConverter::new(
            "upper",
            |v| Ok(Native::String(v.as_str().unwrap_or_default().to_uppercase())),
            |n| Ok(n.to_wire()),
        ));
        let spec = Spec::with_formats(pets(), SpecConfig::default(), formats).unwrap();
        assert_eq!(spec.formats().names().collect::<Vec<_>>(), ["upper"]);
        assert!(spec.get_format("date").is_none());
    }

    #[test]
    fn unknown_and_file_types() {
        let doc = json!({
            "definitions": {
                "Upload": { "type": "file" },
                "Weird": { "type": "quaternion" },
                "Anything": {}
            }
        });
        let spec = Spec::from_value(doc, SpecConfig::default()).unwrap();
        let kind = |name| spec.node(spec.definition_schema(name).unwrap()).kind.clone();
        assert_eq!(kind("Upload"), SchemaKind::File);
        assert_eq!(kind("Weird"), SchemaKind::Unknown("quaternion".into()));
        assert_eq!(kind("Anything"), SchemaKind::Untyped);
    }
}
