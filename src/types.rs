//! Core types for the schema graph.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Stable index of a node in a [`Spec`](crate::Spec)'s schema arena.
///
/// Two ids are equal only when they name the same node, even if the nodes
/// they point at are structurally identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub(crate) usize);

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Primitive JSON Schema types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    Number,
    Integer,
    Boolean,
}

impl PrimitiveType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(PrimitiveType::String),
            "number" => Some(PrimitiveType::Number),
            "integer" => Some(PrimitiveType::Integer),
            "boolean" => Some(PrimitiveType::Boolean),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Number => "number",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Boolean => "boolean",
        }
    }
}

/// What a schema node describes, decided once at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    Primitive {
        ty: PrimitiveType,
        format: Option<String>,
    },
    Array {
        items: Option<SchemaId>,
    },
    /// Object schema with `allOf` members already collapsed into `properties`.
    Object {
        properties: IndexMap<String, SchemaId>,
        required: BTreeSet<String>,
        discriminator: Option<String>,
        /// Model name from `x-model` or the enclosing definition.
        model: Option<String>,
    },
    File,
    /// No `type` declared.
    Untyped,
    /// A declared `type` outside the recognized set.
    Unknown(String),
    /// `$ref` indirection, resolved by [`Spec::deref`](crate::Spec::deref).
    Ref(SchemaId),
}

impl SchemaKind {
    /// Type name used in logs: the declared type, or the kind of indirection.
    pub fn name(&self) -> &str {
        match self {
            SchemaKind::Primitive { ty, .. } => ty.as_str(),
            SchemaKind::Array { .. } => "array",
            SchemaKind::Object { .. } => "object",
            SchemaKind::File => "file",
            SchemaKind::Untyped => "untyped",
            SchemaKind::Unknown(name) => name,
            SchemaKind::Ref(_) => "$ref",
        }
    }
}

/// One node of the schema arena.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub default: Option<Value>,
    /// `x-nullable`, `nullable` or a `type` list containing `"null"`.
    pub nullable: bool,
    /// JSON Pointer of the fragment this node was built from.
    pub pointer: String,
    pub raw: Value,
}

impl SchemaNode {
    /// Short label for error messages: the model name when bound, else the pointer.
    pub fn label(&self) -> String {
        match &self.kind {
            SchemaKind::Object {
                model: Some(name), ..
            } => name.clone(),
            _ if self.pointer.is_empty() => "#".to_string(),
            _ => format!("#{}", self.pointer),
        }
    }
}

/// Read-only metadata for a named object schema.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    pub name: String,
    pub schema: SchemaId,
    pub properties: IndexMap<String, SchemaId>,
    pub required: BTreeSet<String>,
    pub discriminator: Option<String>,
    /// Every model this one inherits from, directly or transitively.
    pub ancestors: BTreeSet<String>,
    pub use_typed_result: bool,
    pub include_missing_properties: bool,
    pub defaults: IndexMap<String, Value>,
}

impl ModelDescriptor {
    /// True when this model is `name` or inherits from it.
    pub fn is_a(&self, name: &str) -> bool {
        self.name == name || self.ancestors.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitive_type_parse() {
        assert_eq!(PrimitiveType::parse("string"), Some(PrimitiveType::String));
        assert_eq!(PrimitiveType::parse("integer"), Some(PrimitiveType::Integer));
        assert_eq!(PrimitiveType::parse("object"), None);
        assert_eq!(PrimitiveType::parse("file"), None);
    }

    #[test]
    fn kind_names() {
        let integer = SchemaKind::Primitive {
            ty: PrimitiveType::Integer,
            format: Some("int32".into()),
        };
        assert_eq!(integer.name(), "integer");
        assert_eq!(SchemaKind::Unknown("quaternion".into()).name(), "quaternion");
        assert_eq!(SchemaKind::Ref(SchemaId(2)).name(), "$ref");
    }

    #[test]
    fn node_label_prefers_model_name() {
        let node = SchemaNode {
            kind: SchemaKind::Object {
                properties: IndexMap::new(),
                required: BTreeSet::new(),
                discriminator: None,
                model: Some("Pet".into()),
            },
            default: None,
            nullable: false,
            pointer: "/definitions/Pet".into(),
            raw: json!({}),
        };
        assert_eq!(node.label(), "Pet");

        let node = SchemaNode {
            kind: SchemaKind::Untyped,
            pointer: "/definitions/Pet/properties/id".into(),
            ..node
        };
        assert_eq!(node.label(), "#/definitions/Pet/properties/id");
    }

    #[test]
    fn descriptor_is_a_checks_ancestors() {
        let dog = ModelDescriptor {
            name: "Dog".into(),
            schema: SchemaId(0),
            properties: IndexMap::new(),
            required: BTreeSet::new(),
            discriminator: None,
            ancestors: ["Pet".to_string()].into_iter().collect(),
            use_typed_result: true,
            include_missing_properties: true,
            defaults: IndexMap::new(),
        };
        assert!(dog.is_a("Dog"));
        assert!(dog.is_a("Pet"));
        assert!(!dog.is_a("Cat"));
    }
}
