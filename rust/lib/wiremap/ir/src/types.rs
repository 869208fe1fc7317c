//! Attribute trees: the typed value descriptions every payload, result,
//! error and metadata binding is made of.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Meta key overriding the wire name of an object field.
pub const META_WIRE_NAME: &str = "rpc:name";

/// Meta key holding an explicit wire field tag.
pub const META_TAG: &str = "rpc:tag";

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Boolean,
    Int,
    Int32,
    Int64,
    #[serde(rename = "uint")]
    UInt,
    #[serde(rename = "uint32")]
    UInt32,
    #[serde(rename = "uint64")]
    UInt64,
    Float32,
    Float64,
    String,
    Bytes,
    /// Arbitrary value. Not representable on the wire.
    Any,
}

impl Primitive {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Primitive::Int
                | Primitive::Int32
                | Primitive::Int64
                | Primitive::UInt
                | Primitive::UInt32
                | Primitive::UInt64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Primitive::Float32 | Primitive::Float64)
    }

    /// Returns true for any integer or floating point type.
    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }
}

/// The closed set of type shapes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// No data at all (e.g. a method without payload).
    #[default]
    Empty,
    Primitive(Primitive),
    /// Anonymous structure, fields in declaration order.
    Object(Vec<Field>),
    Array(Box<Attribute>),
    Map {
        key: Box<Attribute>,
        elem: Box<Attribute>,
    },
    /// Reference to a named user type.
    User(String),
}

impl DataType {
    /// Returns the user type name if this is a user type reference.
    pub fn user_name(&self) -> Option<&str> {
        match self {
            DataType::User(name) => Some(name),
            _ => None,
        }
    }
}

/// A named field of an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub attribute: Attribute,
}

impl Field {
    pub fn new(name: impl Into<String>, attribute: Attribute) -> Self {
        Self {
            name: name.into(),
            attribute,
        }
    }
}

/// Constraints attached to an attribute.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Validation {
    /// Names of the object fields that must be set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    /// Regular expression the value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Allowed values.
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,

    /// Well-known format name (e.g. `email`, `uuid`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Validation {
    /// Returns true if no constraint is set.
    pub fn is_empty(&self) -> bool {
        self == &Validation::default()
    }
}

/// A typed value description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Attribute {
    pub ty: DataType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Validation::is_empty")]
    pub validation: Validation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,

    /// Free-form key/value annotations (e.g. `rpc:tag`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

impl Attribute {
    pub fn new(ty: DataType) -> Self {
        Self {
            ty,
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self::new(DataType::Empty)
    }

    pub fn primitive(p: Primitive) -> Self {
        Self::new(DataType::Primitive(p))
    }

    pub fn object(fields: Vec<Field>) -> Self {
        Self::new(DataType::Object(fields))
    }

    pub fn array(elem: Attribute) -> Self {
        Self::new(DataType::Array(Box::new(elem)))
    }

    pub fn map(key: Attribute, elem: Attribute) -> Self {
        Self::new(DataType::Map {
            key: Box::new(key),
            elem: Box::new(elem),
        })
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self::new(DataType::User(name.into()))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.validation.required = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_example(mut self, value: Value) -> Self {
        self.example = Some(value);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Get an object field by name. `None` for non-object attributes.
    pub fn field(&self, name: &str) -> Option<&Field> {
        match &self.ty {
            DataType::Object(fields) => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }

    /// Returns true if the named field is listed as required.
    pub fn is_required(&self, name: &str) -> bool {
        self.validation.required.iter().any(|r| r == name)
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }
}

/// A named projection of a result type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub name: String,

    /// Fields of the result exposed by the view.
    pub fields: Vec<String>,
}

/// A named type declared in the design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserType {
    pub name: String,

    pub attribute: Attribute,

    /// Views, for result types rendered through projections.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<View>,
}

impl UserType {
    pub fn new(name: impl Into<String>, attribute: Attribute) -> Self {
        Self {
            name: name.into(),
            attribute,
            views: Vec::new(),
        }
    }

    pub fn with_views(mut self, views: Vec<View>) -> Self {
        self.views = views;
        self
    }

    /// Returns true if this type is rendered through views.
    pub fn has_views(&self) -> bool {
        !self.views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_field_lookup() {
        let att = Attribute::object(vec![
            Field::new("a", Attribute::primitive(Primitive::Int32)),
            Field::new("b", Attribute::primitive(Primitive::String)),
        ])
        .with_required(["a"]);

        assert!(att.field("a").is_some());
        assert!(att.field("c").is_none());
        assert!(att.is_required("a"));
        assert!(!att.is_required("b"));
        assert!(Attribute::primitive(Primitive::Boolean).field("a").is_none());
    }

    #[test]
    fn primitive_kinds() {
        assert!(Primitive::UInt32.is_integer());
        assert!(Primitive::Float32.is_numeric());
        assert!(!Primitive::String.is_numeric());
        assert!(!Primitive::Float64.is_integer());
    }

    #[test]
    fn validation_emptiness() {
        assert!(Validation::default().is_empty());
        let v = Validation {
            min_length: Some(1),
            ..Default::default()
        };
        assert!(!v.is_empty());
        let r = Validation {
            required: vec!["a".into()],
            ..Default::default()
        };
        assert!(!r.is_empty());
    }

    #[test]
    fn serde_shape() {
        let att = Attribute::map(
            Attribute::primitive(Primitive::String),
            Attribute::array(Attribute::user("Bottle")),
        );
        let json = serde_json::to_string(&att).unwrap();
        let back: Attribute = serde_json::from_str(&json).unwrap();
        assert_eq!(att, back);

        let parsed: Attribute =
            serde_json::from_str(r#"{"ty":{"primitive":"int32"},"default":3}"#).unwrap();
        assert_eq!(parsed.ty, DataType::Primitive(Primitive::Int32));
        assert_eq!(parsed.default, Some(serde_json::json!(3)));
    }
}
