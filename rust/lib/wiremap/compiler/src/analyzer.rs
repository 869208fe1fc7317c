//! Attribute analyzers: naming and typing queries over one side of a
//! conversion.
//!
//! Every synthesis routine is generic over [`AttributeAnalyzer`], so the same
//! code builds server-side and client-side conversions by swapping the source
//! and target analyzers.

use serde_json::Value;

use wiremap_ir::{Attribute, DataType, Primitive};

use crate::naming::pascal;
use crate::registry::TypeRegistry;

/// Queries over an attribute, bound to the naming rules of one type family.
pub trait AttributeAnalyzer<'a>: Sized {
    /// The analyzed attribute.
    fn attribute(&self) -> &'a Attribute;

    /// Registry resolving the user types of this family.
    fn registry(&self) -> &'a TypeRegistry;

    /// Whether the attribute is required by its parent.
    fn required(&self) -> bool;

    /// Short label of the type family: `svc`, `view` or `wire`.
    fn family(&self) -> &'static str;

    /// An analyzer for `attribute` with the same naming rules.
    fn dup(&self, attribute: &'a Attribute, required: bool) -> Self;

    /// Rendered name of a primitive in this family.
    fn primitive_name(&self, p: Primitive) -> &'static str;

    /// Rendered name of a user type in this family.
    fn user_type_name(&self, name: &str, qualified: bool) -> String;

    /// Whether values are held through an optional indirection.
    fn is_pointer(&self) -> bool;

    /// Returns true for analyzers of wire message types.
    fn is_wire(&self) -> bool {
        self.family() == "wire"
    }

    /// Type name, without indirection.
    fn name(&self, qualified: bool) -> String {
        type_name(self, self.attribute(), qualified)
    }

    /// Type reference, wrapped in `Option` when [`is_pointer`](Self::is_pointer).
    fn type_ref(&self, qualified: bool) -> String {
        let name = self.name(qualified);
        if self.is_pointer() {
            format!("Option<{}>", name)
        } else {
            name
        }
    }

    fn default_value(&self) -> Option<Value> {
        self.attribute().default.clone()
    }

    fn example(&self) -> Option<Value> {
        self.attribute().example.clone()
    }

    /// The attribute with user type references followed.
    fn resolved(&self) -> &'a Attribute {
        self.registry().resolve_attribute(self.attribute())
    }

    /// Returns true if values carry no data.
    fn is_empty(&self) -> bool {
        self.registry().is_empty_type(&self.attribute().ty)
    }
}

fn type_name<'a, A: AttributeAnalyzer<'a>>(an: &A, att: &'a Attribute, qualified: bool) -> String {
    match &att.ty {
        DataType::Empty => "()".to_string(),
        DataType::Primitive(p) => an.primitive_name(*p).to_string(),
        DataType::Object(fields) => {
            if fields.is_empty() {
                return "struct {}".to_string();
            }
            let fields: Vec<String> = fields
                .iter()
                .map(|f| {
                    let fa = an.dup(&f.attribute, att.is_required(&f.name));
                    format!("{}: {}", f.name, fa.type_ref(qualified))
                })
                .collect();
            format!("struct {{ {} }}", fields.join(", "))
        }
        DataType::Array(elem) => format!("Vec<{}>", an.dup(elem, true).type_ref(qualified)),
        DataType::Map { key, elem } => format!(
            "HashMap<{}, {}>",
            an.dup(key, true).type_ref(qualified),
            an.dup(elem, true).type_ref(qualified)
        ),
        DataType::User(name) => an.user_type_name(name, qualified),
    }
}

/// Analyzer of the service's own types.
///
/// In projected mode the analyzer addresses the view-projected types of the
/// `views` module: names carry a `View` suffix and every primitive is optional.
#[derive(Debug, Clone)]
pub struct ServiceAnalyzer<'a> {
    attribute: &'a Attribute,
    registry: &'a TypeRegistry,
    required: bool,
    package: String,
    projected: bool,
}

impl<'a> ServiceAnalyzer<'a> {
    pub fn new(attribute: &'a Attribute, registry: &'a TypeRegistry, package: &str) -> Self {
        Self {
            attribute,
            registry,
            required: true,
            package: package.to_string(),
            projected: false,
        }
    }

    pub fn projected(attribute: &'a Attribute, registry: &'a TypeRegistry, package: &str) -> Self {
        Self {
            projected: true,
            ..Self::new(attribute, registry, package)
        }
    }
}

impl<'a> AttributeAnalyzer<'a> for ServiceAnalyzer<'a> {
    fn attribute(&self) -> &'a Attribute {
        self.attribute
    }

    fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    fn required(&self) -> bool {
        self.required
    }

    fn family(&self) -> &'static str {
        if self.projected {
            "view"
        } else {
            "svc"
        }
    }

    fn dup(&self, attribute: &'a Attribute, required: bool) -> Self {
        Self {
            attribute,
            registry: self.registry,
            required,
            package: self.package.clone(),
            projected: self.projected,
        }
    }

    fn primitive_name(&self, p: Primitive) -> &'static str {
        match p {
            Primitive::Boolean => "bool",
            Primitive::Int | Primitive::Int64 => "i64",
            Primitive::Int32 => "i32",
            Primitive::UInt | Primitive::UInt64 => "u64",
            Primitive::UInt32 => "u32",
            Primitive::Float32 => "f32",
            Primitive::Float64 => "f64",
            Primitive::String => "String",
            Primitive::Bytes => "Vec<u8>",
            Primitive::Any => "serde_json::Value",
        }
    }

    fn user_type_name(&self, name: &str, qualified: bool) -> String {
        let name = if self.projected {
            format!("{}View", pascal(name))
        } else {
            pascal(name)
        };
        match (qualified, self.projected) {
            (false, _) => name,
            (true, false) => format!("{}::{}", self.package, name),
            (true, true) => format!("{}::views::{}", self.package, name),
        }
    }

    fn is_pointer(&self) -> bool {
        if !self.registry.is_primitive(&self.attribute.ty) {
            return false;
        }
        if self.projected {
            return true;
        }
        !self.required && self.attribute.default.is_none()
    }
}

/// Analyzer of wire message types. Wire values are never optional.
#[derive(Debug, Clone)]
pub struct WireAnalyzer<'a> {
    attribute: &'a Attribute,
    registry: &'a TypeRegistry,
    required: bool,
    package: String,
}

impl<'a> WireAnalyzer<'a> {
    pub fn new(attribute: &'a Attribute, registry: &'a TypeRegistry, package: &str) -> Self {
        Self {
            attribute,
            registry,
            required: true,
            package: package.to_string(),
        }
    }
}

impl<'a> AttributeAnalyzer<'a> for WireAnalyzer<'a> {
    fn attribute(&self) -> &'a Attribute {
        self.attribute
    }

    fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    fn required(&self) -> bool {
        self.required
    }

    fn family(&self) -> &'static str {
        "wire"
    }

    fn dup(&self, attribute: &'a Attribute, required: bool) -> Self {
        Self {
            attribute,
            registry: self.registry,
            required,
            package: self.package.clone(),
        }
    }

    fn primitive_name(&self, p: Primitive) -> &'static str {
        match p {
            Primitive::Boolean => "bool",
            Primitive::Int | Primitive::Int32 => "i32",
            Primitive::Int64 => "i64",
            Primitive::UInt | Primitive::UInt32 => "u32",
            Primitive::UInt64 => "u64",
            Primitive::Float32 => "f32",
            Primitive::Float64 => "f64",
            Primitive::String => "String",
            Primitive::Bytes => "Vec<u8>",
            // rejected by wire shaping
            Primitive::Any => "()",
        }
    }

    fn user_type_name(&self, name: &str, qualified: bool) -> String {
        if qualified {
            format!("{}::{}", self.package, pascal(name))
        } else {
            pascal(name)
        }
    }

    fn is_pointer(&self) -> bool {
        false
    }
}
