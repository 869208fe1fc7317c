//! Metadata extractor: describes the payload or result attributes carried
//! out of band (request metadata, response headers and trailers).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wiremap_ir::{Attribute, DataType, MetadataBinding, Primitive};

use crate::analyzer::AttributeAnalyzer;
use crate::error::CompileError;
use crate::naming::{snake, NameScope};
use crate::registry::TypeRegistry;
use crate::validation::{recursive_validation, ValidationRule};

/// One out-of-band value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataField {
    /// Metadata key.
    pub name: String,
    /// Name of the bound payload/result attribute.
    pub attribute_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Field of the owning structure. Empty if the owner is not a structure.
    pub field_name: String,
    /// Generated variable name, unique within the service.
    pub var_name: String,
    pub type_name: String,
    pub type_ref: String,
    pub required: bool,
    /// Set only for optional primitives.
    pub pointer: bool,
    pub string_slice: bool,
    pub slice: bool,
    /// Map of strings to lists of strings.
    pub map_string_slice: bool,
    pub map: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validate: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

/// Describes the attributes of `owner` named by `bindings`, in binding order.
///
/// `owner` analyzes the payload or result the bindings refer to; `what` names
/// it in diagnostics. If the owner is not a structure the single binding
/// carries the whole value.
pub fn extract_metadata<'a, A: AttributeAnalyzer<'a>>(
    bindings: &[MetadataBinding],
    owner: &A,
    scope: &mut NameScope,
    endpoint: &str,
    what: &str,
) -> Result<Vec<MetadataField>, CompileError> {
    let registry = owner.registry();
    let resolved = owner.resolved();
    let is_object = matches!(resolved.ty, DataType::Object(_));

    let mut metadata = Vec::with_capacity(bindings.len());
    for b in bindings {
        let unknown = || CompileError::UnknownMetadata {
            endpoint: endpoint.to_string(),
            owner: what.to_string(),
            attribute: b.attribute.clone(),
        };
        let (att, required): (&'a Attribute, bool) = if is_object {
            let field = resolved.field(&b.attribute).ok_or_else(unknown)?;
            (&field.attribute, resolved.is_required(&b.attribute))
        } else if owner.is_empty() {
            return Err(unknown());
        } else {
            (owner.attribute(), true)
        };

        let an = owner.dup(att, required);
        let var_name = scope.unique(&snake(&b.attribute));
        let field_name = if is_object {
            snake(&b.attribute)
        } else {
            String::new()
        };
        let underlying = registry.underlying(&att.ty);

        metadata.push(MetadataField {
            name: b.key_name().to_string(),
            attribute_name: b.attribute.clone(),
            description: att.description.clone(),
            field_name,
            type_name: an.name(false),
            type_ref: an.type_ref(false),
            required: an.required(),
            pointer: an.is_pointer() && !an.required() && registry.is_primitive(&att.ty),
            string_slice: is_string_array(registry, underlying),
            slice: matches!(underlying, DataType::Array(_)),
            map_string_slice: is_string_array_map(registry, underlying),
            map: matches!(underlying, DataType::Map { .. }),
            validate: recursive_validation(&an, &var_name),
            default_value: an.default_value(),
            example: an.example(),
            var_name,
        });
    }
    Ok(metadata)
}

fn is_string(registry: &TypeRegistry, ty: &DataType) -> bool {
    registry.primitive(ty) == Some(Primitive::String)
}

fn is_string_array(registry: &TypeRegistry, ty: &DataType) -> bool {
    match ty {
        DataType::Array(elem) => is_string(registry, &elem.ty),
        _ => false,
    }
}

fn is_string_array_map(registry: &TypeRegistry, ty: &DataType) -> bool {
    match ty {
        DataType::Map { key, elem } => {
            is_string(registry, &key.ty) && is_string_array(registry, registry.underlying(&elem.ty))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ServiceAnalyzer;
    use wiremap_ir::{Field, UserType, Validation};

    fn registry() -> TypeRegistry {
        TypeRegistry::from_types(vec![UserType::new(
            "ListPayload",
            Attribute::object(vec![
                Field::new(
                    "token",
                    Attribute::primitive(Primitive::String).with_validation(Validation {
                        min_length: Some(8),
                        ..Default::default()
                    }),
                ),
                Field::new("page", Attribute::primitive(Primitive::Int)),
                Field::new(
                    "tags",
                    Attribute::array(Attribute::primitive(Primitive::String)),
                ),
                Field::new(
                    "filters",
                    Attribute::map(
                        Attribute::primitive(Primitive::String),
                        Attribute::array(Attribute::primitive(Primitive::String)),
                    ),
                ),
            ])
            .with_required(["token"]),
        )])
    }

    #[test]
    fn structure_fields() {
        let reg = registry();
        let att = Attribute::user("ListPayload");
        let an = ServiceAnalyzer::new(&att, &reg, "catalog");
        let bindings = vec![
            MetadataBinding::new("token").with_key("authorization"),
            MetadataBinding::new("page"),
            MetadataBinding::new("tags"),
            MetadataBinding::new("filters"),
        ];
        let mut scope = NameScope::new();
        let md = extract_metadata(&bindings, &an, &mut scope, "catalog.list", "payload").unwrap();

        assert_eq!(md.len(), 4);
        let token = &md[0];
        assert_eq!(token.name, "authorization");
        assert_eq!(token.attribute_name, "token");
        assert_eq!(token.field_name, "token");
        assert!(token.required);
        assert!(!token.pointer);
        assert_eq!(token.validate.len(), 1);
        assert_eq!(token.validate[0].path, "token");

        let page = &md[1];
        assert!(page.pointer);
        assert_eq!(page.type_ref, "Option<i64>");
        assert_eq!(page.type_name, "i64");

        assert!(md[2].slice && md[2].string_slice && !md[2].pointer);
        assert!(md[3].map && md[3].map_string_slice);
    }

    #[test]
    fn names_are_unique_across_lists() {
        let reg = registry();
        let att = Attribute::user("ListPayload");
        let an = ServiceAnalyzer::new(&att, &reg, "catalog");
        let bindings = vec![MetadataBinding::new("token")];
        let mut scope = NameScope::new();
        let first = extract_metadata(&bindings, &an, &mut scope, "e", "payload").unwrap();
        let second = extract_metadata(&bindings, &an, &mut scope, "e", "payload").unwrap();
        assert_eq!(first[0].var_name, "token");
        assert_eq!(second[0].var_name, "token2");
    }

    #[test]
    fn whole_value_binding() {
        let reg = TypeRegistry::new();
        let att = Attribute::primitive(Primitive::String);
        let an = ServiceAnalyzer::new(&att, &reg, "catalog");
        let bindings = vec![MetadataBinding::new("id")];
        let md = extract_metadata(&bindings, &an, &mut NameScope::new(), "e", "payload").unwrap();
        assert_eq!(md[0].field_name, "");
        assert!(md[0].required);
        assert!(!md[0].pointer);
    }

    #[test]
    fn unknown_attribute_is_an_error() {
        let reg = registry();
        let att = Attribute::user("ListPayload");
        let an = ServiceAnalyzer::new(&att, &reg, "catalog");
        let bindings = vec![MetadataBinding::new("missing")];
        let err = extract_metadata(&bindings, &an, &mut NameScope::new(), "catalog.list", "payload")
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownMetadata {
                endpoint: "catalog.list".into(),
                owner: "payload".into(),
                attribute: "missing".into(),
            }
        );
    }
}
