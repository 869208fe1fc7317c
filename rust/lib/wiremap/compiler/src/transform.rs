//! Structural transforms between the service and wire representations of a
//! value.
//!
//! A [`Transform`] is a value-by-value plan: which field feeds which, where
//! numeric casts happen, where a value is wrapped into or unwrapped out of a
//! single-field message. Conversions between nested user types are emitted
//! once per service as a [`TransformHelper`] and referenced by name.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use wiremap_ir::{Attribute, DataType, Field, Primitive};

use crate::analyzer::AttributeAnalyzer;
use crate::naming::snake;
use crate::wire::{META_ORIGIN, META_WRAPPED};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    /// Nothing to copy.
    Empty,
    /// The value is moved as is.
    Assign,
    /// Numeric conversion.
    Cast { from: String, to: String },
    /// Field by field copy into a new structure.
    Struct {
        type_ref: String,
        fields: Vec<FieldAssign>,
    },
    /// The value becomes the single field of a message.
    Wrap { field: String, value: Box<Transform> },
    /// The value is taken out of the single field of a message.
    Unwrap { field: String, value: Box<Transform> },
    Array {
        elem_ref: String,
        elem: Box<Transform>,
    },
    Map {
        key: Box<Transform>,
        elem: Box<Transform>,
    },
    /// Call to a shared helper.
    Helper { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAssign {
    pub source: String,
    pub target: String,
    pub source_pointer: bool,
    pub target_pointer: bool,
    /// Used when the source value is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    pub value: Transform,
}

/// Conversion between two user types, shared by every endpoint of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformHelper {
    pub name: String,
    pub src_name: String,
    pub src_ref: String,
    pub tgt_name: String,
    pub tgt_ref: String,
    pub body: Transform,
}

/// Shapes that cannot be converted into one another.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeMismatch {
    pub path: String,
    pub source_type: String,
    pub target_type: String,
}

/// Builds transforms, registering nested helpers into `helpers`.
pub struct Transformer<'h> {
    helpers: &'h mut Vec<TransformHelper>,
    in_progress: BTreeSet<String>,
}

impl<'h> Transformer<'h> {
    pub fn new(helpers: &'h mut Vec<TransformHelper>) -> Self {
        Self {
            helpers,
            in_progress: BTreeSet::new(),
        }
    }

    /// Transform of the value analyzed by `source` into the one analyzed by
    /// `target`. Top-level user types are converted inline.
    pub fn transform<'a, S, T>(
        &mut self,
        source: &S,
        target: &T,
        path: &str,
    ) -> Result<Transform, ShapeMismatch>
    where
        S: AttributeAnalyzer<'a>,
        T: AttributeAnalyzer<'a>,
    {
        self.convert(source, target, path, true)
    }

    fn convert<'a, S, T>(
        &mut self,
        source: &S,
        target: &T,
        path: &str,
        top: bool,
    ) -> Result<Transform, ShapeMismatch>
    where
        S: AttributeAnalyzer<'a>,
        T: AttributeAnalyzer<'a>,
    {
        if target.is_empty() || source.is_empty() {
            return Ok(Transform::Empty);
        }

        let src = source.resolved();
        let tgt = target.resolved();
        let mismatch = || ShapeMismatch {
            path: path.to_string(),
            source_type: source.name(true),
            target_type: target.name(true),
        };

        let src_object = matches!(src.ty, DataType::Object(_));
        let tgt_object = matches!(tgt.ty, DataType::Object(_));

        if let (Some(field), false) = (tgt.meta(META_WRAPPED), src_object) {
            let inner = object_field(tgt, field).ok_or_else(mismatch)?;
            let value = self.convert(source, &target.dup(inner, true), path, false)?;
            return Ok(Transform::Wrap {
                field: field.to_string(),
                value: Box::new(value),
            });
        }
        if let (Some(field), false) = (src.meta(META_WRAPPED), tgt_object) {
            let inner = object_field(src, field).ok_or_else(mismatch)?;
            let value = self.convert(
                &source.dup(inner, true),
                target,
                &format!("{}.{}", path, field),
                false,
            )?;
            return Ok(Transform::Unwrap {
                field: field.to_string(),
                value: Box::new(value),
            });
        }

        match (&src.ty, &tgt.ty) {
            (DataType::Primitive(a), DataType::Primitive(b)) => {
                primitive(source, target, *a, *b).ok_or_else(mismatch)
            }
            (DataType::Object(_), DataType::Object(_)) => {
                let user_pair = source.attribute().ty.user_name().zip(target.attribute().ty.user_name());
                match user_pair {
                    Some((s, t)) if !top => self.helper(source, target, s, t, path),
                    _ => self.structure(source, target, src, tgt, path),
                }
            }
            (DataType::Array(se), DataType::Array(te)) => {
                let te = target.dup(te, true);
                let elem = self.convert(&source.dup(se, true), &te, &format!("{}[*]", path), false)?;
                Ok(Transform::Array {
                    elem_ref: te.type_ref(true),
                    elem: Box::new(elem),
                })
            }
            (DataType::Map { key: sk, elem: se }, DataType::Map { key: tk, elem: te }) => {
                let key = self.convert(
                    &source.dup(sk, true),
                    &target.dup(tk, true),
                    &format!("{}.keys[*]", path),
                    false,
                )?;
                let elem = self.convert(
                    &source.dup(se, true),
                    &target.dup(te, true),
                    &format!("{}.values[*]", path),
                    false,
                )?;
                Ok(Transform::Map {
                    key: Box::new(key),
                    elem: Box::new(elem),
                })
            }
            _ => Err(mismatch()),
        }
    }

    fn structure<'a, S, T>(
        &mut self,
        source: &S,
        target: &T,
        src: &'a Attribute,
        tgt: &'a Attribute,
        path: &str,
    ) -> Result<Transform, ShapeMismatch>
    where
        S: AttributeAnalyzer<'a>,
        T: AttributeAnalyzer<'a>,
    {
        let (DataType::Object(src_fields), DataType::Object(tgt_fields)) = (&src.ty, &tgt.ty) else {
            return Ok(Transform::Empty);
        };
        let mut fields = Vec::new();
        for tf in tgt_fields {
            // target fields without a source are filled by the caller
            let Some(sf) = src_fields.iter().find(|sf| field_key(sf) == field_key(tf)) else {
                continue;
            };
            let sa = source.dup(&sf.attribute, src.is_required(&sf.name));
            let ta = target.dup(&tf.attribute, tgt.is_required(&tf.name));
            let value = self.convert(&sa, &ta, &format!("{}.{}", path, sf.name), false)?;
            fields.push(FieldAssign {
                source: sf.name.clone(),
                target: tf.name.clone(),
                source_pointer: sa.is_pointer(),
                target_pointer: ta.is_pointer(),
                default_value: if ta.is_pointer() {
                    None
                } else {
                    ta.default_value()
                },
                value,
            });
        }
        Ok(Transform::Struct {
            type_ref: target.name(true),
            fields,
        })
    }

    fn helper<'a, S, T>(
        &mut self,
        source: &S,
        target: &T,
        src_user: &str,
        tgt_user: &str,
        path: &str,
    ) -> Result<Transform, ShapeMismatch>
    where
        S: AttributeAnalyzer<'a>,
        T: AttributeAnalyzer<'a>,
    {
        let name = format!(
            "{}_{}_to_{}_{}",
            source.family(),
            snake(src_user),
            target.family(),
            snake(tgt_user)
        );
        if self.in_progress.contains(&name) || self.helpers.iter().any(|h| h.name == name) {
            return Ok(Transform::Helper { name });
        }

        self.in_progress.insert(name.clone());
        let body = self.convert(source, target, path, true);
        self.in_progress.remove(&name);
        let body = body?;

        debug!(helper = %name, "registered transform helper");
        self.helpers.push(TransformHelper {
            name: name.clone(),
            src_name: source.name(true),
            src_ref: source.type_ref(true),
            tgt_name: target.name(true),
            tgt_ref: target.type_ref(true),
            body,
        });
        Ok(Transform::Helper { name })
    }
}

/// Service-side name of a field.
fn field_key(f: &Field) -> &str {
    f.attribute.meta(META_ORIGIN).unwrap_or(&f.name)
}

fn object_field<'a>(att: &'a Attribute, name: &str) -> Option<&'a Attribute> {
    att.field(name).map(|f| &f.attribute)
}

fn primitive<'a, S, T>(source: &S, target: &T, a: Primitive, b: Primitive) -> Option<Transform>
where
    S: AttributeAnalyzer<'a>,
    T: AttributeAnalyzer<'a>,
{
    let from = source.primitive_name(a);
    let to = target.primitive_name(b);
    if from == to {
        Some(Transform::Assign)
    } else if a.is_numeric() && b.is_numeric() {
        Some(Transform::Cast {
            from: from.to_string(),
            to: to.to_string(),
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{ServiceAnalyzer, WireAnalyzer};
    use crate::registry::TypeRegistry;
    use crate::wire::WRAPPED_FIELD;
    use wiremap_ir::{UserType, META_TAG};

    fn service() -> TypeRegistry {
        TypeRegistry::from_types(vec![
            UserType::new(
                "Order",
                Attribute::object(vec![
                    Field::new("orderId", Attribute::primitive(Primitive::Int)),
                    Field::new("item", Attribute::user("Item")),
                    Field::new("note", Attribute::primitive(Primitive::String)),
                ])
                .with_required(["orderId", "item"]),
            ),
            UserType::new(
                "Item",
                Attribute::object(vec![
                    Field::new("sku", Attribute::primitive(Primitive::String)),
                    Field::new("parts", Attribute::array(Attribute::user("Item"))),
                ]),
            ),
        ])
    }

    fn wire_field(name: &str, origin: &str, att: Attribute) -> Field {
        Field::new(name, att.with_meta(META_ORIGIN, origin))
    }

    fn wire() -> TypeRegistry {
        TypeRegistry::from_types(vec![
            UserType::new(
                "OrderRequest",
                Attribute::object(vec![
                    wire_field("order_id", "orderId", Attribute::primitive(Primitive::Int)),
                    wire_field("item", "item", Attribute::user("Item")),
                ])
                .with_required(["order_id", "item"]),
            ),
            UserType::new(
                "Item",
                Attribute::object(vec![
                    wire_field("sku", "sku", Attribute::primitive(Primitive::String)),
                    wire_field("parts", "parts", Attribute::array(Attribute::user("Item"))),
                ]),
            ),
            UserType::new(
                "CountResponse",
                Attribute::object(vec![Field::new(
                    WRAPPED_FIELD,
                    Attribute::primitive(Primitive::Int64).with_meta(META_TAG, "1"),
                )])
                .with_meta(META_WRAPPED, WRAPPED_FIELD),
            ),
        ])
    }

    #[test]
    fn structure_with_renamed_fields_and_helpers() {
        let (svc, pb) = (service(), wire());
        let order = Attribute::user("Order");
        let request = Attribute::user("OrderRequest");
        let source = WireAnalyzer::new(&request, &pb, "pb");
        let target = ServiceAnalyzer::new(&order, &svc, "shop");

        let mut helpers = Vec::new();
        let t = Transformer::new(&mut helpers)
            .transform(&source, &target, "message")
            .unwrap();

        let Transform::Struct { type_ref, fields } = t else {
            panic!("expected a structure");
        };
        assert_eq!(type_ref, "shop::Order");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].source, "order_id");
        assert_eq!(fields[0].target, "orderId");
        assert_eq!(
            fields[0].value,
            Transform::Cast {
                from: "i32".into(),
                to: "i64".into()
            }
        );
        assert_eq!(
            fields[1].value,
            Transform::Helper {
                name: "wire_item_to_svc_item".into()
            }
        );

        // the recursive helper is registered once and refers to itself
        assert_eq!(helpers.len(), 1);
        let Transform::Struct { fields, .. } = &helpers[0].body else {
            panic!("expected a structure");
        };
        assert_eq!(
            fields[1].value,
            Transform::Array {
                elem_ref: "shop::Item".into(),
                elem: Box::new(Transform::Helper {
                    name: "wire_item_to_svc_item".into()
                }),
            }
        );
    }

    #[test]
    fn wrap_and_unwrap() {
        let (svc, pb) = (service(), wire());
        let count = Attribute::primitive(Primitive::Int);
        let response = Attribute::user("CountResponse");
        let svc_an = ServiceAnalyzer::new(&count, &svc, "shop");
        let pb_an = WireAnalyzer::new(&response, &pb, "pb");

        let mut helpers = Vec::new();
        let mut t = Transformer::new(&mut helpers);
        assert_eq!(
            t.transform(&svc_an, &pb_an, "result").unwrap(),
            Transform::Wrap {
                field: "field".into(),
                value: Box::new(Transform::Assign),
            }
        );
        assert_eq!(
            t.transform(&pb_an, &svc_an, "message").unwrap(),
            Transform::Unwrap {
                field: "field".into(),
                value: Box::new(Transform::Assign),
            }
        );
    }

    #[test]
    fn incompatible_shapes() {
        let svc = service();
        let pb = wire();
        let text = Attribute::primitive(Primitive::String);
        let list = Attribute::array(Attribute::primitive(Primitive::String));
        let mut helpers = Vec::new();
        let err = Transformer::new(&mut helpers)
            .transform(
                &ServiceAnalyzer::new(&text, &svc, "shop"),
                &WireAnalyzer::new(&list, &pb, "pb"),
                "payload",
            )
            .unwrap_err();
        assert_eq!(err.path, "payload");
        assert_eq!(err.source_type, "String");
        assert_eq!(err.target_type, "Vec<String>");
    }

    #[test]
    fn empty_values_need_no_transform() {
        let svc = service();
        let pb = wire();
        let empty = Attribute::object(vec![]);
        let order = Attribute::user("Order");
        let mut helpers = Vec::new();
        let t = Transformer::new(&mut helpers)
            .transform(
                &WireAnalyzer::new(&empty, &pb, "pb"),
                &ServiceAnalyzer::new(&order, &svc, "shop"),
                "message",
            )
            .unwrap();
        assert_eq!(t, Transform::Empty);
    }
}
