//! Wire shaping: derives the wire message types of every endpoint of a
//! service from its payload, result and streaming payload.
//!
//! - inline structure payloads/results become named service types
//!   (`<Method>Payload`, `<Method>Result`, `<Method>StreamingPayload`)
//! - each endpoint gets `<Method>Request`, `<Method>Response` and, when it
//!   streams a payload, `<Method>StreamingRequest`
//! - fields bound to metadata are left out of the body messages
//! - values that are not structures are wrapped in a message with a single
//!   field named `field`
//! - object fields are renamed to snake_case wire names; the service field name
//!   is kept under [`META_ORIGIN`] and the field tag under `rpc:tag`

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;
use wiremap_ir::{
    Attribute, DataType, Design, Field, Primitive, ServiceDef, UserType, META_TAG, META_WIRE_NAME,
};

use crate::error::CompileError;
use crate::naming::{pascal, snake};
use crate::registry::TypeRegistry;

/// Meta key holding the service-side name of a wire field.
pub const META_ORIGIN: &str = "wire:origin";

/// Meta key marking a single-field message wrapping a non-structure value.
pub const META_WRAPPED: &str = "wire:wrapped";

/// Name of the field of wrapping messages.
pub const WRAPPED_FIELD: &str = "field";

/// Service-side and wire-side types of one endpoint.
#[derive(Debug, Clone, Default)]
pub struct EndpointTypes {
    pub payload: Attribute,
    pub result: Attribute,
    pub streaming_payload: Attribute,
    /// Always a reference to the endpoint's request message.
    pub request: Attribute,
    /// `Empty` unless the endpoint streams a non-empty payload.
    pub streaming_request: Attribute,
    /// Always a reference to the endpoint's response message.
    pub response: Attribute,
}

/// Type registries of a service, with the endpoint types in method order.
#[derive(Debug, Clone, Default)]
pub struct ServiceTypes {
    pub service: TypeRegistry,
    pub wire: TypeRegistry,
    pub endpoints: Vec<EndpointTypes>,
}

/// Builds the service and wire type registries of `svc`.
pub fn shape_service(design: &Design, svc: &ServiceDef) -> Result<ServiceTypes, CompileError> {
    let service = TypeRegistry::from_types(design.types.iter().cloned());
    service.check_all()?;

    let mut shaper = Shaper {
        service,
        wire: TypeRegistry::new(),
        wire_names: BTreeMap::new(),
        inlining: BTreeSet::new(),
    };

    let mut endpoints = Vec::with_capacity(svc.methods.len());
    for m in &svc.methods {
        let context = format!("{}.{}", svc.name, m.name);
        let base = pascal(&m.name);
        let payload = shaper.named(&m.payload, format!("{}Payload", base));
        let result = shaper.named(&m.result, format!("{}Result", base));
        let streaming_payload =
            shaper.named(&m.streaming_payload, format!("{}StreamingPayload", base));
        for att in [&payload, &result, &streaming_payload] {
            shaper.service.check_references(&context, att)?;
        }
        for e in svc.errors_of(m) {
            shaper.service.check_references(&context, &e.attribute)?;
        }
        endpoints.push(EndpointTypes {
            payload,
            result,
            streaming_payload,
            ..Default::default()
        });
    }

    for (m, ep) in svc.methods.iter().zip(endpoints.iter_mut()) {
        let context = format!("{}.{}", svc.name, m.name);
        let base = pascal(&m.name);

        let bound: Vec<&str> = m.metadata.iter().map(|b| b.attribute.as_str()).collect();
        if m.stream.is_payload_streaming() || !shaper.service.is_empty_type(&ep.streaming_payload.ty) {
            shaper.check_streamed_payload(&ep.payload, &bound, &context)?;
        }
        ep.request = shaper.message(&format!("{}Request", base), &ep.payload, &bound, &context)?;

        if !shaper.service.is_empty_type(&ep.streaming_payload.ty) {
            ep.streaming_request = shaper.message(
                &format!("{}StreamingRequest", base),
                &ep.streaming_payload,
                &[],
                &context,
            )?;
        }

        let bound: Vec<&str> = m
            .response
            .headers
            .iter()
            .chain(m.response.trailers.iter())
            .map(|b| b.attribute.as_str())
            .collect();
        ep.response = shaper.message(&format!("{}Response", base), &ep.result, &bound, &context)?;
    }

    Ok(ServiceTypes {
        service: shaper.service,
        wire: shaper.wire,
        endpoints,
    })
}

struct Shaper {
    service: TypeRegistry,
    wire: TypeRegistry,
    /// Service type name to wire type name.
    wire_names: BTreeMap<String, String>,
    /// Non-structure user types being inlined.
    inlining: BTreeSet<String>,
}

impl Shaper {
    /// Registers an inline structure as a service type and returns a reference
    /// to it. Other attributes are returned unchanged.
    fn named(&mut self, att: &Attribute, base: String) -> Attribute {
        if !matches!(att.ty, DataType::Object(_)) {
            return att.clone();
        }
        let name = self.service.fresh_name(&base);
        self.service.insert(UserType::new(name.clone(), att.clone()));
        Attribute {
            ty: DataType::User(name),
            description: att.description.clone(),
            ..Default::default()
        }
    }

    fn taken(&self, name: &str) -> bool {
        self.service.contains(name) || self.wire.contains(name)
    }

    fn message_name(&self, base: &str) -> String {
        if !self.taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|i| format!("{}{}", base, i))
            .find(|n| !self.taken(n))
            .unwrap_or_else(|| base.to_string())
    }

    /// The payload of an endpoint streaming its payload has no message of its
    /// own: every non-empty attribute must be bound to metadata.
    fn check_streamed_payload(
        &self,
        payload: &Attribute,
        bound: &[&str],
        context: &str,
    ) -> Result<(), CompileError> {
        if self.service.is_empty_type(&payload.ty) {
            return Ok(());
        }
        let unbound: Vec<String> = match &self.service.resolve_attribute(payload).ty {
            DataType::Object(fields) => fields
                .iter()
                .filter(|f| !bound.contains(&f.name.as_str()))
                .filter(|f| !self.service.is_empty_type(&f.attribute.ty))
                .map(|f| format!("'{}'", f.name))
                .collect(),
            _ if bound.is_empty() => vec!["the payload".to_string()],
            _ => Vec::new(),
        };
        if unbound.is_empty() {
            return Ok(());
        }
        Err(CompileError::UnboundStreamingPayload {
            endpoint: context.to_string(),
            attributes: unbound.join(", "),
        })
    }

    /// Builds and registers a top-level message carrying `value` minus the
    /// fields named in `bound`.
    fn message(
        &mut self,
        base: &str,
        value: &Attribute,
        bound: &[&str],
        context: &str,
    ) -> Result<Attribute, CompileError> {
        let name = self.message_name(base);
        self.wire.insert(UserType::new(name.clone(), Attribute::empty()));

        let resolved = self.service.resolve_attribute(value).clone();
        let mut attribute = if self.service.is_empty_type(&value.ty) {
            Attribute::object(vec![])
        } else {
            match &resolved.ty {
                DataType::Object(fields) => self.wire_object(&resolved, fields, bound, context)?,
                // the whole value travels as metadata
                _ if !bound.is_empty() => Attribute::object(vec![]),
                _ => {
                    let mut inner = self.to_wire(value, context)?;
                    inner.meta.insert(META_TAG.to_string(), "1".to_string());
                    Attribute::object(vec![Field::new(WRAPPED_FIELD, inner)])
                        .with_required([WRAPPED_FIELD])
                        .with_meta(META_WRAPPED, WRAPPED_FIELD)
                }
            }
        };
        attribute.description = value.description.clone().or(resolved.description);

        debug!(message = %name, "shaped wire message");
        self.wire.insert(UserType::new(name.clone(), attribute));
        Ok(Attribute::user(name))
    }

    fn wire_object(
        &mut self,
        att: &Attribute,
        fields: &[Field],
        excluded: &[&str],
        context: &str,
    ) -> Result<Attribute, CompileError> {
        let mut out = Vec::with_capacity(fields.len());
        let mut required = Vec::new();
        for (i, f) in fields.iter().enumerate() {
            if excluded.contains(&f.name.as_str()) {
                continue;
            }
            let wire_name = f
                .attribute
                .meta(META_WIRE_NAME)
                .map(str::to_string)
                .unwrap_or_else(|| snake(&f.name));
            let tag = f
                .attribute
                .meta(META_TAG)
                .map(str::to_string)
                .unwrap_or_else(|| (i + 1).to_string());

            let mut fa = self.to_wire(&f.attribute, context)?;
            fa.meta.insert(META_ORIGIN.to_string(), f.name.clone());
            fa.meta.insert(META_TAG.to_string(), tag);
            if att.is_required(&f.name) {
                required.push(wire_name.clone());
            }
            out.push(Field::new(wire_name, fa));
        }

        let mut validation = att.validation.clone();
        validation.required = required;
        Ok(Attribute {
            ty: DataType::Object(out),
            description: att.description.clone(),
            validation,
            default: None,
            example: att.example.clone(),
            meta: att.meta.clone(),
        })
    }

    fn to_wire(&mut self, att: &Attribute, context: &str) -> Result<Attribute, CompileError> {
        let ty = match &att.ty {
            DataType::Empty => DataType::Empty,
            DataType::Primitive(Primitive::Any) => {
                return Err(CompileError::UnsupportedWireType {
                    context: context.to_string(),
                    reason: "values of type any cannot be carried on the wire".to_string(),
                })
            }
            DataType::Primitive(p) => DataType::Primitive(*p),
            DataType::Object(fields) => return self.wire_object(att, fields, &[], context),
            DataType::Array(elem) => DataType::Array(Box::new(self.to_wire(elem, context)?)),
            DataType::Map { key, elem } => DataType::Map {
                key: Box::new(self.to_wire(key, context)?),
                elem: Box::new(self.to_wire(elem, context)?),
            },
            DataType::User(name) => return self.wire_user(att, name, context),
        };
        Ok(with_type(att, ty))
    }

    fn wire_user(
        &mut self,
        att: &Attribute,
        name: &str,
        context: &str,
    ) -> Result<Attribute, CompileError> {
        if let Some(wire_name) = self.wire_names.get(name) {
            return Ok(with_type(att, DataType::User(wire_name.clone())));
        }
        let Some(ut) = self.service.get(name).cloned() else {
            return Err(CompileError::UnknownType {
                context: context.to_string(),
                name: name.to_string(),
            });
        };

        if !self.service.is_object(&ut.attribute.ty) {
            // aliases of non-structures are inlined
            if !self.inlining.insert(name.to_string()) {
                return Err(CompileError::UnsupportedWireType {
                    context: context.to_string(),
                    reason: format!("recursive type '{}' is not a structure", name),
                });
            }
            let inner = self.to_wire(&ut.attribute, context);
            self.inlining.remove(name);
            let mut inner = inner?;
            if att.description.is_some() {
                inner.description = att.description.clone();
            }
            inner.meta.extend(att.meta.clone());
            return Ok(inner);
        }

        let wire_name = self.wire.fresh_name(&ut.name);
        self.wire_names.insert(ut.name.clone(), wire_name.clone());
        self.wire
            .insert(UserType::new(wire_name.clone(), Attribute::empty()));
        let attribute = self.to_wire(&ut.attribute, &wire_name)?;
        self.wire.insert(UserType::new(wire_name.clone(), attribute));
        Ok(with_type(att, DataType::User(wire_name)))
    }
}

fn with_type(att: &Attribute, ty: DataType) -> Attribute {
    Attribute {
        ty,
        description: att.description.clone(),
        validation: att.validation.clone(),
        default: att.default.clone(),
        example: att.example.clone(),
        meta: att.meta.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremap_ir::{MetadataBinding, MethodDef};

    fn operands() -> UserType {
        UserType::new(
            "Operands",
            Attribute::object(vec![
                Field::new("a", Attribute::primitive(Primitive::Int32)),
                Field::new("b", Attribute::primitive(Primitive::Int32)),
            ])
            .with_required(["a", "b"]),
        )
    }

    fn design(types: Vec<UserType>, methods: Vec<MethodDef>) -> Design {
        Design {
            name: "api".into(),
            types,
            services: vec![ServiceDef {
                name: "calc".into(),
                methods,
                ..Default::default()
            }],
        }
    }

    fn shape(d: &Design) -> Result<ServiceTypes, CompileError> {
        shape_service(d, &d.services[0])
    }

    fn fields(reg: &TypeRegistry, att: &Attribute) -> Vec<(String, String)> {
        match &reg.resolve_attribute(att).ty {
            DataType::Object(fs) => fs
                .iter()
                .map(|f| {
                    (
                        f.name.clone(),
                        f.attribute.meta(META_TAG).unwrap_or_default().to_string(),
                    )
                })
                .collect(),
            _ => vec![],
        }
    }

    #[test]
    fn request_and_wrapped_response() {
        let mut add = MethodDef::new("add");
        add.payload = Attribute::user("Operands");
        add.result = Attribute::primitive(Primitive::Int32);
        let d = design(vec![operands()], vec![add]);
        let types = shape(&d).unwrap();
        let ep = &types.endpoints[0];

        assert_eq!(ep.request, Attribute::user("AddRequest"));
        assert_eq!(ep.response, Attribute::user("AddResponse"));
        assert_eq!(ep.streaming_request.ty, DataType::Empty);
        assert_eq!(
            fields(&types.wire, &ep.request),
            vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]
        );

        let response = types.wire.get("AddResponse").unwrap();
        assert_eq!(response.attribute.meta(META_WRAPPED), Some(WRAPPED_FIELD));
        assert!(response.attribute.is_required(WRAPPED_FIELD));
        assert_eq!(fields(&types.wire, &ep.response).len(), 1);
    }

    #[test]
    fn metadata_fields_leave_the_body() {
        let mut m = MethodDef::new("login");
        m.payload = Attribute::object(vec![
            Field::new("user_name", Attribute::primitive(Primitive::String)),
            Field::new("token", Attribute::primitive(Primitive::String)),
        ]);
        m.metadata = vec![MetadataBinding::new("token").with_key("authorization")];
        let d = design(vec![], vec![m]);
        let types = shape(&d).unwrap();
        let ep = &types.endpoints[0];

        assert_eq!(ep.payload, Attribute::user("LoginPayload"));
        assert!(types.service.contains("LoginPayload"));
        let req = types.wire.get("LoginRequest").unwrap();
        let f = req.attribute.field("user_name").unwrap();
        assert_eq!(f.attribute.meta(META_ORIGIN), Some("user_name"));
        assert!(req.attribute.field("token").is_none());
    }

    #[test]
    fn bound_primitive_payload_gives_empty_message() {
        let mut m = MethodDef::new("get");
        m.payload = Attribute::primitive(Primitive::String);
        m.metadata = vec![MetadataBinding::new("id")];
        let d = design(vec![], vec![m]);
        let types = shape(&d).unwrap();
        assert!(types.wire.is_empty_type(&types.endpoints[0].request.ty));
        assert!(types.wire.is_empty_type(&types.endpoints[0].response.ty));
    }

    #[test]
    fn recursive_types_terminate() {
        let node = UserType::new(
            "Node",
            Attribute::object(vec![
                Field::new("label", Attribute::primitive(Primitive::String)),
                Field::new("children", Attribute::array(Attribute::user("Node"))),
            ]),
        );
        let mut m = MethodDef::new("walk");
        m.payload = Attribute::user("Node");
        m.result = Attribute::user("Node");
        let d = design(vec![node], vec![m]);
        let types = shape(&d).unwrap();

        let wire_node = types.wire.get("Node").unwrap();
        let children = &wire_node.attribute.field("children").unwrap().attribute;
        assert_eq!(children.meta(META_ORIGIN), Some("children"));
        match &children.ty {
            DataType::Array(elem) => assert_eq!(elem.ty, DataType::User("Node".into())),
            other => panic!("unexpected {:?}", other),
        }
        // both messages copy the fields of Node
        assert_eq!(fields(&types.wire, &types.endpoints[0].request).len(), 2);
        assert_eq!(fields(&types.wire, &types.endpoints[0].response).len(), 2);
    }

    #[test]
    fn any_is_rejected() {
        let mut m = MethodDef::new("echo");
        m.payload = Attribute::primitive(Primitive::Any);
        let d = design(vec![], vec![m]);
        let err = shape(&d).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedWireType { .. }));
    }

    #[test]
    fn unknown_types_are_reported() {
        let mut m = MethodDef::new("add");
        m.payload = Attribute::user("Missing");
        let d = design(vec![], vec![m]);
        assert_eq!(
            shape(&d).unwrap_err(),
            CompileError::UnknownType {
                context: "calc.add".into(),
                name: "Missing".into()
            }
        );
    }

    #[test]
    fn message_names_avoid_design_types() {
        let clash = UserType::new(
            "AddRequest",
            Attribute::object(vec![Field::new("x", Attribute::primitive(Primitive::Int))]),
        );
        let mut add = MethodDef::new("add");
        add.payload = Attribute::user("AddRequest");
        let d = design(vec![clash], vec![add]);
        let types = shape(&d).unwrap();
        assert_eq!(types.endpoints[0].request, Attribute::user("AddRequest2"));
    }

    #[test]
    fn streaming_request_only_for_streamed_payloads() {
        let mut m = MethodDef::new("upload");
        m.stream = wiremap_ir::StreamKind::Client;
        m.streaming_payload = Attribute::primitive(Primitive::Bytes);
        let d = design(vec![], vec![m]);
        let types = shape(&d).unwrap();
        assert_eq!(
            types.endpoints[0].streaming_request,
            Attribute::user("UploadStreamingRequest")
        );
    }

    #[test]
    fn streamed_payload_attributes_must_be_metadata() {
        let mut m = MethodDef::new("upload");
        m.stream = wiremap_ir::StreamKind::Client;
        m.streaming_payload = Attribute::primitive(Primitive::Bytes);
        m.payload = Attribute::object(vec![
            Field::new("token", Attribute::primitive(Primitive::String)),
            Field::new("extra", Attribute::primitive(Primitive::String)),
            Field::new("nothing", Attribute::empty()),
        ]);
        m.metadata = vec![MetadataBinding::new("token")];
        let err = shape(&design(vec![], vec![m.clone()])).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnboundStreamingPayload {
                endpoint: "calc.upload".into(),
                attributes: "'extra'".into(),
            }
        );

        m.metadata.push(MetadataBinding::new("extra"));
        assert!(shape(&design(vec![], vec![m.clone()])).is_ok());

        // a bare value needs a binding of its own
        m.payload = Attribute::primitive(Primitive::String);
        m.metadata.clear();
        let err = shape(&design(vec![], vec![m])).unwrap_err();
        assert!(err.to_string().contains("the payload"));
    }
}
