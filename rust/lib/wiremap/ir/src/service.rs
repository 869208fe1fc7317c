//! Services and their methods.

use serde::{Deserialize, Serialize};

use crate::types::{Attribute, Primitive};

/// How a method streams data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Unary request and response.
    #[default]
    None,
    /// The client streams payloads, the server replies once.
    Client,
    /// The server streams results.
    Server,
    Bidirectional,
}

impl StreamKind {
    pub fn is_streaming(self) -> bool {
        self != StreamKind::None
    }

    /// Returns true if the client sends a stream of payloads.
    pub fn is_payload_streaming(self) -> bool {
        matches!(self, StreamKind::Client | StreamKind::Bidirectional)
    }

    /// Returns true if the server sends a stream of results.
    pub fn is_result_streaming(self) -> bool {
        matches!(self, StreamKind::Server | StreamKind::Bidirectional)
    }

    /// Whether the server side of the stream must be closed explicitly.
    pub fn server_must_close(self) -> bool {
        self.is_result_streaming()
    }

    /// Whether the client side of the stream must be closed explicitly.
    pub fn client_must_close(self) -> bool {
        self.is_payload_streaming()
    }
}

/// Binds a payload or result attribute to an out-of-band metadata key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataBinding {
    /// Name of the payload/result attribute.
    pub attribute: String,

    /// Metadata key. Defaults to the attribute name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl MetadataBinding {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// The metadata key the attribute is carried under.
    pub fn key_name(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.attribute)
    }
}

/// Where a security credential travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Carrier {
    /// Inside the request message.
    Message,
    /// In the request metadata.
    #[default]
    Metadata,
}

/// Security scheme kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeKind {
    Basic,
    ApiKey,
    Jwt,
    #[serde(rename = "oauth2")]
    OAuth2,
}

/// A security scheme declared by a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeDef {
    pub name: String,

    pub kind: SchemeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Use of a declared scheme by a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeUse {
    /// Name of a scheme declared on the service.
    pub name: String,

    #[serde(default)]
    pub carrier: Carrier,

    /// Payload attribute holding the credential, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// A set of schemes that must all be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Requirement {
    pub schemes: Vec<SchemeUse>,
}

/// A named error a method may return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDef {
    pub name: String,

    /// Abstract status code (canonical RPC status numbering).
    pub status: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Error type.
    #[serde(default = "default_error_attribute")]
    pub attribute: Attribute,
}

fn default_error_attribute() -> Attribute {
    Attribute::primitive(Primitive::String)
}

impl ErrorDef {
    pub fn new(name: impl Into<String>, status: u32) -> Self {
        Self {
            name: name.into(),
            status,
            description: None,
            attribute: default_error_attribute(),
        }
    }
}

/// Success response of a method.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseDef {
    /// Abstract status code, `0` (OK) by default.
    #[serde(default)]
    pub status: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Result attributes sent as leading metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<MetadataBinding>,

    /// Result attributes sent as trailing metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trailers: Vec<MetadataBinding>,
}

/// A service method.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub payload: Attribute,

    #[serde(default)]
    pub result: Attribute,

    /// Type of each streamed payload item.
    #[serde(default)]
    pub streaming_payload: Attribute,

    #[serde(default)]
    pub stream: StreamKind,

    /// View used to render the result, if fixed by the design.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,

    /// Payload attributes carried as request metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataBinding>,

    #[serde(default)]
    pub response: ResponseDef,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Requirement>,
}

impl MethodDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A service: a named group of methods.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceDef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemes: Vec<SchemeDef>,

    /// Errors returned by every method, after the method's own errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDef>,

    pub methods: Vec<MethodDef>,
}

impl ServiceDef {
    /// Find a declared security scheme by name.
    pub fn scheme(&self, name: &str) -> Option<&SchemeDef> {
        self.schemes.iter().find(|s| s.name == name)
    }

    /// Errors of the given method, method-level first. A method error
    /// shadows the service error of the same name.
    pub fn errors_of<'s>(&'s self, method: &'s MethodDef) -> impl Iterator<Item = &'s ErrorDef> {
        let inherited = self
            .errors
            .iter()
            .filter(move |e| !method.errors.iter().any(|own| own.name == e.name));
        method.errors.iter().chain(inherited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_semantics() {
        assert!(!StreamKind::None.is_streaming());
        assert!(StreamKind::Client.is_payload_streaming());
        assert!(!StreamKind::Client.is_result_streaming());
        assert!(StreamKind::Server.server_must_close());
        assert!(!StreamKind::Server.client_must_close());
        assert!(StreamKind::Bidirectional.server_must_close());
        assert!(StreamKind::Bidirectional.client_must_close());
    }

    #[test]
    fn metadata_key_defaults_to_attribute() {
        assert_eq!(MetadataBinding::new("token").key_name(), "token");
        assert_eq!(
            MetadataBinding::new("token").with_key("authorization").key_name(),
            "authorization"
        );
    }

    #[test]
    fn service_errors_follow_method_errors() {
        let mut method = MethodDef::new("divide");
        method.errors.push(ErrorDef::new("div_by_zero", 3));
        let svc = ServiceDef {
            name: "calc".into(),
            errors: vec![ErrorDef::new("internal", 13)],
            methods: vec![method.clone()],
            ..Default::default()
        };
        let names: Vec<&str> = svc.errors_of(&method).map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["div_by_zero", "internal"]);
    }

    #[test]
    fn method_errors_shadow_service_errors() {
        let mut method = MethodDef::new("fetch");
        method.errors = vec![ErrorDef::new("timeout", 4), ErrorDef::new("gone", 5)];
        let svc = ServiceDef {
            name: "remote".into(),
            errors: vec![
                ErrorDef::new("unauthorized", 16),
                ErrorDef::new("timeout", 14),
                ErrorDef::new("internal", 13),
            ],
            methods: vec![method.clone()],
            ..Default::default()
        };
        let errors: Vec<(&str, u32)> = svc
            .errors_of(&method)
            .map(|e| (e.name.as_str(), e.status))
            .collect();
        assert_eq!(
            errors,
            vec![("timeout", 4), ("gone", 5), ("unauthorized", 16), ("internal", 13)]
        );
    }

    #[test]
    fn method_defaults_from_json() {
        let m: MethodDef = serde_json::from_str(r#"{"name":"ping"}"#).unwrap();
        assert_eq!(m.stream, StreamKind::None);
        assert_eq!(m.payload, Attribute::empty());
        assert_eq!(m.response.status, 0);
    }
}
