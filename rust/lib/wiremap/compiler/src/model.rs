//! Service model: the compiled transport mapping of one service, consumed by
//! an external renderer.

use serde::{Deserialize, Serialize};

use wiremap_ir::{Carrier, SchemeKind};

use crate::convert::{ConversionSpec, InitArg};
use crate::error_map::ErrorModel;
use crate::message::MessageDescriptor;
use crate::metadata::MetadataField;
use crate::naming::NameScope;
use crate::status::ProtocolStatus;
use crate::stream::{StreamModel, ViewSelection};
use crate::transform::TransformHelper;
use crate::validation::ValidationSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Module of the wire message types.
    pub pkg_name: String,
    /// Module of the service types.
    pub service_pkg_name: String,
    pub server_struct: String,
    pub client_struct: String,
    pub server_init: String,
    pub client_init: String,
    pub server_interface: String,
    pub client_interface: String,
    /// Constructor of the wire client.
    pub client_interface_init: String,
    pub endpoints: Vec<EndpointModel>,
    /// Every message reachable from an endpoint, each once.
    pub messages: Vec<MessageDescriptor>,
    pub validations: Vec<ValidationSpec>,
    pub transform_helpers: Vec<TransformHelper>,
    pub scope: NameScope,
}

impl ServiceModel {
    pub fn endpoint(&self, name: &str) -> Option<&EndpointModel> {
        self.endpoints.iter().find(|e| e.method_name == name)
    }

    /// Returns true if at least one endpoint is unary.
    pub fn has_unary_endpoint(&self) -> bool {
        self.endpoints.iter().any(|e| e.server_stream.is_none())
    }

    pub fn has_streaming_endpoint(&self) -> bool {
        self.endpoints.iter().any(|e| e.server_stream.is_some())
    }

    /// Validator of the message with the given variable name.
    pub fn validation_for(&self, name: &str) -> Option<&ValidationSpec> {
        self.validations.iter().find(|v| v.src_name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointModel {
    pub service_name: String,
    pub pkg_name: String,
    pub service_pkg_name: String,
    /// Method name as declared.
    pub method_name: String,
    pub method_var_name: String,
    /// Absent for methods without payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_ref: Option<String>,
    /// Absent for methods without result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
    pub result: ResultShape,
    pub request: RequestModel,
    pub response: ResponseModel,
    pub metadata_schemes: Vec<SchemeModel>,
    pub message_schemes: Vec<SchemeModel>,
    pub errors: Vec<ErrorModel>,
    pub server_struct: String,
    pub server_interface: String,
    pub client_struct: String,
    pub client_interface: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_stream: Option<StreamModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_stream: Option<StreamModel>,
}

/// How the result of an endpoint is rendered.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ResultShape {
    #[default]
    Plain,
    /// The result is rendered through one of its views.
    Viewed(ViewedResult),
}

impl ResultShape {
    pub fn viewed(&self) -> Option<&ViewedResult> {
        match self {
            ResultShape::Plain => None,
            ResultShape::Viewed(v) => Some(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewedResult {
    pub type_name: String,
    /// Viewed result type: projected value plus active view.
    pub full_ref: String,
    /// Projected type.
    pub projected_ref: String,
    /// View fixed by the design; chosen at run time if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    pub views: Vec<ViewModel>,
    /// Builds the viewed result from the result.
    pub init_name: String,
    /// Builds the result from the viewed result.
    pub result_init_name: String,
    pub is_collection: bool,
}

impl ViewedResult {
    pub fn selection(&self) -> ViewSelection {
        match &self.view {
            Some(view) => ViewSelection::Fixed { view: view.clone() },
            None => ViewSelection::Dynamic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewModel {
    pub name: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequestModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Request message; the streaming request for payload-streaming methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageDescriptor>,
    pub metadata: Vec<MetadataField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_convert: Option<ConversionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_convert: Option<ConversionSpec>,
    /// Arguments of command-line clients.
    pub cli_args: Vec<InitArg>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseModel {
    pub status_code: ProtocolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<MetadataField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trailers: Vec<MetadataField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_convert: Option<ConversionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_convert: Option<ConversionSpec>,
}

/// Security scheme required by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeModel {
    pub name: String,
    pub kind: SchemeKind,
    pub carrier: Carrier,
    /// Payload field holding the credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
