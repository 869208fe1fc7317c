//! Conversion synthesizer: constructor specifications mapping one
//! representation of a value to another.
//!
//! Four conversions exist per unary endpoint:
//!
//! | direction       | source                 | target  |
//! |-----------------|------------------------|---------|
//! | server request  | request + metadata     | payload |
//! | client request  | payload                | request |
//! | server response | result                 | response|
//! | client response | response + headers + trailers | result |

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wiremap_ir::{DataType, MethodDef};

use crate::analyzer::AttributeAnalyzer;
use crate::error::CompileError;
use crate::message::MessageDescriptor;
use crate::metadata::MetadataField;
use crate::naming::snake;
use crate::transform::{Transform, TransformHelper, Transformer};
use crate::validation::{ValidationRule, ValidationSpec};

/// How to go from one type's representation to another's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionSpec {
    pub src_name: String,
    pub src_ref: String,
    pub tgt_name: String,
    pub tgt_ref: String,
    /// Absent when the target carries no data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<ConstructorSpec>,
    /// Validator of the source message, for conversions out of the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorSpec {
    pub name: String,
    pub description: String,
    pub args: Vec<InitArg>,
    pub return_var_name: String,
    pub return_type_ref: String,
    pub return_is_struct: bool,
    pub body: Transform,
}

/// A constructor argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitArg {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Variable holding the argument value.
    pub var_ref: String,
    /// Field of the constructed value set from the argument. Empty for the
    /// source value itself.
    pub field_name: String,
    pub type_name: String,
    pub type_ref: String,
    pub pointer: bool,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validate: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

impl From<&MetadataField> for InitArg {
    fn from(m: &MetadataField) -> Self {
        Self {
            name: m.var_name.clone(),
            description: m.description.clone(),
            var_ref: m.var_name.clone(),
            field_name: m.field_name.clone(),
            type_name: m.type_name.clone(),
            type_ref: m.type_ref.clone(),
            pointer: m.pointer,
            required: m.required,
            default_value: m.default_value.clone(),
            validate: m.validate.clone(),
            example: m.example.clone(),
        }
    }
}

/// Extra constructor arguments, decided by the caller.
#[derive(Debug, Clone, Copy)]
pub enum Extension<'m> {
    None,
    /// Append request metadata, optionally dropping the body argument.
    Metadata {
        fields: &'m [MetadataField],
        strip_body: bool,
    },
    /// Append response headers, then trailers.
    HeadersAndTrailers {
        headers: &'m [MetadataField],
        trailers: &'m [MetadataField],
    },
}

impl Extension<'_> {
    fn apply(self, args: &mut Vec<InitArg>) {
        match self {
            Extension::None => {}
            Extension::Metadata { fields, strip_body } => {
                if strip_body {
                    args.clear();
                }
                args.extend(fields.iter().map(InitArg::from));
            }
            Extension::HeadersAndTrailers { headers, trailers } => {
                args.extend(headers.iter().chain(trailers.iter()).map(InitArg::from));
            }
        }
    }
}

/// Which conversion of an endpoint is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ServerRequest,
    ClientRequest,
    ServerResponse,
    ClientResponse,
    StreamSend,
    StreamRecv,
}

impl Direction {
    fn describe(self, ctor: &str, endpoint: &str, service: &str) -> String {
        match self {
            Direction::ServerRequest => format!(
                "{} builds the payload of the \"{}\" endpoint of the \"{}\" service from the wire request message.",
                ctor, endpoint, service
            ),
            Direction::ClientRequest => format!(
                "{} builds the wire request message from the payload of the \"{}\" endpoint of the \"{}\" service.",
                ctor, endpoint, service
            ),
            Direction::ServerResponse => format!(
                "{} builds the wire response message from the result of the \"{}\" endpoint of the \"{}\" service.",
                ctor, endpoint, service
            ),
            Direction::ClientResponse => format!(
                "{} builds the result of the \"{}\" endpoint of the \"{}\" service from the wire response message.",
                ctor, endpoint, service
            ),
            Direction::StreamSend => format!(
                "{} builds the message sent on the \"{}\" endpoint stream of the \"{}\" service.",
                ctor, endpoint, service
            ),
            Direction::StreamRecv => format!(
                "{} builds the value received on the \"{}\" endpoint stream of the \"{}\" service.",
                ctor, endpoint, service
            ),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::ServerRequest => "server request",
            Direction::ClientRequest => "client request",
            Direction::ServerResponse => "server response",
            Direction::ClientResponse => "client response",
            Direction::StreamSend => "stream send",
            Direction::StreamRecv => "stream receive",
        };
        f.write_str(s)
    }
}

/// Service state read and extended while building conversions.
pub struct ConvertContext<'s> {
    pub service: &'s str,
    pub endpoint: &'s str,
    pub messages: &'s [MessageDescriptor],
    pub validations: &'s [ValidationSpec],
    pub helpers: &'s mut Vec<TransformHelper>,
}

impl ConvertContext<'_> {
    fn validation_for_message(&self, type_name: &str) -> Option<ValidationSpec> {
        let message = self.messages.iter().find(|m| m.name == type_name)?;
        self.validations
            .iter()
            .find(|v| v.src_name == message.var_name)
            .cloned()
    }
}

/// Builds the conversion of the value analyzed by `source` into the one
/// analyzed by `target`.
pub fn build_convert<'a, S, T>(
    ctx: &mut ConvertContext<'_>,
    direction: Direction,
    source: &S,
    target: &T,
    source_var: &str,
    target_var: &str,
    extension: Extension<'_>,
) -> Result<ConversionSpec, CompileError>
where
    S: AttributeAnalyzer<'a>,
    T: AttributeAnalyzer<'a>,
{
    let src_att = source.attribute();
    let tgt_att = target.attribute();

    let validation = if target.is_wire() {
        None
    } else {
        src_att
            .ty
            .user_name()
            .and_then(|name| ctx.validation_for_message(name))
    };

    let init = if target.is_empty() {
        None
    } else {
        let basis = if target.registry().is_primitive(&tgt_att.ty) {
            source.name(false)
        } else {
            target.name(false)
        };
        let name = format!("new_{}", snake(&basis));
        let body = Transformer::new(&mut *ctx.helpers)
            .transform(source, target, source_var)
            .map_err(|m| CompileError::Mismatch {
                endpoint: format!("{}.{}", ctx.service, ctx.endpoint),
                direction: direction.to_string(),
                path: m.path,
                source_type: m.source_type,
                target_type: m.target_type,
            })?;

        let mut args = vec![InitArg {
            name: source_var.to_string(),
            description: src_att.description.clone(),
            var_ref: source_var.to_string(),
            field_name: String::new(),
            type_name: source.name(true),
            type_ref: source.type_ref(true),
            pointer: false,
            required: true,
            default_value: None,
            validate: Vec::new(),
            example: source.example(),
        }];
        extension.apply(&mut args);

        Some(ConstructorSpec {
            description: direction.describe(&name, ctx.endpoint, ctx.service),
            name,
            args,
            return_var_name: target_var.to_string(),
            return_type_ref: target.type_ref(true),
            return_is_struct: matches!(target.resolved().ty, DataType::Object(_)),
            body,
        })
    };

    Ok(ConversionSpec {
        src_name: source.name(true),
        src_ref: source.type_ref(true),
        tgt_name: target.name(true),
        tgt_ref: target.type_ref(true),
        init,
        validation,
    })
}

/// Request conversion of a unary or payload-metadata endpoint.
///
/// The server side decodes the request message and `metadata` into the
/// payload; absent for empty payloads. The client side encodes the payload
/// into the request message; absent for empty or streamed payloads, whose
/// fields travel as metadata.
pub fn build_request_convert<'a, W, P>(
    ctx: &mut ConvertContext<'_>,
    method: &MethodDef,
    request: &W,
    payload: &P,
    metadata: &[MetadataField],
    server: bool,
) -> Result<Option<ConversionSpec>, CompileError>
where
    W: AttributeAnalyzer<'a>,
    P: AttributeAnalyzer<'a>,
{
    let streams_payload = !payload.registry().is_empty_type(&method.streaming_payload.ty);
    if payload.is_empty() {
        return Ok(None);
    }
    if server {
        let extension = Extension::Metadata {
            fields: metadata,
            strip_body: streams_payload,
        };
        return build_convert(
            ctx,
            Direction::ServerRequest,
            request,
            payload,
            "message",
            "payload",
            extension,
        )
        .map(Some);
    }
    if method.stream.is_payload_streaming() || streams_payload {
        return Ok(None);
    }
    build_convert(
        ctx,
        Direction::ClientRequest,
        payload,
        request,
        "payload",
        "message",
        Extension::None,
    )
    .map(Some)
}

/// Response conversion of a unary endpoint.
///
/// The server side encodes the result into the response message. The client
/// side decodes the response message, headers and trailers into the result.
/// Absent for streaming endpoints and empty results.
pub fn build_response_convert<'a, W, R>(
    ctx: &mut ConvertContext<'_>,
    method: &MethodDef,
    response: &W,
    result: &R,
    headers: &[MetadataField],
    trailers: &[MetadataField],
    server: bool,
) -> Result<Option<ConversionSpec>, CompileError>
where
    W: AttributeAnalyzer<'a>,
    R: AttributeAnalyzer<'a>,
{
    if method.stream.is_streaming() || result.is_empty() {
        return Ok(None);
    }
    if server {
        return build_convert(
            ctx,
            Direction::ServerResponse,
            result,
            response,
            "result",
            "message",
            Extension::None,
        )
        .map(Some);
    }
    build_convert(
        ctx,
        Direction::ClientResponse,
        response,
        result,
        "message",
        "result",
        Extension::HeadersAndTrailers { headers, trailers },
    )
    .map(Some)
}
