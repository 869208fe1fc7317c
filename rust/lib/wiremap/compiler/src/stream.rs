//! Stream adapter builder.
//!
//! A streaming endpoint gets one stream model per side. The server sends
//! results and receives streamed payloads; the client does the opposite. Each
//! adapter converts between the service value and the wire message.

use serde::{Deserialize, Serialize};

use wiremap_ir::{MethodDef, StreamKind};

use crate::analyzer::AttributeAnalyzer;
use crate::convert::{build_convert, ConversionSpec, ConvertContext, Direction, Extension};
use crate::error::CompileError;
use crate::naming::pascal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamRole {
    Server,
    Client,
}

/// View used to render streamed results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ViewSelection {
    /// Fixed by the design.
    Fixed { view: String },
    /// Chosen by the service at run time.
    Dynamic,
}

/// Send or receive side of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamAdapter {
    /// Function name, e.g. `send` or `close_and_recv`.
    pub name: String,
    pub description: String,
    /// Service type sent or received.
    pub type_ref: String,
    pub convert: ConversionSpec,
    /// Set for viewed results: the result is projected through the view
    /// before being sent, or wrapped with it after being received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<ViewSelection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamModel {
    pub var_name: String,
    pub role: StreamRole,
    /// Wire stream type.
    pub interface: String,
    /// Service stream trait.
    pub service_interface: String,
    /// Method name of the owning endpoint.
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send: Option<StreamAdapter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recv: Option<StreamAdapter>,
    pub must_close: bool,
}

/// Values flowing through the streams of one endpoint.
pub struct StreamSides<'r, S, W> {
    /// Result, projected when viewed.
    pub result: &'r S,
    pub streaming_payload: &'r S,
    pub streaming_request: &'r W,
    pub response: &'r W,
    pub result_ref: Option<&'r str>,
    pub view: Option<ViewSelection>,
}

/// Package names used in stream identifiers.
pub struct StreamNaming<'r> {
    pub wire_package: &'r str,
    pub service_package: &'r str,
    pub service_name: &'r str,
}

pub fn build_stream<'a, S, W>(
    ctx: &mut ConvertContext<'_>,
    method: &MethodDef,
    naming: &StreamNaming<'_>,
    sides: &StreamSides<'_, S, W>,
    role: StreamRole,
) -> Result<StreamModel, CompileError>
where
    S: AttributeAnalyzer<'a>,
    W: AttributeAnalyzer<'a>,
{
    let method_name = pascal(&method.name);
    let side = match role {
        StreamRole::Server => "Server",
        StreamRole::Client => "Client",
    };
    let result_var = if sides.view.is_some() {
        "vresult"
    } else {
        "result"
    };
    let has_result = !sides.result.is_empty();
    let has_payload = !sides.streaming_payload.is_empty();
    let result_ref = sides
        .result_ref
        .map(str::to_string)
        .unwrap_or_else(|| sides.result.type_ref(true));

    let (send, recv) = match role {
        StreamRole::Server => {
            let send = if has_result {
                let name = if method.stream == StreamKind::Client {
                    "send_and_close"
                } else {
                    "send"
                };
                let convert = build_convert(
                    ctx,
                    Direction::StreamSend,
                    sides.result,
                    sides.response,
                    result_var,
                    "v",
                    Extension::None,
                )?;
                Some(send_adapter(name, &method.name, result_ref.clone(), convert, sides.view.clone()))
            } else {
                None
            };
            let recv = if has_payload {
                let convert = build_convert(
                    ctx,
                    Direction::StreamRecv,
                    sides.streaming_request,
                    sides.streaming_payload,
                    "v",
                    "spayload",
                    Extension::None,
                )?;
                Some(recv_adapter(
                    "recv",
                    &method.name,
                    sides.streaming_payload.type_ref(true),
                    convert,
                    None,
                ))
            } else {
                None
            };
            (send, recv)
        }
        StreamRole::Client => {
            let send = if has_payload {
                let convert = build_convert(
                    ctx,
                    Direction::StreamSend,
                    sides.streaming_payload,
                    sides.streaming_request,
                    "spayload",
                    "v",
                    Extension::None,
                )?;
                Some(send_adapter(
                    "send",
                    &method.name,
                    sides.streaming_payload.type_ref(true),
                    convert,
                    None,
                ))
            } else {
                None
            };
            let recv = if has_result {
                let name = if method.stream == StreamKind::Client {
                    "close_and_recv"
                } else {
                    "recv"
                };
                let convert = build_convert(
                    ctx,
                    Direction::StreamRecv,
                    sides.response,
                    sides.result,
                    "v",
                    result_var,
                    Extension::None,
                )?;
                Some(recv_adapter(name, &method.name, result_ref, convert, sides.view.clone()))
            } else {
                None
            };
            (send, recv)
        }
    };

    Ok(StreamModel {
        var_name: format!("{}{}Stream", method_name, side),
        role,
        interface: format!(
            "{}::{}{}{}",
            naming.wire_package,
            pascal(naming.service_name),
            method_name,
            side
        ),
        service_interface: format!("{}::{}{}Stream", naming.service_package, method_name, side),
        endpoint: method.name.clone(),
        send,
        recv,
        must_close: match role {
            StreamRole::Server => method.stream.server_must_close(),
            StreamRole::Client => method.stream.client_must_close(),
        },
    })
}

fn send_adapter(
    name: &str,
    endpoint: &str,
    type_ref: String,
    convert: ConversionSpec,
    view: Option<ViewSelection>,
) -> StreamAdapter {
    StreamAdapter {
        name: name.to_string(),
        description: format!(
            "{} streams instances of \"{}\" to the \"{}\" endpoint stream.",
            name, convert.tgt_name, endpoint
        ),
        type_ref,
        convert,
        view,
    }
}

fn recv_adapter(
    name: &str,
    endpoint: &str,
    type_ref: String,
    convert: ConversionSpec,
    view: Option<ViewSelection>,
) -> StreamAdapter {
    StreamAdapter {
        name: name.to_string(),
        description: format!(
            "{} reads instances of \"{}\" from the \"{}\" endpoint stream.",
            name, convert.src_name, endpoint
        ),
        type_ref,
        convert,
        view,
    }
}
