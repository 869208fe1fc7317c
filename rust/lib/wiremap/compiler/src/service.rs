//! Service compiler: the entry point producing a [`ServiceModel`].
//!
//! Each service is compiled once per [`Compiler`]: wire shaping first, then
//! per endpoint, in a fixed order,
//!
//! 1. request and response messages (and their validators),
//! 2. request metadata, response headers and trailers,
//! 3. request and response conversions,
//! 4. CLI arguments, security schemes and errors,
//! 5. stream models for streaming endpoints.
//!
//! Conversions look validators up by message, so messages must be collected
//! before any conversion of the endpoint is built.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use wiremap_ir::{Attribute, Carrier, DataType, Design, MethodDef, ServiceDef};

use crate::analyzer::{AttributeAnalyzer, ServiceAnalyzer, WireAnalyzer};
use crate::config::CompilerConfig;
use crate::convert::{build_request_convert, build_response_convert, ConvertContext, InitArg};
use crate::error::CompileError;
use crate::error_map::build_errors;
use crate::message::{collect_messages, MessageDescriptor};
use crate::metadata::{extract_metadata, MetadataField};
use crate::model::{
    EndpointModel, RequestModel, ResponseModel, ResultShape, SchemeModel, ServiceModel, ViewModel,
    ViewedResult,
};
use crate::naming::{pascal, snake, NameScope};
use crate::registry::TypeRegistry;
use crate::status::StatusTable;
use crate::stream::{build_stream, StreamNaming, StreamRole, StreamSides};
use crate::wire::{shape_service, EndpointTypes, ServiceTypes};

/// Compiles the services of a design, caching each model.
pub struct Compiler<'d> {
    design: &'d Design,
    config: CompilerConfig,
    status: StatusTable,
    services: BTreeMap<String, ServiceModel>,
}

impl<'d> Compiler<'d> {
    pub fn new(design: &'d Design) -> Self {
        Self::with_config(design, CompilerConfig::default())
    }

    pub fn with_config(design: &'d Design, config: CompilerConfig) -> Self {
        Self {
            design,
            config,
            status: StatusTable::grpc(),
            services: BTreeMap::new(),
        }
    }

    /// Replaces the table mapping abstract status codes to protocol statuses.
    pub fn with_status_table(mut self, status: StatusTable) -> Self {
        self.status = status;
        self
    }

    /// Model of the service `name`, compiled on first request.
    ///
    /// Returns `Ok(None)` if the design declares no such service. Failed
    /// compilations are not cached.
    pub fn get(&mut self, name: &str) -> Result<Option<&ServiceModel>, CompileError> {
        let Some(svc) = self.design.service(name) else {
            return Ok(None);
        };
        if !self.services.contains_key(name) {
            let model = compile_service(self.design, svc, &self.config, &self.status)?;
            self.services.insert(name.to_string(), model);
        }
        Ok(self.services.get(name))
    }

    /// Number of cached service models.
    pub fn compiled(&self) -> usize {
        self.services.len()
    }
}

fn compile_service(
    design: &Design,
    svc: &ServiceDef,
    config: &CompilerConfig,
    status: &StatusTable,
) -> Result<ServiceModel, CompileError> {
    debug!(service = %svc.name, methods = svc.methods.len(), "compiling service");
    let types = shape_service(design, svc)?;
    let svc_pkg = snake(&svc.name);
    let svc_var = pascal(&svc.name);
    let pb = &config.wire_package;

    let mut model = ServiceModel {
        name: svc.name.clone(),
        description: svc.description.clone(),
        pkg_name: pb.clone(),
        service_pkg_name: svc_pkg.clone(),
        server_struct: config.server_struct.clone(),
        client_struct: config.client_struct.clone(),
        server_init: config.server_init.clone(),
        client_init: config.client_init.clone(),
        server_interface: format!("{}Server", svc_var),
        client_interface: format!("{}Client", svc_var),
        client_interface_init: format!("{}::{}_client::{}Client::new", pb, svc_pkg, svc_var),
        endpoints: Vec::with_capacity(svc.methods.len()),
        messages: Vec::new(),
        validations: Vec::new(),
        transform_helpers: Vec::new(),
        scope: NameScope::new(),
    };

    let compilation = Compilation {
        svc,
        types: &types,
        config,
        status,
        package: svc_pkg,
    };
    let mut seen = BTreeSet::new();
    for (method, ty) in svc.methods.iter().zip(&types.endpoints) {
        let endpoint = compilation.endpoint(&mut model, &mut seen, method, ty)?;
        model.endpoints.push(endpoint);
    }

    info!(
        service = %model.name,
        endpoints = model.endpoints.len(),
        messages = model.messages.len(),
        helpers = model.transform_helpers.len(),
        "compiled service"
    );
    Ok(model)
}

/// State shared by the endpoints of one service.
struct Compilation<'t> {
    svc: &'t ServiceDef,
    types: &'t ServiceTypes,
    config: &'t CompilerConfig,
    status: &'t StatusTable,
    /// Module of the service types.
    package: String,
}

impl<'t> Compilation<'t> {
    fn endpoint(
        &self,
        sd: &mut ServiceModel,
        seen: &mut BTreeSet<String>,
        method: &MethodDef,
        ty: &'t EndpointTypes,
    ) -> Result<EndpointModel, CompileError> {
        let svc = self.svc;
        let context = format!("{}.{}", svc.name, method.name);
        let types = self.types;
        let registry = &types.service;
        let wire = &types.wire;
        let pkg = self.package.as_str();
        let pb = self.config.wire_package.as_str();
        debug!(endpoint = %context, stream = ?method.stream, "compiling endpoint");

        let payload = ServiceAnalyzer::new(&ty.payload, registry, pkg);
        let streaming_payload = ServiceAnalyzer::new(&ty.streaming_payload, registry, pkg);
        let request = WireAnalyzer::new(&ty.request, wire, pb);
        let streaming_request = WireAnalyzer::new(&ty.streaming_request, wire, pb);
        let response = WireAnalyzer::new(&ty.response, wire, pb);

        let viewed = viewed_result(&ty.result, registry, pkg, method);
        let result = if viewed.is_some() {
            ServiceAnalyzer::projected(&ty.result, registry, pkg)
        } else {
            ServiceAnalyzer::new(&ty.result, registry, pkg)
        };
        let payload_ref = present(&ty.payload).then(|| payload.type_ref(true));
        let result_ref = present(&ty.result)
            .then(|| ServiceAnalyzer::new(&ty.result, registry, pkg).type_ref(true));

        let request_message = if present(&ty.streaming_request) {
            collect_first(sd, seen, &streaming_request)
        } else {
            collect_first(sd, seen, &request)
        };
        let response_message = if !result.is_empty() || !method.stream.is_streaming() {
            collect_first(sd, seen, &response)
        } else {
            None
        };

        let request_metadata =
            extract_metadata(&method.metadata, &payload, &mut sd.scope, &context, "payload")?;
        let headers =
            extract_metadata(&method.response.headers, &result, &mut sd.scope, &context, "result")?;
        let trailers =
            extract_metadata(&method.response.trailers, &result, &mut sd.scope, &context, "result")?;

        let mut ctx = ConvertContext {
            service: &svc.name,
            endpoint: &method.name,
            messages: &sd.messages,
            validations: &sd.validations,
            helpers: &mut sd.transform_helpers,
        };

        let request_model = RequestModel {
            description: wire.resolve_attribute(&ty.request).description.clone(),
            message: request_message,
            server_convert: build_request_convert(
                &mut ctx,
                method,
                &request,
                &payload,
                &request_metadata,
                true,
            )?,
            client_convert: build_request_convert(
                &mut ctx,
                method,
                &request,
                &payload,
                &request_metadata,
                false,
            )?,
            cli_args: cli_args(&request, &request_metadata),
            metadata: request_metadata,
        };

        let status_code = self.status.lookup(method.response.status).ok_or_else(|| {
            CompileError::UnmappedStatus {
                context: context.clone(),
                code: method.response.status,
            }
        })?;
        let response_model = ResponseModel {
            status_code,
            description: method.response.description.clone(),
            message: response_message,
            server_convert: build_response_convert(
                &mut ctx, method, &response, &result, &headers, &trailers, true,
            )?,
            client_convert: build_response_convert(
                &mut ctx, method, &response, &result, &headers, &trailers, false,
            )?,
            headers,
            trailers,
        };

        let (metadata_schemes, message_schemes) = schemes(svc, method, &context)?;
        let errors = build_errors(svc, method, registry, pkg, self.status)?;

        let (server_stream, client_stream) = if method.stream.is_streaming() {
            let naming = StreamNaming {
                wire_package: pb,
                service_package: pkg,
                service_name: &svc.name,
            };
            let sides = StreamSides {
                result: &result,
                streaming_payload: &streaming_payload,
                streaming_request: &streaming_request,
                response: &response,
                result_ref: result_ref.as_deref(),
                view: viewed.as_ref().map(ViewedResult::selection),
            };
            (
                Some(build_stream(&mut ctx, method, &naming, &sides, StreamRole::Server)?),
                Some(build_stream(&mut ctx, method, &naming, &sides, StreamRole::Client)?),
            )
        } else {
            (None, None)
        };

        Ok(EndpointModel {
            service_name: svc.name.clone(),
            pkg_name: pb.to_string(),
            service_pkg_name: pkg.to_string(),
            method_name: method.name.clone(),
            method_var_name: pascal(&method.name),
            payload_ref,
            result_ref,
            result: viewed.map(ResultShape::Viewed).unwrap_or_default(),
            request: request_model,
            response: response_model,
            metadata_schemes,
            message_schemes,
            errors,
            server_struct: sd.server_struct.clone(),
            server_interface: sd.server_interface.clone(),
            client_struct: sd.client_struct.clone(),
            client_interface: sd.client_interface.clone(),
            server_stream,
            client_stream,
        })
    }
}

fn present(att: &Attribute) -> bool {
    !matches!(att.ty, DataType::Empty)
}

/// Collects the messages reachable from `an` into the service and returns
/// the descriptor of `an` itself.
fn collect_first(
    sd: &mut ServiceModel,
    seen: &mut BTreeSet<String>,
    an: &WireAnalyzer<'_>,
) -> Option<MessageDescriptor> {
    let collected = collect_messages(an, &mut sd.scope, &mut sd.validations, seen);
    let first = collected.first().cloned();
    sd.messages.extend(collected);
    first
}

/// Viewed result description, if the result type (or the element type of a
/// result collection) declares views.
fn viewed_result(
    result: &Attribute,
    registry: &TypeRegistry,
    package: &str,
    method: &MethodDef,
) -> Option<ViewedResult> {
    let (ut, is_collection) = match &registry.resolve_attribute(result).ty {
        DataType::Array(elem) => (registry.get(elem.ty.user_name()?)?, true),
        _ => (registry.get(result.ty.user_name()?)?, false),
    };
    if !ut.has_views() {
        return None;
    }
    let base = pascal(&ut.name);
    let type_name = if is_collection {
        format!("{}Collection", base)
    } else {
        base
    };
    Some(ViewedResult {
        full_ref: format!("{}::views::{}", package, type_name),
        projected_ref: ServiceAnalyzer::projected(result, registry, package).type_ref(true),
        view: method.view.clone(),
        views: ut
            .views
            .iter()
            .map(|v| ViewModel {
                name: v.name.clone(),
                fields: v.fields.clone(),
            })
            .collect(),
        init_name: format!("new_viewed_{}", snake(&type_name)),
        result_init_name: format!("new_{}", snake(&type_name)),
        is_collection,
        type_name,
    })
}

/// Arguments of a command-line client: the request message when it has
/// fields, then one argument per request metadata field.
fn cli_args(request: &WireAnalyzer<'_>, metadata: &[MetadataField]) -> Vec<InitArg> {
    let mut args = Vec::with_capacity(metadata.len() + 1);
    let message = request.resolved();
    if matches!(&message.ty, DataType::Object(fields) if !fields.is_empty()) {
        args.push(InitArg {
            name: "message".to_string(),
            description: message.description.clone(),
            var_ref: "message".to_string(),
            field_name: String::new(),
            type_name: request.name(true),
            type_ref: request.type_ref(true),
            pointer: false,
            required: true,
            default_value: None,
            validate: Vec::new(),
            example: message.example.clone(),
        });
    }
    args.extend(metadata.iter().map(InitArg::from));
    args
}

/// Security schemes of `method`, split into metadata-carried and
/// message-carried lists. Each scheme appears once per list.
fn schemes(
    svc: &ServiceDef,
    method: &MethodDef,
    context: &str,
) -> Result<(Vec<SchemeModel>, Vec<SchemeModel>), CompileError> {
    let mut metadata: Vec<SchemeModel> = Vec::new();
    let mut message: Vec<SchemeModel> = Vec::new();
    for requirement in &method.requirements {
        for used in &requirement.schemes {
            let def = svc
                .scheme(&used.name)
                .ok_or_else(|| CompileError::UnknownScheme {
                    endpoint: context.to_string(),
                    scheme: used.name.clone(),
                })?;
            let list = match used.carrier {
                Carrier::Metadata => &mut metadata,
                Carrier::Message => &mut message,
            };
            if list.iter().any(|s| s.name == def.name) {
                debug!(endpoint = %context, scheme = %def.name, "scheme already required");
                continue;
            }
            list.push(SchemeModel {
                name: def.name.clone(),
                kind: def.kind.clone(),
                carrier: used.carrier,
                field_name: used.field.clone(),
                description: def.description.clone(),
            });
        }
    }
    Ok((metadata, message))
}
