//! wiremap compiler
//!
//! Turns a service design into the transport mapping between the service's
//! own types and its wire messages:
//! - wire: wire-side request/response types derived from payloads and results
//! - message: message descriptors reachable from each endpoint
//! - metadata: payload and result attributes carried out of band
//! - convert: constructors converting between service values and messages
//! - stream: send/receive adapters of streaming endpoints
//! - error_map: protocol statuses of declared errors
//! - service: the memoized compiler tying everything into a [`ServiceModel`]
//!
//! Output is a structured model only. Rendering it to source text is left to
//! an external renderer.

pub mod analyzer;
pub mod config;
pub mod convert;
pub mod error;
pub mod error_map;
pub mod message;
pub mod metadata;
pub mod model;
pub mod naming;
pub mod registry;
pub mod service;
pub mod status;
pub mod stream;
pub mod transform;
pub mod validation;
pub mod wire;

pub use analyzer::{AttributeAnalyzer, ServiceAnalyzer, WireAnalyzer};
pub use config::{CompilerConfig, ConfigError};
pub use error::CompileError;
pub use model::{EndpointModel, ResultShape, ServiceModel};
pub use service::Compiler;
pub use status::{ProtocolStatus, StatusTable};
