//! wiremap design model
//!
//! Serializable description of remote-procedure services, consumed by the
//! transport-mapping compiler:
//! - types: attribute trees, user types and result views
//! - service: services, methods, errors, security and metadata bindings
//! - design: the top-level document tying types and services together
//!
//! User types are referenced by name (`DataType::User`) and resolved through
//! the design's type list, so self-referential and mutually-referential types
//! need no special encoding.

pub mod types;
pub mod service;
pub mod design;

pub use types::*;
pub use service::*;
pub use design::*;
