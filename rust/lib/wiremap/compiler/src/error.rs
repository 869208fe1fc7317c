use thiserror::Error;

/// Input-model defects found while compiling a service.
///
/// All of them mean the design itself is invalid: compilation of the service
/// stops at the first one and no partial model is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("{endpoint}: cannot convert {direction}: {path}: {source_type} is incompatible with {target_type}")]
    Mismatch {
        endpoint: String,
        direction: String,
        path: String,
        source_type: String,
        target_type: String,
    },

    #[error("{endpoint}: security scheme '{scheme}' is not declared by the service")]
    UnknownScheme { endpoint: String, scheme: String },

    #[error("{context}: status code {code} has no protocol mapping")]
    UnmappedStatus { context: String, code: u32 },

    #[error("{context}: type '{name}' is not defined")]
    UnknownType { context: String, name: String },

    #[error("{endpoint}: metadata binds '{attribute}' which is not an attribute of the {owner}")]
    UnknownMetadata {
        endpoint: String,
        owner: String,
        attribute: String,
    },

    #[error("{context}: {reason}")]
    UnsupportedWireType { context: String, reason: String },

    #[error("{endpoint}: payload streaming endpoint carries {attributes} outside metadata")]
    UnboundStreamingPayload { endpoint: String, attributes: String },
}
