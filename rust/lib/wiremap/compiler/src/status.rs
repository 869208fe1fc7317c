//! Abstract status codes to protocol status constants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A protocol-level status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStatus {
    /// Status constant, e.g. `NotFound`.
    pub name: String,
    pub code: u32,
}

impl Default for ProtocolStatus {
    fn default() -> Self {
        Self {
            name: "Ok".to_string(),
            code: 0,
        }
    }
}

/// Closed mapping from abstract status codes to protocol statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTable {
    statuses: BTreeMap<u32, String>,
}

const GRPC_CODES: [&str; 17] = [
    "Ok",
    "Cancelled",
    "Unknown",
    "InvalidArgument",
    "DeadlineExceeded",
    "NotFound",
    "AlreadyExists",
    "PermissionDenied",
    "ResourceExhausted",
    "FailedPrecondition",
    "Aborted",
    "OutOfRange",
    "Unimplemented",
    "Internal",
    "Unavailable",
    "DataLoss",
    "Unauthenticated",
];

impl StatusTable {
    /// The canonical RPC status codes, 0 (`Ok`) through 16 (`Unauthenticated`).
    pub fn grpc() -> Self {
        Self::from_entries(
            GRPC_CODES
                .iter()
                .enumerate()
                .map(|(code, name)| (code as u32, name.to_string())),
        )
    }

    pub fn from_entries<I: IntoIterator<Item = (u32, String)>>(entries: I) -> Self {
        Self {
            statuses: entries.into_iter().collect(),
        }
    }

    pub fn lookup(&self, code: u32) -> Option<ProtocolStatus> {
        self.statuses.get(&code).map(|name| ProtocolStatus {
            name: name.clone(),
            code,
        })
    }
}

impl Default for StatusTable {
    fn default() -> Self {
        Self::grpc()
    }
}
