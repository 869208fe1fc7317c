//! Design: top-level document: all user types and services.

use serde::{Deserialize, Serialize};

use crate::service::ServiceDef;
use crate::types::UserType;

/// A complete design, as loaded from `design.json`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Design {
    /// API name.
    pub name: String,

    /// User types shared by all services.
    #[serde(default)]
    pub types: Vec<UserType>,

    pub services: Vec<ServiceDef>,
}

impl Design {
    /// Parse a design from JSON.
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Find a service by name.
    pub fn service(&self, name: &str) -> Option<&ServiceDef> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Names of all services, in declaration order.
    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }
}
