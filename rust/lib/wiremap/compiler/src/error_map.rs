//! Error mapper: one error model per declared endpoint error.

use serde::{Deserialize, Serialize};

use wiremap_ir::{MethodDef, ServiceDef};

use crate::analyzer::{AttributeAnalyzer, ServiceAnalyzer};
use crate::error::CompileError;
use crate::model::ResponseModel;
use crate::registry::TypeRegistry;
use crate::status::{ProtocolStatus, StatusTable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorModel {
    pub status_code: ProtocolStatus,
    pub name: String,
    /// Service type of the error value.
    pub type_ref: String,
    /// Status and description only.
    pub response: ResponseModel,
}

/// Error models of `method`: its own errors, then the service-wide ones.
pub fn build_errors(
    svc: &ServiceDef,
    method: &MethodDef,
    registry: &TypeRegistry,
    package: &str,
    status: &StatusTable,
) -> Result<Vec<ErrorModel>, CompileError> {
    svc.errors_of(method)
        .map(|e| {
            let status_code = status.lookup(e.status).ok_or_else(|| CompileError::UnmappedStatus {
                context: format!("{}.{} error '{}'", svc.name, method.name, e.name),
                code: e.status,
            })?;
            Ok(ErrorModel {
                name: e.name.clone(),
                type_ref: ServiceAnalyzer::new(&e.attribute, registry, package).type_ref(true),
                response: ResponseModel {
                    status_code: status_code.clone(),
                    description: e.description.clone(),
                    ..Default::default()
                },
                status_code,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremap_ir::{Attribute, ErrorDef};

    #[test]
    fn declaration_order_and_statuses() {
        let mut method = MethodDef::new("fetch");
        method.errors = vec![ErrorDef::new("timeout", 4), ErrorDef::new("internal", 13)];
        let mut bad_request = ErrorDef::new("bad_request", 3);
        bad_request.description = Some("Malformed input".into());
        bad_request.attribute = Attribute::user("Problem");
        let svc = ServiceDef {
            name: "store".into(),
            errors: vec![bad_request],
            methods: vec![method.clone()],
            ..Default::default()
        };

        let errors = build_errors(&svc, &method, &TypeRegistry::new(), "store", &StatusTable::grpc())
            .unwrap();
        let summary: Vec<(&str, &str)> = errors
            .iter()
            .map(|e| (e.name.as_str(), e.status_code.name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("timeout", "DeadlineExceeded"),
                ("internal", "Internal"),
                ("bad_request", "InvalidArgument"),
            ]
        );
        assert_eq!(errors[0].type_ref, "String");
        assert_eq!(errors[2].type_ref, "store::Problem");
        assert_eq!(errors[2].response.description.as_deref(), Some("Malformed input"));
        assert!(errors[2].response.message.is_none());
    }

    #[test]
    fn unmapped_status() {
        let mut method = MethodDef::new("fetch");
        method.errors = vec![ErrorDef::new("teapot", 418)];
        let svc = ServiceDef {
            name: "store".into(),
            methods: vec![method.clone()],
            ..Default::default()
        };
        let err = build_errors(&svc, &method, &TypeRegistry::new(), "store", &StatusTable::grpc())
            .unwrap_err();
        assert!(matches!(err, CompileError::UnmappedStatus { code: 418, .. }));
    }
}
