//! Message synthesizer: flattens attribute trees into the list of named wire
//! messages they reach.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use wiremap_ir::{DataType, META_TAG};

use crate::analyzer::AttributeAnalyzer;
use crate::naming::NameScope;
use crate::validation::{recursive_validation, validator_name, ValidationSpec};

/// A named wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    /// Name of the underlying user type. Unique within a service.
    pub name: String,
    /// Generated identifier, unique within the service scope.
    pub var_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Fields, in declaration order. Empty for messages without fields.
    pub definition: Vec<MessageField>,
    pub type_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageField {
    pub name: String,
    pub tag: u32,
    pub type_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
}

/// Collects the messages reachable from the analyzed attribute.
///
/// Each user type yields one descriptor, followed by the descriptors of the
/// types it reaches. Types already in `seen` are skipped, which also stops
/// recursion through self-referential types. A validator is appended to
/// `validations` for every collected message with at least one rule.
pub fn collect_messages<'a, A: AttributeAnalyzer<'a>>(
    an: &A,
    scope: &mut NameScope,
    validations: &mut Vec<ValidationSpec>,
    seen: &mut BTreeSet<String>,
) -> Vec<MessageDescriptor> {
    let att = an.attribute();
    let mut data = Vec::new();
    match &att.ty {
        DataType::User(name) => {
            if seen.contains(name) {
                return data;
            }
            let var_name = scope.hashed_unique(name, &an.name(false));
            let type_ref = an.type_ref(true);
            let Some(ut) = an.registry().get(name) else {
                return data;
            };
            let def = an.dup(&ut.attribute, true);
            data.push(MessageDescriptor {
                name: name.clone(),
                var_name: var_name.clone(),
                description: ut.attribute.description.clone(),
                definition: definition(&def),
                type_ref: type_ref.clone(),
            });

            let rules = recursive_validation(an, "message");
            if !rules.is_empty() {
                validations.push(ValidationSpec {
                    name: validator_name(&an.name(false)),
                    rules,
                    arg_name: "message".to_string(),
                    src_name: var_name.clone(),
                    src_ref: type_ref,
                });
            }
            debug!(message = %var_name, "collected message");

            seen.insert(name.clone());
            data.extend(collect_messages(&def, scope, validations, seen));
        }
        DataType::Object(fields) => {
            for f in fields {
                data.extend(collect_messages(
                    &an.dup(&f.attribute, true),
                    scope,
                    validations,
                    seen,
                ));
            }
        }
        DataType::Array(elem) => {
            data.extend(collect_messages(&an.dup(elem, true), scope, validations, seen));
        }
        DataType::Map { key, elem } => {
            data.extend(collect_messages(&an.dup(key, true), scope, validations, seen));
            data.extend(collect_messages(&an.dup(elem, true), scope, validations, seen));
        }
        DataType::Empty | DataType::Primitive(_) => {}
    }
    data
}

fn definition<'a, A: AttributeAnalyzer<'a>>(an: &A) -> Vec<MessageField> {
    let att = an.resolved();
    let DataType::Object(fields) = &att.ty else {
        return Vec::new();
    };
    fields
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let required = att.is_required(&f.name);
            MessageField {
                name: f.name.clone(),
                tag: f
                    .attribute
                    .meta(META_TAG)
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(i as u32 + 1),
                type_ref: an.dup(&f.attribute, required).type_ref(true),
                description: f.attribute.description.clone(),
                required,
            }
        })
        .collect()
}
