//! Validation rules derived from attribute constraints.
//!
//! Rules are structured values; rendering them to code is left to the
//! consumer of the service model.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wiremap_ir::{Attribute, DataType, Validation};

use crate::analyzer::AttributeAnalyzer;
use crate::naming::snake;

/// One check applied to the value at a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Check {
    /// The named field must be set.
    Required { field: String },
    MinLength { value: usize },
    MaxLength { value: usize },
    Minimum { value: f64 },
    Maximum { value: f64 },
    Pattern { regex: String },
    Enum { values: Vec<Value> },
    Format { format: String },
    /// The value is validated by the validator of its own message.
    Nested { validator: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Path of the checked value, rooted at the validated variable.
    /// `[*]` stands for every element of a collection.
    pub path: String,
    pub check: Check,
}

/// Validator of one message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSpec {
    /// Generated function name.
    pub name: String,
    pub rules: Vec<ValidationRule>,
    pub arg_name: String,
    /// Variable name of the validated message.
    pub src_name: String,
    pub src_ref: String,
}

/// Name of the validator of the message with the given variable name.
pub fn validator_name(var_name: &str) -> String {
    format!("validate_{}", snake(var_name))
}

/// Validation rules of the analyzed attribute, rooted at `var`.
///
/// Structures are walked field by field. Fields of user types with rules of
/// their own get a single [`Check::Nested`] rule instead.
pub fn recursive_validation<'a, A: AttributeAnalyzer<'a>>(an: &A, var: &str) -> Vec<ValidationRule> {
    let mut rules = Vec::new();
    let mut visiting = BTreeSet::new();
    if let Some(name) = an.attribute().ty.user_name() {
        visiting.insert(name.to_string());
    }
    let resolved = an.resolved();
    value_rules(&mut rules, var, &resolved.validation);
    if !std::ptr::eq(resolved, an.attribute()) {
        value_rules(&mut rules, var, &an.attribute().validation);
    }
    walk(an, resolved, var, &mut rules, &mut visiting);
    rules
}

fn walk<'a, A: AttributeAnalyzer<'a>>(
    an: &A,
    att: &'a Attribute,
    path: &str,
    rules: &mut Vec<ValidationRule>,
    visiting: &mut BTreeSet<String>,
) {
    match &att.ty {
        DataType::Object(fields) => {
            for name in &att.validation.required {
                if att.field(name).is_some() {
                    rules.push(ValidationRule {
                        path: path.to_string(),
                        check: Check::Required {
                            field: name.clone(),
                        },
                    });
                }
            }
            for f in fields {
                child(an, &f.attribute, &format!("{}.{}", path, f.name), rules, visiting);
            }
        }
        DataType::Array(elem) => child(an, elem, &format!("{}[*]", path), rules, visiting),
        DataType::Map { key, elem } => {
            child(an, key, &format!("{}.keys[*]", path), rules, visiting);
            child(an, elem, &format!("{}.values[*]", path), rules, visiting);
        }
        DataType::Empty | DataType::Primitive(_) | DataType::User(_) => {}
    }
}

fn child<'a, A: AttributeAnalyzer<'a>>(
    an: &A,
    att: &'a Attribute,
    path: &str,
    rules: &mut Vec<ValidationRule>,
    visiting: &mut BTreeSet<String>,
) {
    value_rules(rules, path, &att.validation);
    let registry = an.registry();
    match &att.ty {
        DataType::User(_) if registry.is_object(&att.ty) => {
            if has_rules(an, att, &mut BTreeSet::new()) {
                let validator = validator_name(&an.dup(att, true).name(false));
                rules.push(ValidationRule {
                    path: path.to_string(),
                    check: Check::Nested { validator },
                });
            }
        }
        DataType::User(name) => {
            // aliases of non-structures are checked in place
            if visiting.insert(name.clone()) {
                let resolved = registry.resolve_attribute(att);
                value_rules(rules, path, &resolved.validation);
                walk(an, resolved, path, rules, visiting);
                visiting.remove(name);
            }
        }
        _ => walk(an, att, path, rules, visiting),
    }
}

/// Returns true if validating a value of the attribute's type checks anything.
fn has_rules<'a, A: AttributeAnalyzer<'a>>(
    an: &A,
    att: &'a Attribute,
    seen: &mut BTreeSet<String>,
) -> bool {
    if !att.validation.is_empty() {
        return true;
    }
    match &att.ty {
        DataType::User(name) => {
            if !seen.insert(name.clone()) {
                return false;
            }
            let resolved = an.registry().resolve_attribute(att);
            has_rules(an, resolved, seen)
        }
        DataType::Object(fields) => fields.iter().any(|f| has_rules(an, &f.attribute, seen)),
        DataType::Array(elem) => has_rules(an, elem, seen),
        DataType::Map { key, elem } => has_rules(an, key, seen) || has_rules(an, elem, seen),
        DataType::Empty | DataType::Primitive(_) => false,
    }
}

fn value_rules(rules: &mut Vec<ValidationRule>, path: &str, v: &Validation) {
    let mut push = |check| {
        rules.push(ValidationRule {
            path: path.to_string(),
            check,
        })
    };
    if let Some(value) = v.min_length {
        push(Check::MinLength { value });
    }
    if let Some(value) = v.max_length {
        push(Check::MaxLength { value });
    }
    if let Some(value) = v.minimum {
        push(Check::Minimum { value });
    }
    if let Some(value) = v.maximum {
        push(Check::Maximum { value });
    }
    if let Some(regex) = &v.pattern {
        push(Check::Pattern {
            regex: regex.clone(),
        });
    }
    if !v.enum_values.is_empty() {
        push(Check::Enum {
            values: v.enum_values.clone(),
        });
    }
    if let Some(format) = &v.format {
        push(Check::Format {
            format: format.clone(),
        });
    }
}
