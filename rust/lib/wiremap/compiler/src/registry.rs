//! Type registry: resolves user type references by name.

use std::collections::{BTreeMap, BTreeSet};

use wiremap_ir::{Attribute, DataType, Primitive, UserType};

use crate::error::CompileError;

static EMPTY: DataType = DataType::Empty;

/// Named user types of one side (service or wire) of a compilation.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, UserType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_types<I: IntoIterator<Item = UserType>>(types: I) -> Self {
        let mut registry = Self::new();
        for ut in types {
            registry.insert(ut);
        }
        registry
    }

    /// Adds a user type, replacing any previous type of the same name.
    pub fn insert(&mut self, ut: UserType) {
        self.types.insert(ut.name.clone(), ut);
    }

    pub fn get(&self, name: &str) -> Option<&UserType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Follows user type references down to the defining attribute.
    ///
    /// Unknown names resolve to the last attribute reached; call
    /// [`check_references`](Self::check_references) first to rule them out.
    pub fn resolve_attribute<'r>(&'r self, att: &'r Attribute) -> &'r Attribute {
        let mut current = att;
        let mut hops = 0;
        while let DataType::User(name) = &current.ty {
            match self.types.get(name) {
                Some(ut) if hops <= self.types.len() => {
                    current = &ut.attribute;
                    hops += 1;
                }
                _ => break,
            }
        }
        current
    }

    /// The non-user shape of a type. Unknown or aliased-in-a-loop user types
    /// resolve to `Empty`.
    pub fn underlying<'r>(&'r self, ty: &'r DataType) -> &'r DataType {
        match ty {
            DataType::User(name) => match self.types.get(name) {
                Some(ut) => {
                    let resolved = &self.resolve_attribute(&ut.attribute).ty;
                    if matches!(resolved, DataType::User(_)) {
                        &EMPTY
                    } else {
                        resolved
                    }
                }
                None => &EMPTY,
            },
            other => other,
        }
    }

    pub fn is_object(&self, ty: &DataType) -> bool {
        matches!(self.underlying(ty), DataType::Object(_))
    }

    pub fn is_primitive(&self, ty: &DataType) -> bool {
        matches!(self.underlying(ty), DataType::Primitive(_))
    }

    pub fn primitive(&self, ty: &DataType) -> Option<Primitive> {
        match self.underlying(ty) {
            DataType::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// Returns true if values of the type carry no data: `Empty` or an
    /// object without fields.
    pub fn is_empty_type(&self, ty: &DataType) -> bool {
        match self.underlying(ty) {
            DataType::Empty => true,
            DataType::Object(fields) => fields.is_empty(),
            _ => false,
        }
    }

    /// Verifies every user type reference in `att` and in all registered
    /// types names a registered type.
    pub fn check_references(&self, context: &str, att: &Attribute) -> Result<(), CompileError> {
        let mut seen = BTreeSet::new();
        self.check_attribute(context, att, &mut seen)
    }

    /// Verifies every registered type.
    pub fn check_all(&self) -> Result<(), CompileError> {
        let mut seen = BTreeSet::new();
        for ut in self.types.values() {
            self.check_attribute(&ut.name, &ut.attribute, &mut seen)?;
        }
        Ok(())
    }

    fn check_attribute<'r>(
        &'r self,
        context: &str,
        att: &'r Attribute,
        seen: &mut BTreeSet<&'r str>,
    ) -> Result<(), CompileError> {
        match &att.ty {
            DataType::Empty | DataType::Primitive(_) => Ok(()),
            DataType::Object(fields) => {
                for f in fields {
                    self.check_attribute(context, &f.attribute, seen)?;
                }
                Ok(())
            }
            DataType::Array(elem) => self.check_attribute(context, elem, seen),
            DataType::Map { key, elem } => {
                self.check_attribute(context, key, seen)?;
                self.check_attribute(context, elem, seen)
            }
            DataType::User(name) => {
                let Some(ut) = self.types.get(name) else {
                    return Err(CompileError::UnknownType {
                        context: context.to_string(),
                        name: name.clone(),
                    });
                };
                if !seen.insert(ut.name.as_str()) {
                    return Ok(());
                }
                self.check_attribute(&ut.name, &ut.attribute, seen)
            }
        }
    }

    /// `base` if no type of that name exists, otherwise `base` followed by
    /// the lowest free counter starting at 2.
    pub fn fresh_name(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        (2..)
            .map(|i| format!("{}{}", base, i))
            .find(|n| !self.contains(n))
            .unwrap_or_else(|| base.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremap_ir::Field;

    fn registry() -> TypeRegistry {
        TypeRegistry::from_types(vec![
            UserType::new(
                "Node",
                Attribute::object(vec![
                    Field::new("value", Attribute::primitive(Primitive::String)),
                    Field::new("next", Attribute::user("Node")),
                ]),
            ),
            UserType::new("Alias", Attribute::user("Node")),
            UserType::new("Unit", Attribute::object(vec![])),
            UserType::new("Count", Attribute::primitive(Primitive::Int32)),
        ])
    }

    #[test]
    fn resolves_aliases() {
        let reg = registry();
        let alias = Attribute::user("Alias");
        assert!(matches!(reg.resolve_attribute(&alias).ty, DataType::Object(_)));
        assert!(reg.is_object(&alias.ty));
        assert!(reg.is_primitive(&DataType::User("Count".into())));
        assert_eq!(
            reg.primitive(&DataType::User("Count".into())),
            Some(Primitive::Int32)
        );
    }

    #[test]
    fn empty_types() {
        let reg = registry();
        assert!(reg.is_empty_type(&DataType::Empty));
        assert!(reg.is_empty_type(&DataType::User("Unit".into())));
        assert!(!reg.is_empty_type(&DataType::User("Node".into())));
        assert!(!reg.is_empty_type(&DataType::Primitive(Primitive::Boolean)));
    }

    #[test]
    fn self_reference_checks_out() {
        let reg = registry();
        assert!(reg.check_all().is_ok());
        assert!(reg.check_references("m", &Attribute::user("Node")).is_ok());
    }

    #[test]
    fn unknown_reference_is_reported() {
        let reg = registry();
        let att = Attribute::array(Attribute::user("Ghost"));
        let err = reg.check_references("svc.m", &att).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownType {
                context: "svc.m".into(),
                name: "Ghost".into()
            }
        );
    }

    #[test]
    fn fresh_names() {
        let reg = registry();
        assert_eq!(reg.fresh_name("AddRequest"), "AddRequest");
        assert_eq!(reg.fresh_name("Node"), "Node2");
        assert!(reg.contains("Node"));
    }
}
