//! Identifier casing and per-service name scopes.

use std::collections::BTreeMap;

use heck::{ToSnakeCase, ToUpperCamelCase};
use serde::{Deserialize, Serialize};

/// `add_payload` → `AddPayload`.
pub fn pascal(s: &str) -> String {
    s.to_upper_camel_case()
}

/// `AddPayload` → `add_payload`.
pub fn snake(s: &str) -> String {
    s.to_snake_case()
}

/// Hands out unique identifiers within one service compilation.
///
/// Names are never released. `hashed_unique` returns the same name every
/// time it is called with the same key, so a type keeps its identifier no
/// matter how many times it is reached.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NameScope {
    counts: BTreeMap<String, usize>,
    hashed: BTreeMap<String, String>,
}

impl NameScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `name` if unused, otherwise `name` followed by the lowest
    /// free counter starting at 2.
    pub fn unique(&mut self, name: &str) -> String {
        let Some(&last) = self.counts.get(name) else {
            self.counts.insert(name.to_string(), 1);
            return name.to_string();
        };
        let mut i = last + 1;
        loop {
            let candidate = format!("{}{}", name, i);
            if !self.counts.contains_key(&candidate) {
                self.counts.insert(name.to_string(), i);
                self.counts.insert(candidate.clone(), 1);
                return candidate;
            }
            i += 1;
        }
    }

    /// Unique name for `key`, stable across calls.
    pub fn hashed_unique(&mut self, key: &str, name: &str) -> String {
        if let Some(existing) = self.hashed.get(key) {
            return existing.clone();
        }
        let unique = self.unique(name);
        self.hashed.insert(key.to_string(), unique.clone());
        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casing() {
        assert_eq!(pascal("add"), "Add");
        assert_eq!(pascal("stored_bottle"), "StoredBottle");
        assert_eq!(pascal("MethodUnaryRPC"), "MethodUnaryRpc");
        assert_eq!(snake("AddPayload"), "add_payload");
        assert_eq!(snake("api-key"), "api_key");
    }

    #[test]
    fn unique_appends_counter() {
        let mut scope = NameScope::new();
        assert_eq!(scope.unique("auth"), "auth");
        assert_eq!(scope.unique("auth"), "auth2");
        assert_eq!(scope.unique("auth"), "auth3");
        assert_eq!(scope.unique("auth2"), "auth22");
    }

    #[test]
    fn unique_skips_taken_candidates() {
        let mut scope = NameScope::new();
        assert_eq!(scope.unique("token2"), "token2");
        assert_eq!(scope.unique("token"), "token");
        assert_eq!(scope.unique("token"), "token3");
    }

    #[test]
    fn hashed_unique_is_stable() {
        let mut scope = NameScope::new();
        assert_eq!(scope.hashed_unique("a::Bottle", "Bottle"), "Bottle");
        assert_eq!(scope.hashed_unique("b::Bottle", "Bottle"), "Bottle2");
        assert_eq!(scope.hashed_unique("a::Bottle", "Bottle"), "Bottle");
    }
}
