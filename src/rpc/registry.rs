//! Registry mapping full RPC method names to bindings.
//!
//! Full names have the form `{service}/{method}`, e.g. `pets.Cats/GetCat`.
//! Lookup is by exact name; there is no pattern matching on this side.

use std::collections::HashMap;

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct MethodRegistry<T> {
    methods: HashMap<String, T>,
}

impl<T> MethodRegistry<T> {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Register a method. A name that is already present is rejected and
    /// the registry is left as it was.
    pub fn register(&mut self, name: impl Into<String>, value: T) -> Result<()> {
        let name = name.into();
        if self.methods.contains_key(&name) {
            return Err(Error::DuplicateBinding(format!("rpc method {name}")));
        }
        tracing::debug!(method = %name, "RPC method registered");
        self.methods.insert(name, value);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&T> {
        self.methods
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("rpc method {name}")))
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl<T> Default for MethodRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_lookup_only() {
        let mut registry = MethodRegistry::new();
        registry.register("pets.Cats/GetCat", 1).unwrap();

        assert_eq!(*registry.lookup("pets.Cats/GetCat").unwrap(), 1);
        assert!(matches!(registry.lookup("pets.Cats/getcat"), Err(Error::NotFound(_))));
        assert!(matches!(registry.lookup("pets.Cats/GetCat/"), Err(Error::NotFound(_))));
    }

    #[test]
    fn duplicate_leaves_registry_unchanged() {
        let mut registry = MethodRegistry::new();
        registry.register("pets.Cats/GetCat", 1).unwrap();

        let err = registry.register("pets.Cats/GetCat", 2).unwrap_err();
        assert!(matches!(err, Error::DuplicateBinding(_)));
        assert_eq!(registry.len(), 1);
        assert_eq!(*registry.lookup("pets.Cats/GetCat").unwrap(), 1);
    }
}
