// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transform handlers by operation name

use crate::builtins::{ChecksumTransform, CopyTransform};
use crate::transform::Transform;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown operation: {0}")]
    Unknown(String),
}

#[derive(Clone, Default)]
pub struct TransformRegistry {
    handlers: HashMap<String, Arc<dyn Transform>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `copy` and `checksum`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("copy", CopyTransform);
        registry.register("checksum", ChecksumTransform);
        registry
    }

    /// Add a handler, replacing any previous one with the same name
    pub fn register(&mut self, name: impl Into<String>, transform: impl Transform) {
        self.handlers.insert(name.into(), Arc::new(transform));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transform>> {
        self.handlers.get(name).cloned()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Keep only `operations`. Every one of them must be registered.
    pub fn restrict(mut self, operations: &[String]) -> Result<Self, RegistryError> {
        if let Some(missing) = operations.iter().find(|op| !self.handlers.contains_key(*op)) {
            return Err(RegistryError::Unknown(missing.clone()));
        }
        self.handlers.retain(|name, _| operations.contains(name));
        Ok(self)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
