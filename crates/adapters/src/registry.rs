//! Maps step `kind` strings to [`StepAdapter`] implementations.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::{RegistryError, StepAdapter};

/// Append-only lookup from kind to adapter.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn StepAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `adapter` under its own kind.
    ///
    /// # Errors
    /// [`RegistryError::DuplicateKind`] if the kind is already taken.
    pub fn register(&mut self, adapter: Arc<dyn StepAdapter>) -> Result<(), RegistryError> {
        let kind = adapter.kind().to_owned();
        if self.adapters.contains_key(&kind) {
            return Err(RegistryError::DuplicateKind(kind));
        }
        debug!("registered adapter for kind '{}'", kind);
        self.adapters.insert(kind, adapter);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    ///
    /// # Errors
    /// [`RegistryError::DuplicateKind`] if the kind is already taken.
    pub fn with(mut self, adapter: Arc<dyn StepAdapter>) -> Result<Self, RegistryError> {
        self.register(adapter)?;
        Ok(self)
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn StepAdapter>> {
        self.adapters.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.adapters.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
