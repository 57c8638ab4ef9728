use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::info;

use crate::collection::Collection;
use crate::error::ConfigError;
use crate::reference::Reference;

/// Directory of collection handles, shared by every model and resolver of
/// one `Db`.
///
/// Entries are added the first time a collection is used and live for the
/// rest of the process; nothing removes them. Inject a fresh registry per
/// test rather than sharing one.
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    collections: RwLock<HashMap<String, Collection>>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the handle for `name`.
    pub fn register(&self, name: impl Into<String>, handle: Collection) {
        let name = name.into();
        info!(collection = %name, "registering collection");
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, handle);
    }

    pub fn lookup(&self, name: &str) -> Option<Collection> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Check that every collection reachable from `references`, nested ones
    /// included, is registered. Reports the first missing name in
    /// depth-first order.
    pub fn validate_reference_universe(&self, references: &[Reference]) -> Result<(), ConfigError> {
        references
            .iter()
            .flat_map(Reference::sources)
            .find(|source| !self.exists(source))
            .map_or(Ok(()), |missing| {
                Err(ConfigError::MissingCollection(missing.to_string()))
            })
    }
}
