use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use slate_store::Store;

use crate::collection::Collection;
use crate::config::PopulateConfig;
use crate::error::ConfigError;
use crate::fields::Record;
use crate::model::Model;
use crate::reference::Reference;
use crate::registry::CollectionRegistry;
use crate::resolver::Resolver;

/// Entry point: a store, the registry of collections used against it and
/// the catalog of every reference any model has declared.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

struct DbInner {
    store: Arc<dyn Store>,
    resolver: Resolver,
    references: Mutex<Vec<Reference>>,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("collections", &self.registry().names())
            .field("config", self.config())
            .finish_non_exhaustive()
    }
}

impl Db {
    pub fn new(store: Arc<dyn Store>, config: PopulateConfig) -> Self {
        Self::with_registry(store, Arc::new(CollectionRegistry::new()), config)
    }

    pub fn with_registry(
        store: Arc<dyn Store>,
        registry: Arc<CollectionRegistry>,
        config: PopulateConfig,
    ) -> Self {
        Self {
            inner: Arc::new(DbInner {
                store,
                resolver: Resolver::new(registry, config),
                references: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<CollectionRegistry> {
        self.inner.resolver.registry()
    }

    pub fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    pub fn config(&self) -> &PopulateConfig {
        self.inner.resolver.config()
    }

    /// Handle for `name`, registering it on first use.
    pub fn collection(&self, name: &str) -> Collection {
        let registry = self.registry();
        if let Some(handle) = registry.lookup(name) {
            return handle;
        }
        let handle = Collection::new(name, self.inner.store.clone());
        registry.register(name, handle.clone());
        handle
    }

    pub fn model<T: Record>(&self, name: &str) -> Model<T> {
        Model::new(self.clone(), self.collection(name))
    }

    /// Every reference declared through `Model::add_references`, in
    /// declaration order.
    pub fn references(&self) -> Vec<Reference> {
        self.inner
            .references
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn record_references(&self, references: &[Reference]) {
        self.inner
            .references
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(references);
    }

    /// Check that every collection any declared reference reaches is
    /// registered.
    pub fn validate_reference_universe(&self) -> Result<(), ConfigError> {
        self.registry()
            .validate_reference_universe(&self.references())
    }

    /// Startup check. A missing collection means references were declared
    /// against a collection no model owns, which would silently drop data
    /// at query time.
    ///
    /// # Panics
    ///
    /// Panics with the missing collection's name.
    pub fn assert_reference_universe(&self) {
        if let Err(e) = self.validate_reference_universe() {
            panic!("{e}");
        }
    }
}
