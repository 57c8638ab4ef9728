use std::fmt;
use std::sync::Arc;

use bson::{Bson, Document};
use slate_query::FindOptions;
use slate_store::{Context, DeleteResult, Store, StoreError, UpdateResult};

/// A named collection on a shared store. Cheap to clone.
///
/// Every call runs under the caller's `Context`, so cancellation and
/// deadlines reach the store.
#[derive(Clone)]
pub struct Collection {
    name: Arc<str>,
    store: Arc<dyn Store>,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Collection {
    pub fn new(name: impl Into<Arc<str>>, store: Arc<dyn Store>) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn find(
        &self,
        ctx: &Context,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        ctx.run(self.store.find(&self.name, filter, options)).await
    }

    pub async fn find_one(
        &self,
        ctx: &Context,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Option<Document>, StoreError> {
        ctx.run(self.store.find_one(&self.name, filter, options)).await
    }

    pub async fn insert_one(&self, ctx: &Context, doc: Document) -> Result<Bson, StoreError> {
        ctx.run(self.store.insert_one(&self.name, doc)).await
    }

    pub async fn update_one_set(
        &self,
        ctx: &Context,
        filter: &Document,
        fields: Document,
    ) -> Result<UpdateResult, StoreError> {
        ctx.run(self.store.update_one_set(&self.name, filter, fields)).await
    }

    pub async fn delete_one(
        &self,
        ctx: &Context,
        filter: &Document,
    ) -> Result<DeleteResult, StoreError> {
        ctx.run(self.store.delete_one(&self.name, filter)).await
    }
}
