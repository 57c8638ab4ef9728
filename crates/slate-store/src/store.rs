use async_trait::async_trait;
use bson::{Bson, Document};
use slate_query::FindOptions;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted: u64,
}

/// Document store client.
///
/// Filters are MongoDB-style query documents (see `slate_query::parse_filter`).
/// Implementations must be `Send + Sync`; one handle is shared by every
/// collection and every concurrent population branch.
#[async_trait]
pub trait Store: Send + Sync {
    /// All documents in `collection` matching `filter`, after sort, skip,
    /// limit and projection. A collection that does not exist yields no
    /// documents.
    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError>;

    /// First document matching `filter` under `options.sort`. Skip and limit
    /// are ignored.
    async fn find_one(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Option<Document>, StoreError>;

    /// Insert a document, returning its `_id`. Implementations assign an
    /// `ObjectId` when the document has none.
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Bson, StoreError>;

    /// `$set` the given fields on the first document matching `filter`.
    async fn update_one_set(
        &self,
        collection: &str,
        filter: &Document,
        fields: Document,
    ) -> Result<UpdateResult, StoreError>;

    /// Delete the first document matching `filter`.
    async fn delete_one(
        &self,
        collection: &str,
        filter: &Document,
    ) -> Result<DeleteResult, StoreError>;
}
