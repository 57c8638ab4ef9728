use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use slate_store::{Context, DeleteResult, UpdateResult};
use tracing::info;

use crate::collection::Collection;
use crate::db::Db;
use crate::error::{ConfigError, PopulateError};
use crate::fields::Record;
use crate::query::Query;
use crate::reference::Reference;

/// Typed access to one collection plus the references its documents can be
/// populated with.
///
/// Clones share the declared references.
pub struct Model<T> {
    db: Db,
    collection: Collection,
    references: Arc<RwLock<Vec<Reference>>>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Model<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            collection: self.collection.clone(),
            references: self.references.clone(),
            _record: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Model<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("collection", &self.collection.name())
            .field("references", &self.references())
            .finish()
    }
}

impl<T> Model<T> {
    pub(crate) fn new(db: Db, collection: Collection) -> Self {
        Self {
            db,
            collection,
            references: Arc::new(RwLock::new(Vec::new())),
            _record: PhantomData,
        }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Declare references that queries may opt into with `Query::populate`.
    ///
    /// Every reference is validated before any is added; one invalid
    /// reference rejects the whole call. A reference whose local key is
    /// already declared is skipped, keeping the earlier one.
    pub fn add_references(
        &self,
        references: impl IntoIterator<Item = Reference>,
    ) -> Result<(), ConfigError> {
        let mut incoming: Vec<Reference> = references.into_iter().collect();
        for reference in &mut incoming {
            if !reference.validate() {
                return Err(ConfigError::InvalidReference {
                    alias: reference.alias.clone(),
                    collection: self.collection.name().to_string(),
                });
            }
        }

        let mut declared = self
            .references
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut added = Vec::with_capacity(incoming.len());
        for reference in incoming {
            if declared.iter().any(|r| r.local_key == reference.local_key) {
                info!(
                    collection = %self.collection.name(),
                    local_key = %reference.local_key,
                    "reference already declared, skipping"
                );
                continue;
            }
            info!(
                collection = %self.collection.name(),
                local_key = %reference.local_key,
                source = %reference.source,
                alias = %reference.alias,
                "declaring reference"
            );
            declared.push(reference.clone());
            added.push(reference);
        }
        drop(declared);

        self.db.record_references(&added);
        Ok(())
    }

    pub fn references(&self) -> Vec<Reference> {
        self.references
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_valid_reference_key(&self, key: &str) -> bool {
        self.references
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|r| r.local_key == key)
    }

    /// The declared reference for `key`.
    pub fn reference(&self, key: &str) -> Option<Reference> {
        self.references
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.local_key == key)
            .cloned()
    }
}

impl<T: Record> Model<T> {
    pub fn query(&self, filter: Document) -> Query<'_, T> {
        Query::new(self, filter)
    }

    pub async fn create(&self, ctx: &Context, record: &T) -> Result<ObjectId, PopulateError> {
        let doc = bson::serialize_to_document(record).map_err(PopulateError::Encode)?;
        match self.collection.insert_one(ctx, doc).await? {
            Bson::ObjectId(id) => Ok(id),
            other => Err(PopulateError::InvalidId(other.to_string())),
        }
    }

    /// `$set` the given fields on the document with `_id == id`.
    pub async fn update_by_id(
        &self,
        ctx: &Context,
        id: ObjectId,
        fields: Document,
    ) -> Result<UpdateResult, PopulateError> {
        Ok(self
            .collection
            .update_one_set(ctx, &doc! { "_id": id }, fields)
            .await?)
    }

    pub async fn delete_by_id(
        &self,
        ctx: &Context,
        id: ObjectId,
    ) -> Result<DeleteResult, PopulateError> {
        Ok(self.collection.delete_one(ctx, &doc! { "_id": id }).await?)
    }
}
