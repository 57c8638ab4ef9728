use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use imbl::Vector;
use slate_query::{Expression, FindOptions, matches, parse_filter, sort_documents};

use crate::error::StoreError;
use crate::store::{DeleteResult, Store, UpdateResult};

pub(crate) type Documents = Vector<Document>;
type CollectionMap = HashMap<String, Arc<ArcSwap<Documents>>>;

/// In-memory document store.
///
/// Each collection is an `imbl::Vector` behind an `ArcSwap`: readers load
/// a snapshot without locking, writers serialize on a single mutex, clone
/// the vector (structural sharing keeps this cheap) and swap the new
/// version in. Documents keep insertion order.
pub struct MemoryStore {
    collections: RwLock<CollectionMap>,
    write_lock: Mutex<()>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Names of every collection that has received a write.
    pub fn collection_names(&self) -> Result<Vec<String>, StoreError> {
        let collections = self.read_collections()?;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Snapshot a collection. Cheap due to imbl structural sharing.
    fn snapshot(&self, collection: &str) -> Result<Option<Arc<Documents>>, StoreError> {
        let collections = self.read_collections()?;
        Ok(collections.get(collection).map(|arc| arc.load_full()))
    }

    fn slot(&self, collection: &str) -> Result<Arc<ArcSwap<Documents>>, StoreError> {
        if let Some(slot) = self.read_collections()?.get(collection) {
            return Ok(slot.clone());
        }
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Storage(format!("collection map poisoned: {e}")))?;
        Ok(collections
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::from_pointee(Vector::new())))
            .clone())
    }

    fn read_collections(&self) -> Result<RwLockReadGuard<'_, CollectionMap>, StoreError> {
        self.collections
            .read()
            .map_err(|e| StoreError::Storage(format!("collection map poisoned: {e}")))
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))
    }

    /// Filter + sort without skip/limit/projection.
    fn select(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let expr = parse_filter(filter)?;
        let Some(docs) = self.snapshot(collection)? else {
            return Ok(Vec::new());
        };
        let mut selected: Vec<Document> =
            docs.iter().filter(|doc| matches(doc, &expr)).cloned().collect();
        sort_documents(&mut selected, &options.sort);
        Ok(selected)
    }

    /// Position of the first document matching `expr`.
    fn position(docs: &Documents, expr: &Expression) -> Option<usize> {
        docs.iter().position(|doc| matches(doc, expr))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let selected = self.select(collection, filter, options)?;

        let skip = options.skip.unwrap_or(0) as usize;
        let limit = options.limit.map_or(usize::MAX, |l| l as usize);
        let page = selected.into_iter().skip(skip).take(limit);

        match &options.projection {
            Some(projection) => page
                .map(|doc| projection.apply(&doc).map_err(StoreError::from))
                .collect(),
            None => Ok(page.collect()),
        }
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Option<Document>, StoreError> {
        let Some(first) = self.select(collection, filter, options)?.into_iter().next() else {
            return Ok(None);
        };
        match &options.projection {
            Some(projection) => Ok(Some(projection.apply(&first)?)),
            None => Ok(Some(first)),
        }
    }

    async fn insert_one(&self, collection: &str, mut doc: Document) -> Result<Bson, StoreError> {
        let id = match doc.get("_id") {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                // Keep _id first, as a freshly inserted document would read back
                let mut with_id = Document::new();
                with_id.insert("_id", id.clone());
                for (key, value) in doc {
                    with_id.insert(key, value);
                }
                doc = with_id;
                id
            }
        };

        let slot = self.slot(collection)?;
        let _guard = self.lock_writes()?;
        let mut docs = (**slot.load()).clone();
        if docs.iter().any(|existing| existing.get("_id") == Some(&id)) {
            return Err(StoreError::Storage(format!(
                "duplicate _id in {collection}: {id}"
            )));
        }
        docs.push_back(doc);
        slot.store(Arc::new(docs));
        Ok(id)
    }

    async fn update_one_set(
        &self,
        collection: &str,
        filter: &Document,
        fields: Document,
    ) -> Result<UpdateResult, StoreError> {
        let expr = parse_filter(filter)?;
        let Some(slot) = self.read_collections()?.get(collection).cloned() else {
            return Ok(UpdateResult::default());
        };

        let _guard = self.lock_writes()?;
        let mut docs = (**slot.load()).clone();
        let Some(idx) = Self::position(&docs, &expr) else {
            return Ok(UpdateResult::default());
        };

        let mut updated = docs[idx].clone();
        let mut modified = false;
        for (key, value) in fields {
            if key == "_id" {
                return Err(StoreError::Storage("cannot $set _id".into()));
            }
            if updated.get(&key) != Some(&value) {
                updated.insert(key, value);
                modified = true;
            }
        }

        if modified {
            docs.set(idx, updated);
            slot.store(Arc::new(docs));
        }
        Ok(UpdateResult {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: &Document,
    ) -> Result<DeleteResult, StoreError> {
        let expr = parse_filter(filter)?;
        let Some(slot) = self.read_collections()?.get(collection).cloned() else {
            return Ok(DeleteResult::default());
        };

        let _guard = self.lock_writes()?;
        let mut docs = (**slot.load()).clone();
        match Self::position(&docs, &expr) {
            Some(idx) => {
                docs.remove(idx);
                slot.store(Arc::new(docs));
                Ok(DeleteResult { deleted: 1 })
            }
            None => Ok(DeleteResult::default()),
        }
    }
}
