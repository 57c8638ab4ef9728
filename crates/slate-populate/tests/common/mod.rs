#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use slate_populate::{
    Db, DeleteResult, FindOptions, PopulateConfig, Resolver, Store,
    StoreError, UpdateResult,
};
use slate_store::MemoryStore;

pub const BOOKS: &str = "books";
pub const AUTHORS: &str = "authors";
pub const PUBLISHERS: &str = "publishers";
pub const COUNTRIES: &str = "countries";

/// `MemoryStore` wrapper that counts finds per collection and can be told
/// to fail or stall finds on chosen collections.
#[derive(Default)]
pub struct TestStore {
    inner: MemoryStore,
    finds: Mutex<HashMap<String, usize>>,
    failing: HashSet<String>,
    slow: HashMap<String, Duration>,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, collection: &str) -> Self {
        self.failing.insert(collection.to_string());
        self
    }

    pub fn slow(mut self, collection: &str, delay: Duration) -> Self {
        self.slow.insert(collection.to_string(), delay);
        self
    }

    pub fn finds(&self, collection: &str) -> usize {
        self.finds.lock().unwrap().get(collection).copied().unwrap_or(0)
    }

    pub fn total_finds(&self) -> usize {
        self.finds.lock().unwrap().values().sum()
    }

    pub async fn insert_all(&self, collection: &str, docs: Vec<Document>) {
        for doc in docs {
            self.inner.insert_one(collection, doc).await.unwrap();
        }
    }

    async fn before_find(&self, collection: &str) -> Result<(), StoreError> {
        *self
            .finds
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default() += 1;
        if let Some(delay) = self.slow.get(collection) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(collection) {
            return Err(StoreError::Storage(format!("{collection} is unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for TestStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        self.before_find(collection).await?;
        self.inner.find(collection, filter, options).await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Option<Document>, StoreError> {
        self.before_find(collection).await?;
        self.inner.find_one(collection, filter, options).await
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Bson, StoreError> {
        self.inner.insert_one(collection, doc).await
    }

    async fn update_one_set(
        &self,
        collection: &str,
        filter: &Document,
        fields: Document,
    ) -> Result<UpdateResult, StoreError> {
        self.inner.update_one_set(collection, filter, fields).await
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: &Document,
    ) -> Result<DeleteResult, StoreError> {
        self.inner.delete_one(collection, filter).await
    }
}

/// Books 1 and 3 by author 10, book 2 by author 11, book 4 with a null
/// author and book 5 with none.
pub fn book_rows() -> Vec<Document> {
    vec![
        doc! { "_id": 1, "title": "Dune", "authorId": 10 },
        doc! { "_id": 2, "title": "Emma", "authorId": 11 },
        doc! { "_id": 3, "title": "Children of Dune", "authorId": 10 },
        doc! { "_id": 4, "title": "Beowulf", "authorId": null },
        doc! { "_id": 5, "title": "Untitled" },
    ]
}

pub fn author_rows() -> Vec<Document> {
    vec![
        doc! { "_id": 1, "id": 10, "name": "A", "publisherId": 100 },
        doc! { "_id": 2, "id": 11, "name": "B", "publisherId": 101 },
    ]
}

pub fn publisher_rows() -> Vec<Document> {
    vec![
        doc! { "_id": 1, "id": 100, "name": "Chilton", "countryId": "us" },
        doc! { "_id": 2, "id": 101, "name": "Murray", "countryId": "uk" },
    ]
}

pub fn country_rows() -> Vec<Document> {
    vec![
        doc! { "_id": "us", "name": "United States" },
        doc! { "_id": "uk", "name": "United Kingdom" },
    ]
}

/// A store holding every seed collection.
pub async fn seeded(store: TestStore) -> Arc<TestStore> {
    store.insert_all(BOOKS, book_rows()).await;
    store.insert_all(AUTHORS, author_rows()).await;
    store.insert_all(PUBLISHERS, publisher_rows()).await;
    store.insert_all(COUNTRIES, country_rows()).await;
    Arc::new(store)
}

/// A `Db` on `store` with every seed collection registered.
pub fn db(store: Arc<TestStore>, config: PopulateConfig) -> Db {
    let db = Db::new(store, config);
    for name in [BOOKS, AUTHORS, PUBLISHERS, COUNTRIES] {
        db.collection(name);
    }
    db
}

/// The resolver of a `Db` with every seed collection registered.
pub fn resolver(store: Arc<TestStore>, config: PopulateConfig) -> Resolver {
    db(store, config).resolver().clone()
}

pub fn titles(rows: &[Document]) -> Vec<&str> {
    rows.iter().map(|row| row.get_str("title").unwrap()).collect()
}
