use std::sync::Arc;
use std::time::Duration;

use bson::doc;
use serde::{Deserialize, Serialize};
use slate_populate::{
    Context, Db, FieldName, PopulateConfig, Record, Reference, SortDirection, Store,
};
use slate_store::MemoryStore;
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
struct Country {
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Publisher {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    country: Option<Country>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Author {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publisher: Option<Publisher>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Book {
    #[serde(rename = "_id")]
    id: i32,
    title: String,
    #[serde(rename = "authorId", default)]
    author_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author: Option<Author>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    reviews: Vec<Review>,
}

impl Record for Book {
    const FIELDS: &'static [FieldName] = &[
        FieldName::new("id").rename("_id"),
        FieldName::new("title"),
        FieldName::new("author_id").rename("authorId").alias("author_ref"),
        FieldName::new("author"),
        FieldName::new("reviews"),
    ];
}

#[derive(Debug, Serialize, Deserialize)]
struct Review {
    stars: i32,
    text: String,
}

async fn seed(store: &MemoryStore) -> Result<(), slate_populate::StoreError> {
    for country in [
        doc! { "_id": "us", "name": "United States" },
        doc! { "_id": "uk", "name": "United Kingdom" },
    ] {
        store.insert_one("countries", country).await?;
    }
    for publisher in [
        doc! { "_id": 100, "name": "Chilton", "countryId": "us" },
        doc! { "_id": 101, "name": "John Murray", "countryId": "uk" },
    ] {
        store.insert_one("publishers", publisher).await?;
    }
    for author in [
        doc! { "_id": 10, "name": "Frank Herbert", "publisherId": 100 },
        doc! { "_id": 11, "name": "Jane Austen", "publisherId": 101 },
    ] {
        store.insert_one("authors", author).await?;
    }
    for book in [
        doc! { "_id": 1, "title": "Dune", "authorId": 10 },
        doc! { "_id": 2, "title": "Emma", "authorId": 11 },
        doc! { "_id": 3, "title": "Dune Messiah", "authorId": 10 },
        doc! { "_id": 4, "title": "Beowulf", "authorId": null },
    ] {
        store.insert_one("books", book).await?;
    }
    for review in [
        doc! { "bookId": 1, "stars": 5, "text": "A classic" },
        doc! { "bookId": 1, "stars": 4, "text": "Dense but rewarding" },
        doc! { "bookId": 2, "stars": 3, "text": "Charming" },
    ] {
        store.insert_one("reviews", review).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = PopulateConfig::from_env();
    info!(?config, "starting slate-populate-demo");

    let store = Arc::new(MemoryStore::new());
    seed(&store).await.expect("failed to seed store");

    let db = Db::new(store, config);
    let books = db.model::<Book>("books");
    db.collection("authors");
    db.collection("publishers");
    db.collection("countries");
    db.collection("reviews");

    books
        .add_references([
            Reference::new("authors", "authorId", "_id", "author").with_nested([Reference::new(
                "publishers",
                "publisherId",
                "_id",
                "publisher",
            )
            .with_nested([Reference::new("countries", "countryId", "_id", "country")])]),
            Reference::new("reviews", "_id", "bookId", "reviews").many(),
        ])
        .expect("invalid reference declaration");
    db.assert_reference_universe();

    let ctx = Context::background().with_timeout(Duration::from_secs(5));
    let found = books
        .query(doc! {})
        .sort("id", SortDirection::Asc)
        .select(["title author_ref"])
        .populate("author_id", "name")
        .populate("_id", "stars text")
        .find(&ctx)
        .await
        .expect("query failed");

    println!(
        "{}",
        serde_json::to_string_pretty(&found).expect("failed to serialize results")
    );
}
