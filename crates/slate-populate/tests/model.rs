use std::sync::Arc;

use bson::doc;
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use slate_populate::{
    ConfigError, Context, Db, FieldName, PopulateConfig, PopulateError, Record, Reference,
};
use slate_store::MemoryStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    title: String,
    #[serde(rename = "authorId")]
    author_id: i32,
}

impl Record for Note {
    const FIELDS: &'static [FieldName] = &[
        FieldName::new("id").rename("_id"),
        FieldName::new("title"),
        FieldName::new("author_id").rename("authorId"),
    ];
}

#[derive(Debug, Serialize, Deserialize)]
struct Tag {
    #[serde(rename = "_id")]
    id: String,
}

impl Record for Tag {}

fn db() -> Db {
    Db::new(Arc::new(MemoryStore::new()), PopulateConfig::default())
}

fn note(title: &str) -> Note {
    Note {
        id: None,
        title: title.to_string(),
        author_id: 10,
    }
}

#[tokio::test]
async fn create_update_delete_by_id() {
    let db = db();
    let notes = db.model::<Note>("notes");
    let ctx = Context::background();

    let id = notes.create(&ctx, &note("draft")).await.unwrap();
    let stored = notes
        .query(doc! { "_id": id })
        .find_one(&ctx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, Some(id));
    assert_eq!(stored.title, "draft");

    let result = notes
        .update_by_id(&ctx, id, doc! { "title": "final" })
        .await
        .unwrap();
    assert_eq!((result.matched, result.modified), (1, 1));
    let stored = notes
        .query(doc! { "_id": id })
        .find_one(&ctx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "final");

    let result = notes.delete_by_id(&ctx, id).await.unwrap();
    assert_eq!(result.deleted, 1);
    assert!(notes.query(doc! {}).find(&ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_and_delete_unknown_id_touch_nothing() {
    let db = db();
    let notes = db.model::<Note>("notes");
    let ctx = Context::background();
    notes.create(&ctx, &note("kept")).await.unwrap();

    let missing = ObjectId::new();
    let result = notes
        .update_by_id(&ctx, missing, doc! { "title": "lost" })
        .await
        .unwrap();
    assert_eq!((result.matched, result.modified), (0, 0));
    assert_eq!(notes.delete_by_id(&ctx, missing).await.unwrap().deleted, 0);
    assert_eq!(notes.query(doc! {}).find(&ctx).await.unwrap().len(), 1);
}

#[tokio::test]
async fn create_requires_object_id() {
    let db = db();
    let tags = db.model::<Tag>("tags");
    let err = tags
        .create(&Context::background(), &Tag { id: "rust".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, PopulateError::InvalidId(_)), "{err:?}");
}

#[test]
fn duplicate_local_key_keeps_first_reference() {
    let db = db();
    let notes = db.model::<Note>("notes");
    notes
        .add_references([
            Reference::new("authors", "authorId", "_id", "author"),
            Reference::new("people", "authorId", "_id", "person"),
        ])
        .unwrap();
    notes
        .add_references([Reference::new("writers", "authorId", "_id", "writer")])
        .unwrap();

    assert_eq!(notes.references().len(), 1);
    assert_eq!(notes.reference("authorId").unwrap().alias, "author");
    assert!(notes.is_valid_reference_key("authorId"));
    assert!(!notes.is_valid_reference_key("author"));
    assert_eq!(db.references().len(), 1);
}

#[test]
fn invalid_reference_rejects_whole_batch() {
    let db = db();
    let notes = db.model::<Note>("notes");
    let err = notes
        .add_references([
            Reference::new("authors", "authorId", "_id", "author"),
            Reference::new("tags", "tagIds", " ", "tags").many(),
        ])
        .unwrap_err();

    assert_eq!(
        err,
        ConfigError::InvalidReference {
            alias: "tags".into(),
            collection: "notes".into(),
        }
    );
    assert!(notes.references().is_empty());
    assert!(db.references().is_empty());
}

#[test]
fn nested_invalid_reference_is_rejected() {
    let db = db();
    let notes = db.model::<Note>("notes");
    let reference = Reference::new("authors", "authorId", "_id", "author")
        .with_nested([Reference::new("", "publisherId", "_id", "publisher")]);
    assert!(notes.add_references([reference]).is_err());
}

#[test]
fn reference_names_are_trimmed_on_declaration() {
    let db = db();
    let notes = db.model::<Note>("notes");
    notes
        .add_references([Reference::new(" authors", "authorId ", "_id", "author")])
        .unwrap();
    let reference = notes.reference("authorId").unwrap();
    assert_eq!(reference.source, "authors");
}

#[test]
fn clones_share_declared_references() {
    let db = db();
    let notes = db.model::<Note>("notes");
    let copy = notes.clone();
    notes
        .add_references([Reference::new("authors", "authorId", "_id", "author")])
        .unwrap();
    assert!(copy.is_valid_reference_key("authorId"));
}

#[test]
fn reference_universe_covers_nested_sources() {
    let db = db();
    let notes = db.model::<Note>("notes");
    db.collection("authors");
    notes
        .add_references([Reference::new("authors", "authorId", "_id", "author").with_nested([
            Reference::new("publishers", "publisherId", "_id", "publisher"),
        ])])
        .unwrap();

    assert_eq!(
        db.validate_reference_universe(),
        Err(ConfigError::MissingCollection("publishers".into()))
    );
    db.collection("publishers");
    db.assert_reference_universe();
}

#[test]
#[should_panic(expected = "collection not found: authors")]
fn unregistered_reference_source_is_fatal() {
    let db = db();
    let notes = db.model::<Note>("notes");
    notes
        .add_references([Reference::new("authors", "authorId", "_id", "author")])
        .unwrap();
    db.assert_reference_universe();
}
