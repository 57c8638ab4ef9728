use std::collections::HashMap;

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// A field mask for a fetch: `{ "field": 1 }` includes, `{ "field": 0 }`
/// excludes.
///
/// Built from selection tokens such as `"title -body author.name"`. Each
/// token may carry several space-separated field names; a leading `-`
/// marks an exclusion. Selecting accumulates into the same mask, so chained
/// `select` calls build one projection. Mixing inclusion and exclusion is
/// allowed here; it is rejected when the mask is applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Projection(Document);

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh mask from selection tokens.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut projection = Self::new();
        projection.select(tokens);
        projection
    }

    /// Merge selection tokens into this mask. The last mention of a field
    /// wins.
    pub fn select<I, S>(&mut self, tokens: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for token in tokens {
            for field in token.as_ref().split_whitespace() {
                match field.strip_prefix('-') {
                    Some("") => {}
                    Some(excluded) => self.exclude(excluded),
                    None => self.include(field),
                }
            }
        }
        self
    }

    pub fn include(&mut self, field: &str) {
        self.0.insert(field, 1_i32);
    }

    pub fn exclude(&mut self, field: &str) {
        self.0.insert(field, 0_i32);
    }

    /// `Some(true)` when the field is included, `Some(false)` when excluded.
    pub fn get(&self, field: &str) -> Option<bool> {
        self.0.get(field).map(flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when at least one field is included.
    pub fn is_inclusive(&self) -> bool {
        self.0.values().any(flag)
    }

    /// True when the mask is non-empty and every field is excluded.
    pub fn is_exclusive(&self) -> bool {
        !self.0.is_empty() && !self.is_inclusive()
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }

    /// Apply the mask to a document.
    ///
    /// `_id` is kept unless explicitly excluded and may be excluded from an
    /// inclusion mask. Any other mix of inclusion and exclusion is an error.
    pub fn apply(&self, doc: &Document) -> Result<Document, QueryError> {
        if self.0.is_empty() {
            return Ok(doc.clone());
        }

        let mut included = Vec::new();
        let mut excluded = Vec::new();
        let mut keep_id = true;
        for (field, value) in &self.0 {
            if field.is_empty() || field.split('.').any(str::is_empty) {
                return Err(QueryError::InvalidPath(field.clone()));
            }
            match (field.as_str(), flag(value)) {
                ("_id", on) => keep_id = on,
                (_, true) => included.push(field.as_str()),
                (_, false) => excluded.push(field.as_str()),
            }
        }

        if !included.is_empty() && !excluded.is_empty() {
            return Err(QueryError::MixedProjection);
        }

        if !included.is_empty() || (excluded.is_empty() && self.0.get("_id").is_some_and(flag)) {
            let tree = FieldTree::from_paths(&included);
            let mut out = Document::new();
            for (key, value) in doc {
                if key == "_id" {
                    if keep_id {
                        out.insert(key, value.clone());
                    }
                    continue;
                }
                if let Some(node) = tree.get(key.as_str()) {
                    out.insert(key, include_value(value, node));
                }
            }
            Ok(out)
        } else {
            if !keep_id {
                excluded.push("_id");
            }
            let tree = FieldTree::from_paths(&excluded);
            Ok(exclude_document(doc, &tree))
        }
    }
}

fn flag(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(v) => *v != 0,
        Bson::Int64(v) => *v != 0,
        Bson::Double(v) => *v != 0.0,
        _ => true,
    }
}

/// Dot-notation paths folded into a tree, built once per `apply`.
#[derive(Debug)]
enum FieldTree {
    Leaf,
    Branch(HashMap<String, FieldTree>),
}

impl FieldTree {
    fn from_paths(paths: &[&str]) -> HashMap<String, FieldTree> {
        let mut root = HashMap::new();
        for path in paths {
            insert_path(&mut root, path);
        }
        root
    }
}

fn insert_path(tree: &mut HashMap<String, FieldTree>, path: &str) {
    match path.split_once('.') {
        None => {
            // A whole-field entry subsumes any sub-paths
            tree.insert(path.to_string(), FieldTree::Leaf);
        }
        Some((head, rest)) => {
            let node = tree
                .entry(head.to_string())
                .or_insert_with(|| FieldTree::Branch(HashMap::new()));
            if let FieldTree::Branch(children) = node {
                insert_path(children, rest);
            }
        }
    }
}

fn include_value(value: &Bson, node: &FieldTree) -> Bson {
    let children = match node {
        FieldTree::Leaf => return value.clone(),
        FieldTree::Branch(children) => children,
    };
    match value {
        Bson::Document(sub) => Bson::Document(include_document(sub, children)),
        Bson::Array(arr) => Bson::Array(
            arr.iter()
                .map(|elem| match elem {
                    Bson::Document(sub) => Bson::Document(include_document(sub, children)),
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

fn include_document(doc: &Document, tree: &HashMap<String, FieldTree>) -> Document {
    let mut out = Document::new();
    for (key, value) in doc {
        if let Some(node) = tree.get(key.as_str()) {
            out.insert(key, include_value(value, node));
        }
    }
    out
}

fn exclude_document(doc: &Document, tree: &HashMap<String, FieldTree>) -> Document {
    let mut out = Document::new();
    for (key, value) in doc {
        match tree.get(key.as_str()) {
            Some(FieldTree::Leaf) => {}
            Some(FieldTree::Branch(children)) => {
                let trimmed = match value {
                    Bson::Document(sub) => Bson::Document(exclude_document(sub, children)),
                    Bson::Array(arr) => Bson::Array(
                        arr.iter()
                            .map(|elem| match elem {
                                Bson::Document(sub) => {
                                    Bson::Document(exclude_document(sub, children))
                                }
                                other => other.clone(),
                            })
                            .collect(),
                    ),
                    other => other.clone(),
                };
                out.insert(key, trimmed);
            }
            None => {
                out.insert(key, value.clone());
            }
        }
    }
    out
}
