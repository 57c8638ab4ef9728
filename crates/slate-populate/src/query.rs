use bson::Document;
use slate_query::{FindOptions, Projection, Sort, SortDirection};
use slate_store::Context;
use tracing::{debug, warn};

use crate::error::PopulateError;
use crate::fields::{Record, field_wire_name};
use crate::model::Model;
use crate::reference::Reference;

/// A find against a model's collection, with the populations to resolve on
/// its results.
///
/// Field names given to `sort`, `select` and `populate` may be member names,
/// serialized names or aliases from `T::FIELDS`; they are sent as
/// serialized names.
#[derive(Debug)]
pub struct Query<'m, T> {
    model: &'m Model<T>,
    filter: Document,
    options: FindOptions,
    references: Vec<Reference>,
}

impl<'m, T: Record> Query<'m, T> {
    pub(crate) fn new(model: &'m Model<T>, filter: Document) -> Self {
        Self {
            model,
            filter,
            options: FindOptions::default(),
            references: Vec::new(),
        }
    }

    pub fn sort(mut self, field: &str, direction: SortDirection) -> Self {
        self.options.sort.push(Sort {
            field: wire_name::<T>(field),
            direction,
        });
        self
    }

    /// Restrict returned fields. Tokens accumulate across calls; see
    /// `Projection::select`. No tokens, or a blank first token, leave the
    /// query unchanged.
    pub fn select<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens: Vec<String> = tokens
            .into_iter()
            .map(|token| translate_token::<T>(token.as_ref()))
            .collect();
        if tokens.first().is_none_or(|first| first.is_empty()) {
            return self;
        }
        self.options
            .projection
            .get_or_insert_with(Projection::new)
            .select(&tokens);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.options.skip = Some(skip);
        self
    }

    /// Populate the model's declared reference for `key`, fetching only the
    /// fields in `select` (empty for all fields).
    ///
    /// Unknown keys and keys already attached to this query are logged and
    /// ignored.
    pub fn populate(mut self, key: &str, select: &str) -> Self {
        let key = wire_name::<T>(key);
        let Some(reference) = self.model.reference(&key) else {
            warn!(collection = %self.model.collection().name(), key = %key, "populate key not declared on model, ignoring");
            return self;
        };
        if self.is_populate_added(&key) {
            warn!(collection = %self.model.collection().name(), key = %key, "populate key already added, ignoring");
            return self;
        }
        self.references.push(reference.select([select]));
        self
    }

    /// Attach references built at query time, with their own filter,
    /// projection, sort and nested references.
    ///
    /// Each must be valid and keyed on a local key the model declares, and
    /// not already attached. Rejected references are logged and skipped.
    pub fn populate_with(mut self, references: impl IntoIterator<Item = Reference>) -> Self {
        for mut reference in references {
            if !reference.validate() {
                warn!(collection = %self.model.collection().name(), alias = %reference.alias, "invalid populate reference, ignoring");
                continue;
            }
            if !self.model.is_valid_reference_key(&reference.local_key) {
                warn!(collection = %self.model.collection().name(), key = %reference.local_key, "populate key not declared on model, ignoring");
                continue;
            }
            if self.is_populate_added(&reference.local_key) {
                warn!(collection = %self.model.collection().name(), key = %reference.local_key, "populate key already added, ignoring");
                continue;
            }
            self.references.push(reference);
        }
        self
    }

    pub fn is_populate_added(&self, key: &str) -> bool {
        self.references.iter().any(|r| r.local_key == key)
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// The projection as selected by the caller.
    pub fn projection(&self) -> Option<&Projection> {
        self.options.projection.as_ref()
    }

    /// The options the base fetch runs with: the caller's, with every
    /// attached reference's local key added to an inclusion projection so
    /// the join keys survive it.
    pub fn fetch_options(&self) -> FindOptions {
        let mut options = self.options.clone();
        if let Some(projection) = options.projection.as_mut() {
            if !self.references.is_empty() && projection.is_inclusive() {
                for reference in &self.references {
                    projection.include(&reference.local_key);
                }
            }
        }
        options
    }

    /// Run the query and populate the results, without decoding.
    pub async fn find_raw(&self, ctx: &Context) -> Result<Vec<Document>, PopulateError> {
        let mut rows = self
            .model
            .collection()
            .find(ctx, &self.filter, &self.fetch_options())
            .await?;
        debug!(collection = %self.model.collection().name(), rows = rows.len(), populations = self.references.len(), "query fetched");
        self.model
            .db()
            .resolver()
            .resolve(ctx, &mut rows, &self.references)
            .await?;
        Ok(rows)
    }

    pub async fn find(&self, ctx: &Context) -> Result<Vec<T>, PopulateError> {
        self.find_raw(ctx).await?.into_iter().map(decode).collect()
    }

    /// First row under the query's sort, populated, without decoding. Skip
    /// and limit do not apply.
    pub async fn find_one_raw(&self, ctx: &Context) -> Result<Option<Document>, PopulateError> {
        let Some(row) = self
            .model
            .collection()
            .find_one(ctx, &self.filter, &self.fetch_options())
            .await?
        else {
            return Ok(None);
        };
        let mut rows = vec![row];
        self.model
            .db()
            .resolver()
            .resolve(ctx, &mut rows, &self.references)
            .await?;
        Ok(rows.pop())
    }

    pub async fn find_one(&self, ctx: &Context) -> Result<Option<T>, PopulateError> {
        self.find_one_raw(ctx).await?.map(decode).transpose()
    }
}

fn decode<T: Record>(doc: Document) -> Result<T, PopulateError> {
    bson::deserialize_from_document(doc).map_err(PopulateError::Decode)
}

fn wire_name<T: Record>(name: &str) -> String {
    field_wire_name(T::FIELDS, name).unwrap_or(name).to_string()
}

/// Translate every field of a selection token, keeping exclusion markers.
fn translate_token<T: Record>(token: &str) -> String {
    token
        .split_whitespace()
        .map(|field| match field.strip_prefix('-') {
            Some(excluded) if !excluded.is_empty() => format!("-{}", wire_name::<T>(excluded)),
            _ => wire_name::<T>(field),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
