use std::sync::Arc;

use bson::{Bson, Document};
use futures::FutureExt;
use futures::future::{BoxFuture, join_all, try_join_all};
use slate_query::value::{get_path, is_null, join_eq};
use slate_store::Context;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{ErrorPolicy, PopulateConfig};
use crate::error::PopulateError;
use crate::reference::{Cardinality, Reference};
use crate::registry::CollectionRegistry;

/// Rows of one resolution level, shared by every branch at that level.
type SharedRows<'a> = Mutex<&'a mut Vec<Document>>;

/// Resolves reference trees against rows already fetched from a store.
///
/// Each level runs one branch per reference concurrently. The branches of a
/// level share a single lock over that level's rows: it is held while
/// collecting keys and while merging, never across a fetch. A nested level
/// gets its own lock over the documents its parent branch fetched, and
/// completes before the parent merges them.
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: Arc<CollectionRegistry>,
    config: PopulateConfig,
}

impl Resolver {
    pub fn new(registry: Arc<CollectionRegistry>, config: PopulateConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &PopulateConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CollectionRegistry> {
        &self.registry
    }

    /// Populate `rows` in place with every reference in `references`.
    ///
    /// Under `ErrorPolicy::BestEffort` this only fails if nothing could be
    /// attempted; failed branches are logged and their rows left as they
    /// were. Under `ErrorPolicy::FailFast` the first branch error is
    /// returned and the remaining branches are dropped. Merges that already
    /// happened are kept either way.
    pub async fn resolve(
        &self,
        ctx: &Context,
        rows: &mut Vec<Document>,
        references: &[Reference],
    ) -> Result<(), PopulateError> {
        if rows.is_empty() || references.is_empty() {
            return Ok(());
        }
        self.resolve_level(ctx, rows, references).await
    }

    fn resolve_level<'a>(
        &'a self,
        ctx: &'a Context,
        rows: &'a mut Vec<Document>,
        references: &'a [Reference],
    ) -> BoxFuture<'a, Result<(), PopulateError>> {
        async move {
            let rows: SharedRows<'_> = Mutex::new(rows);
            let branches = references
                .iter()
                .map(|reference| self.resolve_branch(ctx, &rows, reference));

            match self.config.errors {
                ErrorPolicy::BestEffort => {
                    let results = join_all(branches).await;
                    for (reference, result) in references.iter().zip(results) {
                        if let Err(error) = result {
                            warn!(
                                collection = %reference.source,
                                alias = %reference.alias,
                                %error,
                                "population branch failed, leaving rows unpopulated"
                            );
                        }
                    }
                    Ok(())
                }
                ErrorPolicy::FailFast => try_join_all(branches).await.map(drop),
            }
        }
        .boxed()
    }

    async fn resolve_branch(
        &self,
        ctx: &Context,
        rows: &SharedRows<'_>,
        reference: &Reference,
    ) -> Result<(), PopulateError> {
        self.run_branch(ctx, rows, reference)
            .await
            .map_err(|source| PopulateError::Branch {
                alias: reference.alias.clone(),
                collection: reference.source.clone(),
                source: Box::new(source),
            })
    }

    async fn run_branch(
        &self,
        ctx: &Context,
        rows: &SharedRows<'_>,
        reference: &Reference,
    ) -> Result<(), PopulateError> {
        let keys = {
            let rows = rows.lock().await;
            collect_keys(&rows, &reference.local_key)
        };
        if keys.is_empty() {
            debug!(collection = %reference.source, alias = %reference.alias, "no join keys, skipping fetch");
            return Ok(());
        }
        let key_count = keys.len();

        let collection = self
            .registry
            .lookup(&reference.source)
            .ok_or_else(|| PopulateError::UnknownCollection(reference.source.clone()))?;

        let filter = reference.fetch_filter(keys);
        let options = reference.fetch_options(self.config.stable_order);
        let mut foreign = match self.config.fetch_timeout() {
            Some(timeout) => {
                collection
                    .find(&ctx.with_timeout(timeout), &filter, &options)
                    .await?
            }
            None => collection.find(ctx, &filter, &options).await?,
        };

        if !reference.nested.is_empty() && !foreign.is_empty() {
            self.resolve_level(ctx, &mut foreign, &reference.nested).await?;
        }

        let mut rows = rows.lock().await;
        let merged = merge(&mut rows, reference, &foreign);
        debug!(
            collection = %reference.source,
            alias = %reference.alias,
            keys = key_count,
            fetched = foreign.len(),
            merged,
            "population branch merged"
        );
        Ok(())
    }
}

/// Non-null values at `local_key`, in row order. Duplicates are kept; the
/// fetch is a set-membership query.
fn collect_keys(rows: &[Document], local_key: &str) -> Vec<Bson> {
    rows.iter()
        .filter_map(|row| get_path(row, local_key))
        .filter(|value| !is_null(value))
        .cloned()
        .collect()
}

/// Foreign documents grouped by their `foreign_key` value, in fetch order.
fn bucket_by_key<'a>(foreign: &'a [Document], foreign_key: &str) -> Vec<(&'a Bson, Vec<&'a Document>)> {
    let mut buckets: Vec<(&Bson, Vec<&Document>)> = Vec::new();
    for doc in foreign {
        let Some(key) = get_path(doc, foreign_key).filter(|v| !is_null(v)) else {
            continue;
        };
        match buckets.iter_mut().find(|(existing, _)| join_eq(existing, key)) {
            Some((_, docs)) => docs.push(doc),
            None => buckets.push((key, vec![doc])),
        }
    }
    buckets
}

/// Write matches under `reference.alias`. Returns how many rows changed.
fn merge(rows: &mut [Document], reference: &Reference, foreign: &[Document]) -> usize {
    let buckets = bucket_by_key(foreign, &reference.foreign_key);
    let mut merged = 0;

    for row in rows.iter_mut() {
        let Some(local) = get_path(row, &reference.local_key).filter(|v| !is_null(v)) else {
            continue;
        };
        let Some((_, matches)) = buckets.iter().find(|(key, _)| join_eq(key, local)) else {
            continue;
        };

        let value = match reference.cardinality {
            Cardinality::Single => Bson::Document(matches[0].clone()),
            Cardinality::Many => Bson::Array(
                matches
                    .iter()
                    .map(|doc| Bson::Document((*doc).clone()))
                    .collect(),
            ),
        };
        row.insert(reference.alias.clone(), value);
        merged += 1;
    }
    merged
}
