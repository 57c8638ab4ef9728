use bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};
use slate_query::{FindOptions, Projection, Sort};

/// Whether a reference attaches one document or every matching document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    Single,
    Many,
}

/// One cross-collection link: rows whose `local_key` equals a document's
/// `foreign_key` in `source` get that document (or all of them, for
/// `Many`) written under `alias`.
///
/// `nested` references are resolved against the documents this reference
/// fetches, before they are merged into the parent rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub source: String,
    pub local_key: String,
    pub foreign_key: String,
    pub alias: String,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub nested: Vec<Reference>,
    #[serde(default)]
    pub filter: Option<Document>,
    #[serde(default)]
    pub projection: Option<Projection>,
    #[serde(default)]
    pub sort: Vec<Sort>,
}

impl Reference {
    pub fn new(
        source: impl Into<String>,
        local_key: impl Into<String>,
        foreign_key: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            local_key: local_key.into(),
            foreign_key: foreign_key.into(),
            alias: alias.into(),
            ..Default::default()
        }
    }

    pub fn many(mut self) -> Self {
        self.cardinality = Cardinality::Many;
        self
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn with_nested(mut self, nested: impl IntoIterator<Item = Reference>) -> Self {
        self.nested.extend(nested);
        self
    }

    pub fn with_filter(mut self, filter: Document) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    /// Restrict the fields fetched from `source`. Tokens accumulate like
    /// `Projection::select`.
    pub fn select<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut projection = self.projection.take().unwrap_or_default();
        projection.select(tokens);
        self.projection = (!projection.is_empty()).then_some(projection);
        self
    }

    /// Trim the required names and check that none is empty, here and in
    /// every nested reference. Stops at the first invalid node.
    pub fn validate(&mut self) -> bool {
        for name in [
            &mut self.source,
            &mut self.local_key,
            &mut self.foreign_key,
            &mut self.alias,
        ] {
            let trimmed = name.trim();
            if trimmed.len() != name.len() {
                *name = trimmed.to_string();
            }
            if name.is_empty() {
                return false;
            }
        }
        self.nested.iter_mut().all(Reference::validate)
    }

    /// Every collection this reference reaches, depth-first, starting with
    /// its own source.
    pub fn sources(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_sources(&mut out);
        out
    }

    fn collect_sources<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.push(&self.source);
        for nested in &self.nested {
            nested.collect_sources(out);
        }
    }

    /// `{ foreign_key: { $in: keys } }`, AND-ed with the reference's own
    /// filter.
    pub(crate) fn fetch_filter(&self, keys: Vec<Bson>) -> Document {
        let mut membership = Document::new();
        membership.insert(self.foreign_key.clone(), doc! { "$in": keys });
        match &self.filter {
            Some(extra) if !extra.is_empty() => doc! { "$and": [membership, extra.clone()] },
            _ => membership,
        }
    }

    /// Options for the population fetch.
    ///
    /// An inclusion projection is widened to keep the foreign key (needed to
    /// merge) and the local key of every nested reference (needed to
    /// resolve them).
    pub(crate) fn fetch_options(&self, stable_order: bool) -> FindOptions {
        let projection = self.projection.as_ref().filter(|p| !p.is_empty()).map(|p| {
            let mut projection = p.clone();
            if projection.is_inclusive() {
                projection.include(&self.foreign_key);
                for nested in &self.nested {
                    projection.include(&nested.local_key);
                }
            }
            projection
        });

        let sort = if self.sort.is_empty() && stable_order {
            vec![Sort::asc("_id")]
        } else {
            self.sort.clone()
        };

        FindOptions {
            projection,
            sort,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authors() -> Reference {
        Reference::new("authors", "authorId", "id", "author")
    }

    #[test]
    fn validate_accepts_complete_reference() {
        assert!(authors().validate());
    }

    #[test]
    fn validate_trims_names() {
        let mut reference = Reference::new(" authors ", "authorId\t", " id", "author ");
        assert!(reference.validate());
        assert_eq!(reference.source, "authors");
        assert_eq!(reference.local_key, "authorId");
        assert_eq!(reference.foreign_key, "id");
        assert_eq!(reference.alias, "author");
    }

    #[test]
    fn validate_rejects_blank_required_field() {
        for mut reference in [
            Reference::new("", "authorId", "id", "author"),
            Reference::new("authors", "  ", "id", "author"),
            Reference::new("authors", "authorId", "", "author"),
            Reference::new("authors", "authorId", "id", " "),
        ] {
            assert!(!reference.validate(), "{reference:?}");
        }
    }

    #[test]
    fn validate_recurses_into_nested() {
        let mut reference = authors().with_nested([
            Reference::new("publishers", "publisherId", "id", "publisher"),
            Reference::new("countries", "countryId", "id", "")
                .with_nested([Reference::new("regions", "regionId", "id", "region")]),
        ]);
        assert!(!reference.validate());

        let mut reference = authors().with_nested([Reference::new(
            "publishers",
            "publisherId",
            "id",
            "publisher",
        )
        .with_nested([Reference::new("countries", " countryId ", "id", "country")])]);
        assert!(reference.validate());
        assert_eq!(reference.nested[0].nested[0].local_key, "countryId");
    }

    #[test]
    fn sources_are_depth_first() {
        let reference = authors().with_nested([
            Reference::new("publishers", "publisherId", "id", "publisher")
                .with_nested([Reference::new("countries", "countryId", "id", "country")]),
            Reference::new("awards", "id", "authorId", "awards").many(),
        ]);
        assert_eq!(
            reference.sources(),
            vec!["authors", "publishers", "countries", "awards"]
        );
    }

    #[test]
    fn fetch_filter_combines_extra_filter() {
        let keys = vec![Bson::Int32(10), Bson::Int32(11)];
        assert_eq!(
            authors().fetch_filter(keys.clone()),
            doc! { "id": { "$in": [10_i32, 11_i32] } }
        );

        let filtered = authors().with_filter(doc! { "active": true });
        assert_eq!(
            filtered.fetch_filter(keys),
            doc! { "$and": [{ "id": { "$in": [10_i32, 11_i32] } }, { "active": true }] }
        );
    }

    #[test]
    fn fetch_options_widen_inclusion_projection() {
        let reference = authors()
            .select(["name"])
            .with_nested([Reference::new("publishers", "publisherId", "id", "publisher")]);
        let options = reference.fetch_options(true);
        let projection = options.projection.unwrap();
        assert_eq!(projection.get("name"), Some(true));
        assert_eq!(projection.get("id"), Some(true));
        assert_eq!(projection.get("publisherId"), Some(true));
        assert_eq!(options.sort, vec![Sort::asc("_id")]);
    }

    #[test]
    fn fetch_options_leave_exclusion_projection_alone() {
        let reference = authors().select(["-bio"]);
        let options = reference.fetch_options(false);
        let projection = options.projection.unwrap();
        assert_eq!(projection.len(), 1);
        assert!(options.sort.is_empty());
    }

    #[test]
    fn explicit_sort_wins_over_stable_order() {
        let reference = authors().with_sort(Sort::desc("name"));
        assert_eq!(reference.fetch_options(true).sort, vec![Sort::desc("name")]);
    }

    #[test]
    fn empty_select_leaves_no_projection() {
        assert!(authors().select([""]).projection.is_none());
    }
}
