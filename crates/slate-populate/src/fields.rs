use serde::Serialize;
use serde::de::DeserializeOwned;

/// Naming of one member of a record type.
///
/// `rename` is the name the member is serialized under (`#[serde(rename)]`),
/// `alias` an alternate name accepted for it (`#[serde(alias)]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldName {
    pub member: &'static str,
    pub rename: Option<&'static str>,
    pub alias: Option<&'static str>,
}

impl FieldName {
    pub const fn new(member: &'static str) -> Self {
        Self {
            member,
            rename: None,
            alias: None,
        }
    }

    pub const fn rename(mut self, name: &'static str) -> Self {
        self.rename = Some(name);
        self
    }

    pub const fn alias(mut self, name: &'static str) -> Self {
        self.alias = Some(name);
        self
    }

    /// The name stored in documents.
    pub fn wire(&self) -> &'static str {
        self.rename.unwrap_or(self.member)
    }
}

/// A typed record stored in a collection.
///
/// `FIELDS` is an explicit naming table so the query builder can accept a
/// member name, a serialized name or an alias wherever it takes a field.
/// Leaving it empty passes field names through untouched.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const FIELDS: &'static [FieldName] = &[];
}

fn find_field<'a>(fields: &'a [FieldName], name: &str) -> Option<&'a FieldName> {
    fields
        .iter()
        .find(|f| f.rename == Some(name))
        .or_else(|| fields.iter().find(|f| f.alias == Some(name)))
        .or_else(|| fields.iter().find(|f| f.member == name))
}

/// The member matching `name`, checked against serialized names first,
/// then aliases, then member names.
pub fn field_member(fields: &[FieldName], name: &str) -> Option<&'static str> {
    find_field(fields, name).map(|f| f.member)
}

/// The stored name of the member matching `name`, with the same lookup
/// order as [`field_member`].
pub fn field_wire_name(fields: &[FieldName], name: &str) -> Option<&'static str> {
    find_field(fields, name).map(FieldName::wire)
}
