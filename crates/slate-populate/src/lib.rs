mod collection;
mod config;
mod db;
mod error;
mod fields;
mod model;
mod query;
mod reference;
mod registry;
mod resolver;

pub use collection::Collection;
pub use config::{ErrorPolicy, PopulateConfig};
pub use db::Db;
pub use error::{ConfigError, PopulateError};
pub use fields::{FieldName, Record, field_member, field_wire_name};
pub use model::Model;
pub use query::Query;
pub use reference::{Cardinality, Reference};
pub use registry::CollectionRegistry;
pub use resolver::Resolver;

pub use slate_query::{FindOptions, Projection, Sort, SortDirection};
pub use slate_store::{Context, DeleteResult, Store, StoreError, UpdateResult};
