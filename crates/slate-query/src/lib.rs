mod error;
mod eval;
mod expression;
mod parse_filter;
mod projection;
mod query;
mod sort;
pub mod value;

pub use error::QueryError;
pub use eval::matches;
pub use expression::Expression;
pub use parse_filter::parse_filter;
pub use projection::Projection;
pub use query::FindOptions;
pub use sort::{Sort, SortDirection, sort_documents};
