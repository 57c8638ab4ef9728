use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    FilterParse(String),
    MixedProjection,
    InvalidPath(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::FilterParse(msg) => write!(f, "filter parse error: {msg}"),
            QueryError::MixedProjection => {
                write!(f, "projection cannot mix inclusion and exclusion")
            }
            QueryError::InvalidPath(path) => write!(f, "invalid field path: {path:?}"),
        }
    }
}

impl std::error::Error for QueryError {}
