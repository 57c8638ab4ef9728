use slate_store::StoreError;

/// Authoring mistakes in reference declarations or collection setup.
///
/// These are detected at registration/startup time and are not meant to be
/// recovered from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "invalid reference {alias:?} from collection {collection:?}: \
         source, local key, foreign key and alias must be non-empty"
    )]
    InvalidReference { alias: String, collection: String },

    #[error("collection not found: {0}")]
    MissingCollection(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PopulateError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("collection not registered: {0}")]
    UnknownCollection(String),

    #[error("population of {alias:?} from {collection:?} failed: {source}")]
    Branch {
        alias: String,
        collection: String,
        #[source]
        source: Box<PopulateError>,
    },

    #[error("decode error: {0}")]
    Decode(#[source] bson::error::Error),

    #[error("encode error: {0}")]
    Encode(#[source] bson::error::Error),

    #[error("invalid id: {0}")]
    InvalidId(String),
}

impl PopulateError {
    /// The store error at the bottom of a branch chain, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            PopulateError::Store(e) => Some(e),
            PopulateError::Branch { source, .. } => source.store_error(),
            _ => None,
        }
    }
}
