mod context;
mod error;
mod store;

pub use context::Context;
pub use error::StoreError;
pub use store::{DeleteResult, Store, UpdateResult};

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;
