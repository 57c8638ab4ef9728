use serde::{Deserialize, Serialize};

use crate::projection::Projection;
use crate::sort::Sort;

/// Options applied to a find after filtering: sort, then skip, then limit,
/// then projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    #[serde(default)]
    pub projection: Option<Projection>,
    #[serde(default)]
    pub sort: Vec<Sort>,
    #[serde(default)]
    pub skip: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_sort(mut self, sort: Vec<Sort>) -> Self {
        self.sort = sort;
        self
    }
}
