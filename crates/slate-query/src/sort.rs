use std::cmp::Ordering;

use bson::Document;
use serde::{Deserialize, Serialize};

use crate::value::{compare_values, get_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Stable multi-key sort. Documents that tie on every key keep their
/// relative order.
pub fn sort_documents(docs: &mut [Document], sorts: &[Sort]) {
    if sorts.is_empty() {
        return;
    }

    docs.sort_by(|a, b| {
        for sort in sorts {
            let ord = compare_values(get_path(a, &sort.field), get_path(b, &sort.field));
            let ord = match sort.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn sorts_by_multiple_keys() {
        let mut docs = vec![
            doc! { "_id": 1_i32, "status": "b", "score": 2_i32 },
            doc! { "_id": 2_i32, "status": "a", "score": 1_i32 },
            doc! { "_id": 3_i32, "status": "b", "score": 9_i32 },
        ];
        sort_documents(&mut docs, &[Sort::asc("status"), Sort::desc("score")]);
        let ids: Vec<i32> = docs.iter().map(|d| d.get_i32("_id").unwrap()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn missing_field_sorts_first_ascending() {
        let mut docs = vec![doc! { "_id": 1_i32, "n": 5_i32 }, doc! { "_id": 2_i32 }];
        sort_documents(&mut docs, &[Sort::asc("n")]);
        assert_eq!(docs[0].get_i32("_id").unwrap(), 2);
    }
}
