use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::expression::Expression;
use crate::value::{compare_values, get_path, is_null, join_eq};

/// Evaluate whether a document matches the given expression.
pub fn matches(doc: &Document, expr: &Expression) -> bool {
    match expr {
        Expression::And(children) => children.iter().all(|child| matches(doc, child)),
        Expression::Or(children) => children.iter().any(|child| matches(doc, child)),
        Expression::Eq(field, val) => field_eq(get_path(doc, field), val),
        Expression::Ne(field, val) => !field_eq(get_path(doc, field), val),
        Expression::In(field, values) => {
            let stored = get_path(doc, field);
            values.iter().any(|val| field_eq(stored, val))
        }
        Expression::Nin(field, values) => {
            let stored = get_path(doc, field);
            !values.iter().any(|val| field_eq(stored, val))
        }
        Expression::Gt(field, val)
        | Expression::Gte(field, val)
        | Expression::Lt(field, val)
        | Expression::Lte(field, val) => {
            let predicate: fn(Ordering) -> bool = match expr {
                Expression::Gt(..) => |o| o == Ordering::Greater,
                Expression::Gte(..) => |o| o != Ordering::Less,
                Expression::Lt(..) => |o| o == Ordering::Less,
                _ => |o| o != Ordering::Greater,
            };
            match get_path(doc, field) {
                Some(Bson::Array(arr)) => arr.iter().any(|elem| value_cmp(elem, val, predicate)),
                Some(stored) => value_cmp(stored, val, predicate),
                None => false,
            }
        }
        Expression::Regex(field, re) => match get_path(doc, field) {
            Some(Bson::String(s)) => re.is_match(s),
            Some(Bson::Array(arr)) => arr
                .iter()
                .any(|elem| matches!(elem, Bson::String(s) if re.is_match(s))),
            _ => false,
        },
        // $exists checks physical presence; a null value still exists
        Expression::Exists(field, expected) => *expected == get_path(doc, field).is_some(),
    }
}

/// `$eq` semantics: null matches missing and explicit null; an array field
/// matches when any element (or the whole array) is equal.
fn field_eq(stored: Option<&Bson>, query_val: &Bson) -> bool {
    if is_null(query_val) {
        return stored.is_none_or(is_null);
    }
    match stored {
        Some(whole @ Bson::Array(arr)) => {
            arr.iter().any(|elem| join_eq(elem, query_val)) || join_eq(whole, query_val)
        }
        Some(v) => join_eq(v, query_val),
        None => false,
    }
}

/// Range comparisons only apply between values of the same canonical type
/// class; anything else silently excludes the document.
fn value_cmp(stored: &Bson, query_val: &Bson, predicate: fn(Ordering) -> bool) -> bool {
    let comparable = matches!(
        (stored, query_val),
        (
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_),
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)
        ) | (Bson::String(_), Bson::String(_))
            | (Bson::DateTime(_), Bson::DateTime(_))
            | (Bson::ObjectId(_), Bson::ObjectId(_))
            | (Bson::Boolean(_), Bson::Boolean(_))
    );
    comparable && predicate(compare_values(Some(stored), Some(query_val)))
}
