use bson::{Bson, Document};
use regex::Regex;

use crate::error::QueryError;
use crate::expression::Expression;

fn parse_error(msg: impl Into<String>) -> QueryError {
    QueryError::FilterParse(msg.into())
}

/// Parse a BSON filter document into an Expression tree.
///
/// Follows MongoDB query semantics:
/// - Top-level document is an implicit AND of all entries
/// - An empty document matches everything
/// - `{ "field": value }` is implicit `$eq`
/// - `{ "field": { "$gt": v } }` uses operator sub-documents
/// - `{ "field": { "$in": [..] } }` / `$nin` for set membership
/// - `{ "$or": [...] }` / `{ "$and": [...] }` for explicit logical ops
/// - `{ "field": { "$regex": "pattern", "$options": "i" } }` for regex
/// - `{ "field": { "$exists": true } }` for field existence checks
pub fn parse_filter(doc: &Document) -> Result<Expression, QueryError> {
    let mut children = Vec::with_capacity(doc.len());

    for (key, value) in doc {
        match key.as_str() {
            "$and" => children.push(parse_logical_array(value, Expression::And)?),
            "$or" => children.push(parse_logical_array(value, Expression::Or)?),
            k if k.starts_with('$') => {
                return Err(parse_error(format!("unknown top-level operator: {k}")));
            }
            _ => children.push(parse_field_condition(key, value)?),
        }
    }

    if children.len() == 1 {
        if let Some(only) = children.pop() {
            return Ok(only);
        }
    }
    Ok(Expression::And(children))
}

/// Parse a `$and` or `$or` array value into a logical expression.
fn parse_logical_array(
    value: &Bson,
    make: fn(Vec<Expression>) -> Expression,
) -> Result<Expression, QueryError> {
    let arr = match value {
        Bson::Array(a) => a,
        _ => return Err(parse_error("$and/$or value must be an array")),
    };

    if arr.is_empty() {
        return Err(parse_error("$and/$or array must not be empty"));
    }

    let children = arr
        .iter()
        .map(|elem| match elem {
            Bson::Document(sub_doc) => parse_filter(sub_doc),
            _ => Err(parse_error("$and/$or array elements must be documents")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(make(children))
}

/// Parse a field condition: either implicit $eq or an operator sub-document.
fn parse_field_condition(field: &str, value: &Bson) -> Result<Expression, QueryError> {
    if field.is_empty() || field.split('.').any(str::is_empty) {
        return Err(QueryError::InvalidPath(field.to_string()));
    }

    // A sub-document whose first key starts with $ is an operator doc
    if let Bson::Document(sub_doc) = value {
        if sub_doc.keys().next().is_some_and(|k| k.starts_with('$')) {
            return parse_operator_doc(field, sub_doc);
        }
    }

    Ok(Expression::Eq(field.to_string(), value.clone()))
}

/// Parse an operator sub-document like `{ "$gt": 21, "$lte": 100 }`.
fn parse_operator_doc(field: &str, doc: &Document) -> Result<Expression, QueryError> {
    if doc.contains_key("$regex") {
        return parse_regex(field, doc);
    }

    let mut conditions = Vec::with_capacity(doc.len());

    for (op_key, op_value) in doc {
        let field = field.to_string();
        let expr = match op_key.as_str() {
            "$eq" => Expression::Eq(field, op_value.clone()),
            "$ne" => Expression::Ne(field, op_value.clone()),
            "$gt" => Expression::Gt(field, op_value.clone()),
            "$gte" => Expression::Gte(field, op_value.clone()),
            "$lt" => Expression::Lt(field, op_value.clone()),
            "$lte" => Expression::Lte(field, op_value.clone()),
            "$in" => Expression::In(field, parse_set(op_key, op_value)?),
            "$nin" => Expression::Nin(field, parse_set(op_key, op_value)?),
            "$exists" => match op_value {
                Bson::Boolean(b) => Expression::Exists(field, *b),
                _ => return Err(parse_error("$exists value must be a boolean")),
            },
            "$options" => return Err(parse_error("$options without $regex")),
            k => return Err(parse_error(format!("unknown field operator: {k}"))),
        };
        conditions.push(expr);
    }

    match conditions.len() {
        0 => Err(parse_error("empty operator document")),
        1 => Ok(conditions.remove(0)),
        _ => Ok(Expression::And(conditions)),
    }
}

fn parse_set(op: &str, value: &Bson) -> Result<Vec<Bson>, QueryError> {
    match value {
        Bson::Array(values) => Ok(values.clone()),
        _ => Err(parse_error(format!("{op} value must be an array"))),
    }
}

/// Parse a `$regex` + optional `$options` sub-document.
fn parse_regex(field: &str, doc: &Document) -> Result<Expression, QueryError> {
    let mut pattern: Option<&str> = None;
    let mut options: Option<&str> = None;

    for (key, value) in doc {
        match key.as_str() {
            "$regex" => match value {
                Bson::String(s) => pattern = Some(s),
                _ => return Err(parse_error("$regex value must be a string")),
            },
            "$options" => match value {
                Bson::String(s) => options = Some(s),
                _ => return Err(parse_error("$options value must be a string")),
            },
            k => {
                return Err(parse_error(format!("unexpected key alongside $regex: {k}")));
            }
        }
    }

    let pat = pattern.ok_or_else(|| parse_error("missing $regex pattern"))?;

    let full_pattern = match options {
        Some(opts) => {
            let mut prefix = String::with_capacity(4 + opts.len() + pat.len());
            prefix.push_str("(?");
            for ch in opts.chars() {
                match ch {
                    'i' | 's' | 'm' | 'x' => prefix.push(ch),
                    c => return Err(parse_error(format!("unknown regex option: {c}"))),
                }
            }
            prefix.push(')');
            prefix.push_str(pat);
            prefix
        }
        None => pat.to_string(),
    };

    let re = Regex::new(&full_pattern)
        .map_err(|e| parse_error(format!("invalid regex pattern: {e}")))?;

    Ok(Expression::Regex(field.to_string(), re))
}
