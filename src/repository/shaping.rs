//! Client-side result shaping
//!
//! The query language supports neither ORDER BY nor LIMIT, so ordering and
//! pagination run in-process over the full materialized result set. Sorting
//! is single-key and case-insensitive for strings; pagination is a plain
//! slice. Unsuitable for large tables.

use std::cmp::Ordering;

use crate::query::{OrderSpec, SortDirection};

/// Sorts and paginates results in place of the missing server-side support
pub fn shape_results(
    mut rows: Vec<serde_json::Value>,
    order: Option<&OrderSpec>,
    offset: Option<usize>,
    limit: Option<usize>,
) -> Vec<serde_json::Value> {
    if let Some(spec) = order {
        rows.sort_by(|a, b| {
            let ordering = compare_values(a.get(&spec.field), b.get(&spec.field));
            match spec.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }

    if offset.is_none() && limit.is_none() {
        return rows;
    }
    let start = offset.unwrap_or(0).min(rows.len());
    rows.into_iter()
        .skip(start)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Compares two JSON values for sorting.
///
/// Absent sorts before present; mixed types order by type class; strings
/// compare case-insensitively.
fn compare_values(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> Ordering {
    use serde_json::Value;

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a_val), Some(b_val)) => {
            let type_order = |v: &Value| -> u8 {
                match v {
                    Value::Null => 0,
                    Value::Bool(_) => 1,
                    Value::Number(_) => 2,
                    Value::String(_) => 3,
                    Value::Array(_) => 4,
                    Value::Object(_) => 5,
                }
            };

            let a_type = type_order(a_val);
            let b_type = type_order(b_val);
            if a_type != b_type {
                return a_type.cmp(&b_type);
            }

            match (a_val, b_val) {
                (Value::Bool(a_b), Value::Bool(b_b)) => a_b.cmp(b_b),
                (Value::Number(a_n), Value::Number(b_n)) => {
                    let a_f = a_n.as_f64().unwrap_or(0.0);
                    let b_f = b_n.as_f64().unwrap_or(0.0);
                    a_f.partial_cmp(&b_f).unwrap_or(Ordering::Equal)
                }
                (Value::String(a_s), Value::String(b_s)) => {
                    a_s.to_uppercase().cmp(&b_s.to_uppercase())
                }
                _ => Ordering::Equal,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> Vec<serde_json::Value> {
        vec![
            json!({"name": "charlie", "age": 30}),
            json!({"name": "Alice", "age": 20}),
            json!({"name": "bob", "age": 25}),
        ]
    }

    #[test]
    fn test_sort_is_case_insensitive() {
        let sorted = shape_results(people(), Some(&OrderSpec::asc("name")), None, None);
        let names: Vec<&str> = sorted.iter().map(|p| p["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Alice", "bob", "charlie"]);
    }

    #[test]
    fn test_sort_descending() {
        let sorted = shape_results(people(), Some(&OrderSpec::desc("age")), None, None);
        let ages: Vec<i64> = sorted.iter().map(|p| p["age"].as_i64().unwrap()).collect();
        assert_eq!(ages, vec![30, 25, 20]);
    }

    #[test]
    fn test_pagination_slices_after_sort() {
        let page = shape_results(people(), Some(&OrderSpec::asc("age")), Some(1), Some(1));
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["age"], json!(25));
    }

    #[test]
    fn test_offset_beyond_end_is_empty() {
        let page = shape_results(people(), None, Some(10), Some(5));
        assert!(page.is_empty());
    }

    #[test]
    fn test_limit_without_offset() {
        let page = shape_results(people(), None, None, Some(2));
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn test_no_shaping_passthrough() {
        let rows = people();
        let shaped = shape_results(rows.clone(), None, None, None);
        assert_eq!(shaped, rows);
    }

    #[test]
    fn test_missing_sort_key_sorts_first() {
        let rows = vec![json!({"name": "b"}), json!({})];
        let sorted = shape_results(rows, Some(&OrderSpec::asc("name")), None, None);
        assert_eq!(sorted[0], json!({}));
    }
}
