//! Document representation and field-level helpers
//!
//! A document is a JSON object with a string `id` field holding a v7 UUID
//! (time-ordered, so id order is insertion order) and an internal `rev`
//! counter the store bumps on every write. `rev` is the metadata field the
//! default projection strips.

use std::cmp::Ordering;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::query::{FilterCondition, FilterOperator, FilterValue, Projection, SortKey, SortOrder};

/// A stored record: field name → value
pub type Document = Map<String, Value>;

/// Identifier field present on every document
pub const ID_FIELD: &str = "id";

/// Internal revision counter, deny-listed from default projections
pub const REV_FIELD: &str = "rev";

/// Mint a fresh, time-ordered document id
pub fn new_document_id() -> Uuid {
    Uuid::now_v7()
}

/// Read a document's id, if present and well-formed
pub fn document_id(doc: &Document) -> Option<Uuid> {
    doc.get(ID_FIELD)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Evaluate a single constraint against a document.
///
/// Constraint values that arrived as raw query strings are coerced against
/// the stored field's type here: numbers parse, booleans parse, everything
/// else compares as text. A missing field satisfies `Ne` (there is nothing
/// equal to the value) and nothing else.
pub fn condition_matches(condition: &FilterCondition, doc: &Document) -> bool {
    let ordering = compare(doc.get(&condition.field), &condition.value);
    match condition.operator {
        FilterOperator::Eq => ordering == Some(Ordering::Equal),
        FilterOperator::Ne => ordering != Some(Ordering::Equal),
        FilterOperator::Gt => ordering == Some(Ordering::Greater),
        FilterOperator::Gte => {
            matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
        }
        FilterOperator::Lt => ordering == Some(Ordering::Less),
        FilterOperator::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
    }
}

/// Compare a stored field value against a constraint value, coercing the
/// constraint where the field's type calls for it.
fn compare(field: Option<&Value>, constraint: &FilterValue) -> Option<Ordering> {
    let field = match field {
        None | Some(Value::Null) => {
            return matches!(constraint, FilterValue::Null).then_some(Ordering::Equal);
        }
        Some(v) => v,
    };

    match (field, constraint) {
        (Value::Number(n), c) => {
            let lhs = n.as_f64()?;
            let rhs = constraint_as_f64(c)?;
            lhs.partial_cmp(&rhs)
        }
        (Value::String(s), FilterValue::String(c)) => Some(s.as_str().cmp(c.as_str())),
        (Value::Bool(b), c) => {
            let rhs = match c {
                FilterValue::Boolean(v) => *v,
                FilterValue::String(s) => s.parse::<bool>().ok()?,
                _ => return None,
            };
            Some(b.cmp(&rhs))
        }
        _ => None,
    }
}

fn constraint_as_f64(value: &FilterValue) -> Option<f64> {
    match value {
        FilterValue::Integer(n) => Some(*n as f64),
        FilterValue::Float(n) => Some(*n),
        FilterValue::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

/// Total order over stored values, used by composite sorts.
///
/// Null sorts first, then booleans, numbers, strings, arrays, objects.
pub fn value_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Sort documents by a composite key list, primary key first.
///
/// The underlying sort is stable, so ties keep natural (insertion) order.
pub fn sort_documents(docs: &mut [Document], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for key in keys {
            let ordering = value_order(a.get(&key.field), b.get(&key.field));
            let ordering = match key.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Apply a projection to a document.
///
/// The allow-list keeps exactly the named fields plus the identifier; the
/// default deny-list strips the internal revision field.
pub fn project(doc: &Document, projection: &Projection) -> Document {
    match projection {
        Projection::DefaultDenyList => {
            let mut out = doc.clone();
            out.remove(REV_FIELD);
            out
        }
        Projection::Fields(fields) => {
            let mut out = Document::new();
            if let Some(id) = doc.get(ID_FIELD) {
                out.insert(ID_FIELD.to_string(), id.clone());
            }
            for field in fields {
                if let Some(value) = doc.get(field) {
                    out.insert(field.clone(), value.clone());
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn numeric_coercion_against_raw_strings() {
        let d = doc(json!({"price": 120}));
        assert!(condition_matches(&FilterCondition::gte("price", "100"), &d));
        assert!(condition_matches(&FilterCondition::lt("price", "200.5"), &d));
        assert!(!condition_matches(&FilterCondition::gt("price", "120"), &d));
        assert!(condition_matches(&FilterCondition::eq("price", "120"), &d));
    }

    #[test]
    fn string_equality_and_ordering() {
        let d = doc(json!({"difficulty": "easy"}));
        assert!(condition_matches(&FilterCondition::eq("difficulty", "easy"), &d));
        assert!(!condition_matches(&FilterCondition::eq("difficulty", "hard"), &d));
    }

    #[test]
    fn boolean_coercion() {
        let d = doc(json!({"secret_tour": true}));
        assert!(condition_matches(&FilterCondition::eq("secret_tour", "true"), &d));
        assert!(condition_matches(&FilterCondition::eq("secret_tour", true), &d));
        assert!(!condition_matches(&FilterCondition::ne("secret_tour", true), &d));
    }

    #[test]
    fn missing_field_satisfies_only_ne() {
        let d = doc(json!({"name": "x"}));
        assert!(condition_matches(&FilterCondition::ne("secret_tour", true), &d));
        assert!(!condition_matches(&FilterCondition::eq("secret_tour", true), &d));
        assert!(!condition_matches(&FilterCondition::gte("price", "10"), &d));
    }

    #[test]
    fn uncoercible_value_never_matches() {
        let d = doc(json!({"price": 100}));
        assert!(!condition_matches(&FilterCondition::gte("price", "cheap"), &d));
    }

    #[test]
    fn composite_sort_primary_first_stable_ties() {
        let mut docs = vec![
            doc(json!({"id": "a", "rating": 4.5, "price": 200})),
            doc(json!({"id": "b", "rating": 4.5, "price": 100})),
            doc(json!({"id": "c", "rating": 5.0, "price": 150})),
        ];
        sort_documents(
            &mut docs,
            &[SortKey::parse("-rating"), SortKey::parse("price")],
        );
        let ids: Vec<_> = docs.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn missing_sort_field_sorts_first_ascending() {
        let mut docs = vec![
            doc(json!({"id": "a", "price": 10})),
            doc(json!({"id": "b"})),
        ];
        sort_documents(&mut docs, &[SortKey::parse("price")]);
        assert_eq!(docs[0]["id"], "b");
    }

    #[test]
    fn default_projection_strips_rev() {
        let d = doc(json!({"id": "a", "name": "x", "rev": 3}));
        let projected = project(&d, &Projection::DefaultDenyList);
        assert!(projected.get(REV_FIELD).is_none());
        assert_eq!(projected.len(), 2);
    }

    #[test]
    fn allow_list_keeps_named_fields_plus_id() {
        let d = doc(json!({"id": "a", "name": "x", "price": 10, "rev": 3, "summary": "s"}));
        let projected = project(
            &d,
            &Projection::Fields(vec!["name".into(), "price".into()]),
        );
        let mut keys: Vec<_> = projected.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["id", "name", "price"]);
    }
}
