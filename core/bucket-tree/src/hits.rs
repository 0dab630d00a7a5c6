//! FILENAME: core/bucket-tree/src/hits.rs
//! Row-per-document extraction for reports that list individual records.

use serde_json::Value;

use crate::definition::HitsSpec;
use crate::document::SearchResponse;

/// One row per `hits.hits[]` entry, one cell per configured column.
/// Missing or null fields become `spec.missing`.
pub fn flatten_hits(response: &SearchResponse, spec: &HitsSpec) -> Vec<Vec<String>> {
    response
        .hits()
        .iter()
        .map(|hit| {
            let source = hit.get("_source").unwrap_or(hit);
            spec.columns
                .iter()
                .map(|col| {
                    field_value(source, &col.field)
                        .and_then(render)
                        .unwrap_or_else(|| spec.missing.clone())
                })
                .collect()
        })
        .collect()
}

/// Flat dotted keys (`"address.street"` stored as one key) win over nested
/// objects of the same path.
fn field_value<'a>(source: &'a Value, field: &str) -> Option<&'a Value> {
    if let Some(v) = source.get(field) {
        return Some(v);
    }
    field
        .split('.')
        .try_fold(source, |node, segment| node.get(segment))
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n.as_f64().map(engine::format_number),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(render).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> HitsSpec {
        HitsSpec::new(&[
            ("Street", "address.street"),
            ("Number", "address.number"),
            ("Status", "status"),
        ])
    }

    #[test]
    fn nested_and_dotted_fields_resolve() {
        let response = SearchResponse::from_value(json!({
            "hits": {"total": {"value": 2}, "hits": [
                {"_source": {"address": {"street": "Main", "number": 4}, "status": "active"}},
                {"_source": {"address.street": "Side", "address.number": 12.5}}
            ]}
        }))
        .unwrap();

        let rows = flatten_hits(&response, &spec());
        assert_eq!(rows[0], vec!["Main", "4", "active"]);
        assert_eq!(rows[1], vec!["Side", "12.5", "N/A"]);
    }

    #[test]
    fn null_and_arrays_are_rendered() {
        let response = SearchResponse::from_value(json!({
            "hits": {"hits": [
                {"_source": {"address": {"street": null, "number": [1, 2]}, "status": true}}
            ]}
        }))
        .unwrap();

        let rows = flatten_hits(&response, &spec());
        assert_eq!(rows[0], vec!["N/A", "1, 2", "true"]);
    }

    #[test]
    fn no_hits_yield_no_rows() {
        let response = SearchResponse::from_value(json!({"hits": {"total": 0, "hits": []}})).unwrap();
        assert!(flatten_hits(&response, &spec()).is_empty());
    }
}
