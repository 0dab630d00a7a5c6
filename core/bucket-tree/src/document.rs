//! FILENAME: core/bucket-tree/src/document.rs
//! Search Response - read-only view over a retrieved result document.
//!
//! The retrieval step writes the backend's raw JSON response to disk. This
//! module loads it fully into memory and exposes just the parts the
//! flattener needs:
//! - `hits.total` (object `{value, relation}` or a bare integer)
//! - the `timed_out` / `_shards.failed` partial-result markers
//! - `aggregations.<name>.buckets` trees
//! - `hits.hits[]._source` documents for row-per-document reports
//!
//! Nothing here is validated beyond presence checks. A missing child
//! aggregation is reported as `None` so the flattener can turn it into a
//! sentinel row; only a structurally different shape is an error.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::FlattenError;

type Object = Map<String, Value>;

// ============================================================================
// SEARCH RESPONSE
// ============================================================================

/// A fully materialized search response.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    /// `hits.total.value`, 0 when absent.
    pub total_hits: u64,

    /// False when the backend only reports a lower bound (`relation: "gte"`).
    pub total_is_exact: bool,

    /// The backend timed out or some shards failed; results may be incomplete.
    pub partial: bool,

    aggregations: Object,
    hits: Vec<Value>,
}

impl SearchResponse {
    /// Loads and parses a response document from disk.
    pub fn load(path: &Path) -> Result<Self, FlattenError> {
        if !path.exists() {
            return Err(FlattenError::MissingInputFile(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, FlattenError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, FlattenError> {
        let Value::Object(root) = value else {
            return Err(FlattenError::malformed("$", "response is not a JSON object"));
        };

        if let Some(error) = root.get("error") {
            return Err(upstream_error(error));
        }

        let hits = root.get("hits").and_then(Value::as_object);
        let (total_hits, total_is_exact) = match hits.and_then(|h| h.get("total")) {
            Some(Value::Object(total)) => {
                let value = total.get("value").and_then(as_count).unwrap_or(0);
                let exact = total
                    .get("relation")
                    .and_then(Value::as_str)
                    .map(|r| r == "eq")
                    .unwrap_or(true);
                (value, exact)
            }
            Some(other) => (as_count(other).unwrap_or(0), true),
            None => (0, true),
        };

        let timed_out = root.get("timed_out").and_then(Value::as_bool).unwrap_or(false);
        let failed_shards = root
            .get("_shards")
            .and_then(|s| s.get("failed"))
            .and_then(as_count)
            .unwrap_or(0);

        let aggregations = match root.get("aggregations") {
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(FlattenError::malformed("aggregations", "expected an object"));
            }
            None => Object::new(),
        };

        let documents = hits
            .and_then(|h| h.get("hits"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(SearchResponse {
            total_hits,
            total_is_exact,
            partial: timed_out || failed_shards > 0,
            aggregations,
            hits: documents,
        })
    }

    /// Looks up a top-level aggregation by name.
    pub fn aggregation(&self, name: &str) -> Result<Option<Aggregation<'_>>, FlattenError> {
        lookup_aggregation(&self.aggregations, name, "aggregations")
    }

    /// The raw `hits.hits` documents.
    pub fn hits(&self) -> &[Value] {
        &self.hits
    }
}

// ============================================================================
// AGGREGATIONS AND BUCKETS
// ============================================================================

/// One named aggregation beneath a node.
#[derive(Debug, Clone)]
pub enum Aggregation<'a> {
    /// A multi-bucket aggregation (`terms`, `histogram`, `date_histogram`...).
    Buckets(Vec<Bucket<'a>>),
    /// A single-bucket aggregation (`filter`) carrying only a document count
    /// and possibly nested aggregations of its own.
    Single(Bucket<'a>),
}

impl<'a> Aggregation<'a> {
    pub fn buckets(&self) -> &[Bucket<'a>] {
        match self {
            Aggregation::Buckets(b) => b,
            Aggregation::Single(b) => std::slice::from_ref(b),
        }
    }
}

/// A bucket key as returned by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BucketKey {
    Text(String),
    Number(f64),
    Boolean(bool),
    Missing,
}

impl BucketKey {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) => BucketKey::Text(s.clone()),
            Some(Value::Number(n)) => n.as_f64().map(BucketKey::Number).unwrap_or(BucketKey::Missing),
            Some(Value::Bool(b)) => BucketKey::Boolean(*b),
            _ => BucketKey::Missing,
        }
    }

    /// Key rendered as a category label. Integral numbers print without decimals.
    pub fn as_label(&self) -> String {
        match self {
            BucketKey::Text(s) => s.clone(),
            BucketKey::Number(n) => engine::format_number(*n),
            BucketKey::Boolean(b) => b.to_string(),
            BucketKey::Missing => String::new(),
        }
    }

    /// Key as a number; numeric strings are accepted.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            BucketKey::Number(n) => Some(*n),
            BucketKey::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// A view over a single bucket object.
#[derive(Debug, Clone)]
pub struct Bucket<'a> {
    pub key: BucketKey,
    pub key_as_string: Option<&'a str>,
    pub doc_count: u64,
    body: &'a Object,
    path: String,
}

impl<'a> Bucket<'a> {
    fn new(body: &'a Object, key_override: Option<&str>, path: String) -> Result<Self, FlattenError> {
        if let Some(error) = body.get("error") {
            return Err(upstream_error(error));
        }
        let doc_count = body
            .get("doc_count")
            .and_then(as_count)
            .ok_or_else(|| FlattenError::malformed(&path, "bucket has no doc_count"))?;
        let key = match key_override {
            Some(k) => BucketKey::Text(k.to_string()),
            None => BucketKey::from_value(body.get("key")),
        };
        Ok(Bucket {
            key,
            key_as_string: body.get("key_as_string").and_then(Value::as_str),
            doc_count,
            body,
            path,
        })
    }

    /// Looks up a named child aggregation of this bucket.
    pub fn child(&self, name: &str) -> Result<Option<Aggregation<'a>>, FlattenError> {
        lookup_aggregation(self.body, name, &self.path)
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

fn lookup_aggregation<'a>(
    parent: &'a Object,
    name: &str,
    parent_path: &str,
) -> Result<Option<Aggregation<'a>>, FlattenError> {
    let path = format!("{}.{}", parent_path, name);
    let Some(value) = parent.get(name) else {
        return Ok(None);
    };
    let Value::Object(agg) = value else {
        return Err(FlattenError::malformed(&path, "aggregation is not an object"));
    };
    if let Some(error) = agg.get("error") {
        return Err(upstream_error(error));
    }

    match agg.get("buckets") {
        Some(Value::Array(items)) => {
            let mut buckets = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, idx);
                let Value::Object(body) = item else {
                    return Err(FlattenError::malformed(&item_path, "bucket is not an object"));
                };
                buckets.push(Bucket::new(body, None, item_path)?);
            }
            Ok(Some(Aggregation::Buckets(buckets)))
        }
        // Keyed range / filters aggregations return an object of buckets.
        Some(Value::Object(keyed)) => {
            let mut buckets = Vec::with_capacity(keyed.len());
            for (key, item) in keyed {
                let item_path = format!("{}[{}]", path, key);
                let Value::Object(body) = item else {
                    return Err(FlattenError::malformed(&item_path, "bucket is not an object"));
                };
                buckets.push(Bucket::new(body, Some(key.as_str()), item_path)?);
            }
            Ok(Some(Aggregation::Buckets(buckets)))
        }
        Some(_) => Err(FlattenError::malformed(&path, "buckets is neither an array nor an object")),
        None if agg.contains_key("doc_count") => {
            Ok(Some(Aggregation::Single(Bucket::new(agg, Some(name), path)?)))
        }
        None => Err(FlattenError::malformed(&path, "aggregation has neither buckets nor doc_count")),
    }
}

fn as_count(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

fn upstream_error(error: &Value) -> FlattenError {
    let detail = serde_json::to_string_pretty(error).unwrap_or_else(|_| error.to_string());
    FlattenError::UpstreamQueryError(detail)
}
