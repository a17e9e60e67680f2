//! Elasticsearch REST request and response shapes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Sort clause: newest `published_at` first.
pub fn sort_by_published_desc() -> Value {
    json!([{ "published_at": { "order": "desc" } }])
}

/// Body of a `_search` request.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<u64>,
    pub size: u64,
    pub query: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Value>,
    #[serde(rename = "_source", skip_serializing_if = "Option::is_none")]
    pub source: Option<Vec<String>>,
    pub track_total_hits: bool,
}

impl SearchRequest {
    pub fn match_all(size: u64) -> Self {
        Self {
            from: None,
            size,
            query: json!({ "match_all": {} }),
            sort: None,
            source: None,
            track_total_hits: true,
        }
    }

    /// Fuzzy `best_fields` match of `text` over `fields`.
    pub fn multi_match(text: &str, fields: &[&str], size: u64) -> Self {
        Self {
            from: None,
            size,
            query: json!({
                "multi_match": {
                    "query": text,
                    "fields": fields,
                    "type": "best_fields",
                    "fuzziness": "AUTO"
                }
            }),
            sort: None,
            source: None,
            track_total_hits: true,
        }
    }

    pub fn from(mut self, from: u64) -> Self {
        self.from = Some(from);
        self
    }

    pub fn sort(mut self, sort: Value) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn source_fields(mut self, fields: &[&str]) -> Self {
        self.source = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }
}

/// Body of a `_count` request.
#[derive(Debug, Clone, Serialize)]
pub struct CountRequest {
    pub query: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub hits: Hits,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hits {
    #[serde(default)]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

impl Hits {
    /// Total matching documents, falling back to the returned hit count.
    pub fn total_value(&self) -> u64 {
        self.total
            .as_ref()
            .map(|t| t.value)
            .unwrap_or(self.hits.len() as u64)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TotalHits {
    pub value: u64,
    #[serde(default)]
    pub relation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
}
