//! Search requests and paginated result views.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Hits per page when the query does not say.
pub const DEFAULT_PER_PAGE: u64 = 10;

/// An engine query body plus paging parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Opaque engine query (`{"query": ..., "facets": ...}`); forwarded verbatim.
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub from: Option<u64>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl SearchQuery {
    pub fn new(body: Value) -> Self {
        Self {
            body,
            from: None,
            size: None,
        }
    }

    pub fn from(mut self, from: u64) -> Self {
        self.from = Some(from);
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Request body sent to the engine: the query body with paging merged in.
    pub fn to_body(&self) -> Value {
        let mut body = match &self.body {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        if let Some(from) = self.from {
            body.insert("from".into(), Value::from(from));
        }
        if let Some(size) = self.size {
            body.insert("size".into(), Value::from(size));
        }
        Value::Object(body)
    }
}

/// One search response with pagination and facet/aggregation accessors.
#[derive(Debug, Clone)]
pub struct QueryResultView {
    query: SearchQuery,
    response: Value,
}

impl QueryResultView {
    pub fn new(query: SearchQuery, response: Value) -> Self {
        Self { query, response }
    }

    pub fn hits(&self) -> &[Value] {
        self.response["hits"]["hits"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn ids(&self) -> Vec<String> {
        self.hits()
            .iter()
            .filter_map(|hit| match hit.get("_id") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .collect()
    }

    /// `hits.total` as a number, or as `{"value": n}` on newer engines.
    pub fn total_hits(&self) -> u64 {
        let total = &self.response["hits"]["total"];
        total
            .as_u64()
            .or_else(|| total.get("value").and_then(Value::as_u64))
            .unwrap_or(0)
    }

    pub fn took_ms(&self) -> Option<u64> {
        self.response.get("took").and_then(Value::as_u64)
    }

    /// `ceil((from + 1) / size)`; an unset or zero size counts as 1.
    pub fn current_page(&self) -> u64 {
        let from = self.query.from.unwrap_or(0);
        let size = self.query.size.filter(|s| *s > 0).unwrap_or(1);
        from.saturating_add(1).div_ceil(size)
    }

    pub fn per_page(&self) -> u64 {
        self.query
            .size
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_PER_PAGE)
    }

    pub fn total_pages(&self) -> u64 {
        self.total_hits().div_ceil(self.per_page())
    }

    pub fn next_page(&self) -> Option<u64> {
        let current = self.current_page();
        (current < self.total_pages()).then(|| current + 1)
    }

    pub fn previous_page(&self) -> Option<u64> {
        let current = self.current_page();
        (current > 1).then(|| current - 1)
    }

    pub fn out_of_bounds(&self) -> bool {
        let total = self.total_pages();
        total == 0 || self.current_page() > total
    }

    pub fn facets(&self) -> Map<String, Value> {
        section(&self.response, "facets")
    }

    pub fn facet(&self, name: &str) -> Option<&Value> {
        self.response.get("facets").and_then(|f| f.get(name))
    }

    pub fn aggregations(&self) -> Map<String, Value> {
        section(&self.response, "aggregations")
    }

    pub fn aggregation(&self, name: &str) -> Option<&Value> {
        self.response.get("aggregations").and_then(|a| a.get(name))
    }
}

fn section(response: &Value, key: &str) -> Map<String, Value> {
    response
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}
