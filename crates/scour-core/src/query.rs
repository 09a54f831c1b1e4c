//! Query clause types serialized to the search engine's JSON shapes.

use serde::Serialize;
use serde_json::Value as JsonValue;

/// Range comparison operator, named as the engine expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOp {
    pub fn as_str(self) -> &'static str {
        match self {
            RangeOp::Gt => "gt",
            RangeOp::Gte => "gte",
            RangeOp::Lt => "lt",
            RangeOp::Lte => "lte",
        }
    }
}

/// One predicate. External serde tagging guarantees exactly one tag per
/// clause on the wire: `{"term": {...}}`, `{"range": {...}}`, and so on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    Term(serde_json::Map<String, JsonValue>),
    Match(serde_json::Map<String, JsonValue>),
    Range(serde_json::Map<String, JsonValue>),
    Wildcard(serde_json::Map<String, JsonValue>),
    Ids { values: Vec<String> },
    Exists { field: String },
    Bool(BoolClause),
}

impl Clause {
    pub fn term(field: &str, value: JsonValue) -> Self {
        let mut m = serde_json::Map::new();
        m.insert(field.to_string(), value);
        Clause::Term(m)
    }

    pub fn match_value(field: &str, value: &str) -> Self {
        let mut m = serde_json::Map::new();
        m.insert(field.to_string(), JsonValue::String(value.to_string()));
        Clause::Match(m)
    }

    pub fn range(field: &str, op: RangeOp, value: JsonValue) -> Self {
        let mut bounds = serde_json::Map::new();
        bounds.insert(op.as_str().to_string(), value);
        let mut m = serde_json::Map::new();
        m.insert(field.to_string(), JsonValue::Object(bounds));
        Clause::Range(m)
    }

    /// Closed interval `[gte, lte]` on one field.
    pub fn range_between(field: &str, gte: JsonValue, lte: JsonValue) -> Self {
        let mut bounds = serde_json::Map::new();
        bounds.insert("gte".to_string(), gte);
        bounds.insert("lte".to_string(), lte);
        let mut m = serde_json::Map::new();
        m.insert(field.to_string(), JsonValue::Object(bounds));
        Clause::Range(m)
    }

    pub fn wildcard(field: &str, pattern: &str) -> Self {
        let mut m = serde_json::Map::new();
        m.insert(field.to_string(), JsonValue::String(pattern.to_string()));
        Clause::Wildcard(m)
    }

    pub fn ids(values: Vec<String>) -> Self {
        Clause::Ids { values }
    }

    /// `field = null` filters: documents where the field is absent.
    pub fn not_exists(field: &str) -> Self {
        Clause::Bool(BoolClause {
            must_not: vec![Clause::Exists {
                field: field.to_string(),
            }],
            ..BoolClause::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct BoolClause {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Clause>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<Clause>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<Clause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_should_match: Option<u32>,
}

/// Top-level query body: `match_all` when no clause applies, otherwise a
/// flat `bool.must` conjunction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryBody {
    MatchAll {},
    Bool(BoolClause),
}

/// The compiled request body sent to the search executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub query: QueryBody,
    pub size: u64,
}

impl SearchQuery {
    /// Assemble the final body from already-compiled clauses, the optional
    /// timeframe clause leading.
    pub fn from_clauses(time_clause: Option<Clause>, clauses: Vec<Clause>, size: u64) -> Self {
        let mut must: Vec<Clause> = Vec::with_capacity(clauses.len() + 1);
        if let Some(tc) = time_clause {
            must.push(tc);
        }
        must.extend(clauses);
        let query = if must.is_empty() {
            QueryBody::MatchAll {}
        } else {
            QueryBody::Bool(BoolClause {
                must,
                ..BoolClause::default()
            })
        };
        SearchQuery { query, size }
    }
}
