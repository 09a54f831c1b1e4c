//! The filter-token compiler.
//!
//! Each token is one predicate in a tiny operator-facing grammar:
//! `field=value` equality (type-dispatched on cached field metadata),
//! `field<op>value` ranges for numeric and date fields, plus the `_id=`
//! and `detection_id_dedup=` shortcuts. Tokens are parsed independently
//! and ANDed together; compilation is all-or-nothing.

use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::errors::{ParseError, QueryError, Result};
use crate::model::{FieldLookup, FieldType};
use crate::query::{Clause, RangeOp, SearchQuery};
use crate::timeframe::build_time_query;

/// Compile filter tokens, a timeframe and a page size into one request
/// body. Every token is attempted; if any fails, all parse errors are
/// aggregated and no query is produced.
pub fn compile(
    filters: &[String],
    size: i64,
    timeframe: &str,
    now: DateTime<Utc>,
    fields: &dyn FieldLookup,
) -> Result<SearchQuery> {
    if size < 0 {
        return Err(QueryError::NegativeSize);
    }
    let time_clause = build_time_query(timeframe, now)?;

    let mut clauses = Vec::with_capacity(filters.len());
    let mut errors: Vec<(usize, ParseError)> = Vec::new();
    for (i, token) in filters.iter().enumerate() {
        match parse_filter(token, fields) {
            Ok(clause) => clauses.push(clause),
            Err(e) => errors.push((i, e)),
        }
    }
    if !errors.is_empty() {
        return Err(QueryError::from_parse_errors(errors));
    }
    debug!(filters = filters.len(), size, "compiled search query");
    Ok(SearchQuery::from_clauses(time_clause, clauses, size as u64))
}

/// Parse one filter token into a clause.
pub fn parse_filter(
    token: &str,
    fields: &dyn FieldLookup,
) -> std::result::Result<Clause, ParseError> {
    if let Some(value) = token.strip_prefix("_id=") {
        if value.is_empty() {
            return Err(ParseError::new("_id", "missing value in filter"));
        }
        return Ok(Clause::ids(vec![value.to_string()]));
    }
    if let Some(value) = token.strip_prefix("detection_id_dedup=") {
        if value.is_empty() {
            return Err(ParseError::new("detection_id_dedup", "missing value in filter"));
        }
        return Ok(Clause::term("detection_id_dedup", json!(value)));
    }
    if let Some(pos) = token.find(['<', '>']) {
        return parse_range_filter(token, pos, fields);
    }
    parse_equality_filter(token, fields)
}

fn parse_range_filter(
    token: &str,
    op_pos: usize,
    fields: &dyn FieldLookup,
) -> std::result::Result<Clause, ParseError> {
    let field = &token[..op_pos];
    if !is_valid_field_name(field) {
        return Err(ParseError::new(field, format!("invalid field name '{}'", field)));
    }

    let rest = &token[op_pos..];
    let (op, value) = if rest[1..].starts_with('=') {
        (&rest[..2], &rest[2..])
    } else {
        (&rest[..1], &rest[1..])
    };
    if value.is_empty() {
        return Err(ParseError::new(field, "missing value in range query"));
    }
    let op = match op {
        ">" => RangeOp::Gt,
        ">=" => RangeOp::Gte,
        "<" => RangeOp::Lt,
        _ => RangeOp::Lte,
    };

    let meta = fields.lookup(field).unwrap_or_default();
    if !meta.searchable {
        return Err(ParseError::new(field, format!("field '{}' is not searchable", field)));
    }
    if meta.field_type.is_numeric() {
        let n: f64 = value.parse().map_err(|_| {
            ParseError::new(field, format!("invalid numeric value '{}'", value))
        })?;
        Ok(Clause::range(field, op, number_value(n)))
    } else if meta.field_type == FieldType::Date {
        let millis = parse_date_value(value)
            .ok_or_else(|| ParseError::new(field, format!("invalid date value '{}'", value)))?;
        Ok(Clause::range(field, op, json!(millis)))
    } else {
        Err(ParseError::new(
            field,
            "range queries require a numeric or date field",
        ))
    }
}

fn parse_equality_filter(
    token: &str,
    fields: &dyn FieldLookup,
) -> std::result::Result<Clause, ParseError> {
    let Some(eq) = token.find('=') else {
        return Err(ParseError::new(
            token,
            "invalid filter, expected field=value",
        ));
    };
    let (field, value) = (&token[..eq], &token[eq + 1..]);
    if !is_valid_field_name(field) {
        return Err(ParseError::new(field, format!("invalid field name '{}'", field)));
    }
    if value.is_empty() {
        return Err(ParseError::new(field, "missing value in filter"));
    }

    let meta = fields.lookup(field).unwrap_or_default();
    if !meta.searchable {
        return Err(ParseError::new(field, format!("field '{}' is not searchable", field)));
    }
    match meta.field_type {
        t if t.is_numeric() => {
            let n: f64 = value.parse().map_err(|_| {
                ParseError::new(field, format!("invalid numeric value '{}'", value))
            })?;
            Ok(Clause::term(field, number_value(n)))
        }
        FieldType::Date => {
            let millis = parse_date_value(value).ok_or_else(|| {
                ParseError::new(field, format!("invalid date value '{}'", value))
            })?;
            Ok(Clause::term(field, json!(millis)))
        }
        FieldType::Boolean => {
            if value.eq_ignore_ascii_case("true") {
                Ok(Clause::term(field, json!(true)))
            } else if value.eq_ignore_ascii_case("false") {
                Ok(Clause::term(field, json!(false)))
            } else {
                Err(ParseError::new(
                    field,
                    format!("invalid boolean value '{}'", value),
                ))
            }
        }
        _ => parse_keyword_filter(field, value),
    }
}

fn parse_keyword_filter(field: &str, value: &str) -> std::result::Result<Clause, ParseError> {
    if value.eq_ignore_ascii_case("null") || value.eq_ignore_ascii_case("nil") {
        return Ok(Clause::not_exists(field));
    }
    if let Some(pos) = first_unescaped_wildcard(value) {
        if pos == 0 {
            return Err(ParseError::new(field, "wildcard query cannot start with *"));
        }
        // The engine interprets escapes inside wildcard patterns itself.
        return Ok(Clause::wildcard(field, value));
    }
    Ok(Clause::match_value(field, &unescape(value)))
}

/// Dot-separated segments, each a letter followed by letters, digits,
/// underscores or hyphens.
fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|seg| {
            let mut chars = seg.chars();
            match chars.next() {
                Some(c) if c.is_ascii_alphabetic() => {
                    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
                }
                _ => false,
            }
        })
}

/// Position of the first `*` or `?` not preceded by a backslash.
fn first_unescaped_wildcard(value: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '*' | '?' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Resolve escapes: `\\`, `\*`, `\?` and `\=` become the literal
/// character; any other escape keeps its backslash; a trailing lone
/// backslash is preserved.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('\\' | '*' | '?' | '=')) => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Whole numbers serialize without a fractional part, the way the
/// engine expects counts and epoch values.
fn number_value(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < 9e15 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

/// Interpret a date value as a Unix timestamp (magnitude above 1e12
/// means milliseconds, otherwise seconds) or an RFC3339 string; the
/// result is normalized to epoch milliseconds.
fn parse_date_value(value: &str) -> Option<i64> {
    if let Ok(n) = value.parse::<f64>() {
        if n.abs() > 1e12 {
            return Some(n as i64);
        }
        return Some((n * 1000.0) as i64);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldMetadata, NoFields};
    use serde_json::json;
    use std::collections::HashMap;

    struct MapLookup(HashMap<String, FieldMetadata>);

    impl MapLookup {
        fn new(entries: &[(&str, FieldType)]) -> Self {
            let map = entries
                .iter()
                .map(|(name, ft)| {
                    (
                        name.to_string(),
                        FieldMetadata {
                            field_type: *ft,
                            ..FieldMetadata::default()
                        },
                    )
                })
                .collect();
            MapLookup(map)
        }
    }

    impl FieldLookup for MapLookup {
        fn lookup(&self, field: &str) -> Option<FieldMetadata> {
            self.0.get(field).copied()
        }
    }

    fn now() -> DateTime<Utc> {
        chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 3, 5, 12, 0, 0).unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_match_filter() {
        let q = compile(&strings(&["status=active"]), 20, "", now(), &NoFields).unwrap();
        assert_eq!(
            serde_json::to_value(&q).unwrap(),
            json!({"query": {"bool": {"must": [{"match": {"status": "active"}}]}}, "size": 20})
        );
    }

    #[test]
    fn range_and_wildcard_keep_input_order() {
        let fields = MapLookup::new(&[("age", FieldType::Long)]);
        let q = compile(&strings(&["age>=21", "name=john*"]), 20, "", now(), &fields).unwrap();
        let v = serde_json::to_value(&q).unwrap();
        assert_eq!(
            v["query"]["bool"]["must"],
            json!([
                {"range": {"age": {"gte": 21}}},
                {"wildcard": {"name": "john*"}}
            ])
        );
    }

    #[test]
    fn leading_wildcard_is_rejected() {
        let err = compile(&strings(&["name=*john"]), 20, "", now(), &NoFields).unwrap_err();
        assert!(err.to_string().contains("wildcard query cannot start with *"));
    }

    #[test]
    fn no_filters_no_timeframe_is_match_all() {
        let q = compile(&[], 10, "", now(), &NoFields).unwrap();
        assert_eq!(
            serde_json::to_value(&q).unwrap(),
            json!({"query": {"match_all": {}}, "size": 10})
        );
    }

    #[test]
    fn range_without_value_is_rejected() {
        let fields = MapLookup::new(&[("price", FieldType::Double)]);
        let err = compile(&strings(&["price>"]), 20, "", now(), &fields).unwrap_err();
        assert!(err.to_string().contains("missing value in range query"));
    }

    #[test]
    fn negative_size_rejected_before_filter_parsing() {
        let err = compile(&strings(&["not even a filter"]), -1, "", now(), &NoFields).unwrap_err();
        assert_eq!(err, QueryError::NegativeSize);
    }

    #[test]
    fn unknown_field_falls_back_to_keyword_handling() {
        let clause = parse_filter("never.seen=value", &NoFields).unwrap();
        assert_eq!(clause, Clause::match_value("never.seen", "value"));
    }

    #[test]
    fn id_and_dedup_shortcuts() {
        assert_eq!(
            parse_filter("_id=abc123", &NoFields).unwrap(),
            Clause::ids(vec!["abc123".into()])
        );
        assert_eq!(
            parse_filter("detection_id_dedup=rule-7", &NoFields).unwrap(),
            Clause::term("detection_id_dedup", json!("rule-7"))
        );
    }

    #[test]
    fn range_operators_map_to_engine_bounds() {
        let fields = MapLookup::new(&[("age", FieldType::Integer)]);
        for (token, expect) in [
            ("age>21", json!({"range": {"age": {"gt": 21}}})),
            ("age>=21", json!({"range": {"age": {"gte": 21}}})),
            ("age<21", json!({"range": {"age": {"lt": 21}}})),
            ("age<=21", json!({"range": {"age": {"lte": 21}}})),
        ] {
            let clause = parse_filter(token, &fields).unwrap();
            assert_eq!(serde_json::to_value(&clause).unwrap(), expect);
        }
    }

    #[test]
    fn range_on_keyword_field_is_rejected() {
        let err = parse_filter("name>10", &NoFields).unwrap_err();
        assert!(err.message.contains("numeric or date"));
    }

    #[test]
    fn date_values_accept_timestamps_and_rfc3339() {
        let fields = MapLookup::new(&[("created", FieldType::Date)]);
        // seconds scale up to millis
        assert_eq!(
            serde_json::to_value(parse_filter("created>1700000000", &fields).unwrap()).unwrap(),
            json!({"range": {"created": {"gt": 1_700_000_000_000i64}}})
        );
        // already millis
        assert_eq!(
            serde_json::to_value(parse_filter("created>1700000000000", &fields).unwrap()).unwrap(),
            json!({"range": {"created": {"gt": 1_700_000_000_000i64}}})
        );
        let clause = parse_filter("created=2024-03-05T12:00:00Z", &fields).unwrap();
        assert_eq!(
            serde_json::to_value(&clause).unwrap(),
            json!({"term": {"created": 1_709_640_000_000i64}})
        );
        assert!(parse_filter("created=yesterday", &fields).is_err());
    }

    #[test]
    fn boolean_values_are_case_insensitive() {
        let fields = MapLookup::new(&[("enabled", FieldType::Boolean)]);
        assert_eq!(
            parse_filter("enabled=TRUE", &fields).unwrap(),
            Clause::term("enabled", json!(true))
        );
        assert_eq!(
            parse_filter("enabled=false", &fields).unwrap(),
            Clause::term("enabled", json!(false))
        );
        assert!(parse_filter("enabled=yes", &fields).is_err());
    }

    #[test]
    fn null_and_nil_become_must_not_exists() {
        for token in ["email=null", "email=NIL"] {
            assert_eq!(
                parse_filter(token, &NoFields).unwrap(),
                Clause::not_exists("email")
            );
        }
    }

    #[test]
    fn escaped_wildcards_never_classify_as_wildcard() {
        let clause = parse_filter(r"name=test\*product", &NoFields).unwrap();
        assert_eq!(clause, Clause::match_value("name", "test*product"));
    }

    #[test]
    fn escape_rules() {
        assert_eq!(unescape(r"a\*b\?c\=d\\e"), "a*b?c=d\\e");
        // unknown escapes keep the backslash
        assert_eq!(unescape(r"a\nb"), r"a\nb");
        // trailing lone backslash preserved
        assert_eq!(unescape("abc\\"), "abc\\");
    }

    #[test]
    fn interior_wildcard_allowed_after_escaped_leader() {
        let clause = parse_filter(r"name=\*lit*", &NoFields).unwrap();
        assert_eq!(clause, Clause::wildcard("name", r"\*lit*"));
    }

    #[test]
    fn invalid_field_names_rejected() {
        for token in ["9lives=x", "bad field=x", ".leading=x", "a..b=x", "=x"] {
            assert!(parse_filter(token, &NoFields).is_err(), "{}", token);
        }
        for token in ["user.profile.email=x", "a-b_c.d2=x"] {
            assert!(parse_filter(token, &NoFields).is_ok(), "{}", token);
        }
    }

    #[test]
    fn unsearchable_field_is_rejected() {
        let mut map = HashMap::new();
        map.insert(
            "hidden".to_string(),
            FieldMetadata {
                searchable: false,
                ..FieldMetadata::default()
            },
        );
        let fields = MapLookup(map);
        let err = parse_filter("hidden=x", &fields).unwrap_err();
        assert!(err.message.contains("not searchable"));
    }

    #[test]
    fn errors_aggregate_with_positions_and_discard_good_clauses() {
        let filters = strings(&["status=active", "name=*bad", "price>"]);
        let err = compile(&filters, 20, "", now(), &NoFields).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("filter[1]"), "{}", msg);
        assert!(msg.contains("filter[2]"), "{}", msg);
        assert!(msg.contains("; "), "{}", msg);
        assert!(!msg.contains("filter[0]"), "{}", msg);
    }

    #[test]
    fn timeframe_clause_precedes_filters() {
        let q = compile(&strings(&["status=active"]), 20, "12h", now(), &NoFields).unwrap();
        let v = serde_json::to_value(&q).unwrap();
        let must = v["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 2);
        assert!(must[0].get("bool").is_some());
        assert_eq!(must[1], json!({"match": {"status": "active"}}));
    }

    #[test]
    fn timeframe_errors_stand_alone() {
        let err = compile(&strings(&["name=*bad"]), 20, "12x", now(), &NoFields).unwrap_err();
        assert!(matches!(err, QueryError::Timeframe(_)));
    }

    #[test]
    fn compilation_is_idempotent() {
        let fields = MapLookup::new(&[("age", FieldType::Long)]);
        let filters = strings(&["age>=21", "name=john*"]);
        let a = compile(&filters, 20, "12h", now(), &fields).unwrap();
        let b = compile(&filters, 20, "12h", now(), &fields).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fractional_numbers_keep_their_fraction() {
        let fields = MapLookup::new(&[("score", FieldType::Float)]);
        let clause = parse_filter("score>=0.75", &fields).unwrap();
        assert_eq!(
            serde_json::to_value(&clause).unwrap(),
            json!({"range": {"score": {"gte": 0.75}}})
        );
    }
}
