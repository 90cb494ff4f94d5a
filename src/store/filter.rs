use rusqlite::types::Value as SqlValue;
use serde_json::Value as JsonValue;

use crate::types::{FilterCondition, FilterConfig, FilterRule, SortDirection, SortRule};

/// A filter compiled to a SQL fragment over the `properties` JSON column.
/// `clause` contains `?` placeholders matched by `params` in order.
pub(crate) struct CompiledFilter {
    pub clause: String,
    pub params: Vec<SqlValue>,
}

/// Compiles a filter config into a WHERE fragment. Returns None when every
/// rule is a no-op, so callers can skip the clause entirely.
pub(crate) fn compile_filter(filter: &FilterConfig) -> Option<CompiledFilter> {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    for rule in &filter.and {
        if let Some((clause, rule_params)) = compile_rule(rule) {
            clauses.push(clause);
            params.extend(rule_params);
        }
    }

    let mut or_clauses = Vec::new();
    for rule in &filter.or {
        if let Some((clause, rule_params)) = compile_rule(rule) {
            or_clauses.push(clause);
            params.extend(rule_params);
        }
    }
    if !or_clauses.is_empty() {
        clauses.push(format!("({})", or_clauses.join(" OR ")));
    }

    if clauses.is_empty() {
        return None;
    }
    Some(CompiledFilter { clause: clauses.join(" AND "), params })
}

/// Compiles sort rules into an ORDER BY fragment. `created_at` and
/// `updated_at` refer to row columns; anything else is a property id.
/// The fallback `created_at DESC` keeps the order stable across re-reads.
pub(crate) fn compile_sort(sort: &[SortRule]) -> (String, Vec<SqlValue>) {
    let mut terms = Vec::new();
    let mut params = Vec::new();

    for rule in sort {
        let dir = match rule.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        match rule.property.as_str() {
            "created_at" => terms.push(format!("created_at {dir}")),
            "updated_at" => terms.push(format!("updated_at {dir}")),
            _ => {
                terms.push(format!("json_extract(properties, ?) {dir}"));
                params.push(SqlValue::Text(json_path(&rule.property)));
            }
        }
    }
    terms.push("created_at DESC".to_string());

    (format!(" ORDER BY {}", terms.join(", ")), params)
}

fn compile_rule(rule: &FilterRule) -> Option<(String, Vec<SqlValue>)> {
    if rule_is_noop(rule) {
        return None;
    }
    let path = json_path(&rule.property);
    let extract = "json_extract(properties, ?)";

    Some(match rule.condition {
        FilterCondition::Eq => (
            format!("{extract} = ?"),
            vec![SqlValue::Text(path), bind_value(&rule.value)],
        ),
        FilterCondition::Neq => (
            format!("({extract} IS NULL OR {extract} != ?)"),
            vec![SqlValue::Text(path.clone()), SqlValue::Text(path), bind_value(&rule.value)],
        ),
        FilterCondition::Gt => compile_numeric(">", path, &rule.value),
        FilterCondition::Lt => compile_numeric("<", path, &rule.value),
        FilterCondition::Gte => compile_numeric(">=", path, &rule.value),
        FilterCondition::Lte => compile_numeric("<=", path, &rule.value),
        FilterCondition::Contains => (
            format!("instr(lower(CAST({extract} AS TEXT)), ?) > 0"),
            vec![SqlValue::Text(path), SqlValue::Text(needle(&rule.value))],
        ),
        FilterCondition::NotContains => (
            format!("({extract} IS NULL OR instr(lower(CAST({extract} AS TEXT)), ?) = 0)"),
            vec![
                SqlValue::Text(path.clone()),
                SqlValue::Text(path),
                SqlValue::Text(needle(&rule.value)),
            ],
        ),
        FilterCondition::StartsWith => {
            let n = needle(&rule.value);
            (
                format!("substr(lower(CAST({extract} AS TEXT)), 1, ?) = ?"),
                vec![
                    SqlValue::Text(path),
                    SqlValue::Integer(n.chars().count() as i64),
                    SqlValue::Text(n),
                ],
            )
        }
        FilterCondition::EndsWith => {
            let n = needle(&rule.value);
            (
                format!("substr(lower(CAST({extract} AS TEXT)), ?) = ?"),
                vec![
                    SqlValue::Text(path),
                    SqlValue::Integer(-(n.chars().count() as i64)),
                    SqlValue::Text(n),
                ],
            )
        }
        FilterCondition::IsEmpty => (
            format!("({extract} IS NULL OR {extract} = '')"),
            vec![SqlValue::Text(path.clone()), SqlValue::Text(path)],
        ),
        FilterCondition::IsNotEmpty => (
            format!("({extract} IS NOT NULL AND {extract} != '')"),
            vec![SqlValue::Text(path.clone()), SqlValue::Text(path)],
        ),
    })
}

fn compile_numeric(op: &str, path: String, value: &JsonValue) -> (String, Vec<SqlValue>) {
    (
        format!("CAST(json_extract(properties, ?) AS REAL) {op} ?"),
        vec![SqlValue::Text(path), SqlValue::Real(coerce_numeric(value))],
    )
}

/// Evaluates a filter against a row's properties mapping in process, with
/// the same semantics as the compiled SQL. A JSON `null` property counts as
/// missing, matching json_extract.
pub fn row_matches_filter(properties: &JsonValue, filter: &FilterConfig) -> bool {
    let and_ok = filter
        .and
        .iter()
        .filter(|rule| !rule_is_noop(rule))
        .all(|rule| eval_rule(properties, rule));

    let or_rules: Vec<&FilterRule> =
        filter.or.iter().filter(|rule| !rule_is_noop(rule)).collect();
    let or_ok = or_rules.is_empty() || or_rules.iter().any(|rule| eval_rule(properties, rule));

    and_ok && or_ok
}

fn eval_rule(properties: &JsonValue, rule: &FilterRule) -> bool {
    let prop = properties.get(&rule.property).filter(|v| !v.is_null());

    match rule.condition {
        FilterCondition::Eq => prop.is_some_and(|v| values_equal(v, &rule.value)),
        FilterCondition::Neq => prop.is_none_or(|v| !values_equal(v, &rule.value)),
        FilterCondition::Gt => eval_numeric(prop, &rule.value, |a, b| a > b),
        FilterCondition::Lt => eval_numeric(prop, &rule.value, |a, b| a < b),
        FilterCondition::Gte => eval_numeric(prop, &rule.value, |a, b| a >= b),
        FilterCondition::Lte => eval_numeric(prop, &rule.value, |a, b| a <= b),
        FilterCondition::Contains => {
            prop.is_some_and(|v| lower_text(v).contains(&needle(&rule.value)))
        }
        FilterCondition::NotContains => {
            prop.is_none_or(|v| !lower_text(v).contains(&needle(&rule.value)))
        }
        FilterCondition::StartsWith => {
            prop.is_some_and(|v| lower_text(v).starts_with(&needle(&rule.value)))
        }
        FilterCondition::EndsWith => {
            prop.is_some_and(|v| lower_text(v).ends_with(&needle(&rule.value)))
        }
        FilterCondition::IsEmpty => prop.is_none_or(|v| v.as_str() == Some("")),
        FilterCondition::IsNotEmpty => prop.is_some_and(|v| v.as_str() != Some("")),
    }
}

fn eval_numeric(prop: Option<&JsonValue>, value: &JsonValue, cmp: fn(f64, f64) -> bool) -> bool {
    prop.is_some_and(|v| cmp(coerce_numeric(v), coerce_numeric(value)))
}

fn rule_is_noop(rule: &FilterRule) -> bool {
    match rule.condition {
        FilterCondition::Eq
        | FilterCondition::Neq
        | FilterCondition::Contains
        | FilterCondition::NotContains
        | FilterCondition::StartsWith
        | FilterCondition::EndsWith => rule.value.is_null() || rule.value.as_str() == Some(""),
        FilterCondition::Gt | FilterCondition::Lt | FilterCondition::Gte | FilterCondition::Lte => {
            rule.value.is_null()
        }
        FilterCondition::IsEmpty | FilterCondition::IsNotEmpty => false,
    }
}

/// Builds a json_extract path for a property id. Double quotes are stripped
/// so the id cannot terminate the quoted path segment.
fn json_path(property: &str) -> String {
    format!("$.\"{}\"", property.replace('"', ""))
}

fn bind_value(value: &JsonValue) -> SqlValue {
    match value {
        JsonValue::String(s) => SqlValue::Text(s.clone()),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        JsonValue::Bool(b) => SqlValue::Integer(*b as i64),
        JsonValue::Null => SqlValue::Null,
        other => SqlValue::Text(serde_json::to_string(other).unwrap_or_default()),
    }
}

/// Text form of a JSON value as CAST(... AS TEXT) produces it.
fn as_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        JsonValue::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

// SQLite's lower() folds ASCII only; mirror that so both paths agree.
fn lower_text(value: &JsonValue) -> String {
    as_text(value).to_ascii_lowercase()
}

fn needle(value: &JsonValue) -> String {
    as_text(value).to_ascii_lowercase()
}

fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::String(x), JsonValue::String(y)) => x == y,
        _ => match (scalar_num(a), scalar_num(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

fn scalar_num(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::Bool(b) => Some(*b as i64 as f64),
        _ => None,
    }
}

/// CAST(x AS REAL) in SQLite parses the longest numeric prefix and yields
/// 0.0 when there is none; mirror that here.
fn coerce_numeric(value: &JsonValue) -> f64 {
    match value {
        JsonValue::Number(n) => n.as_f64().unwrap_or(0.0),
        JsonValue::Bool(b) => *b as i64 as f64,
        JsonValue::String(s) => numeric_prefix(s),
        _ => 0.0,
    }
}

fn numeric_prefix(s: &str) -> f64 {
    let t = s.trim_start();
    let b = t.as_bytes();
    let mut i = 0;
    if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
        i += 1;
    }
    let digits_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    if i < b.len() && b[i] == b'.' {
        i += 1;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i > digits_start && i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    t[..i].parse().unwrap_or(0.0)
}
