//! Scan query construction
//!
//! Builds the parameterized `SELECT` of one bounded scan, including the
//! composite-key resume predicate: for cursor columns `c0..cN-1` and a prior
//! key `v0..vN-1`, the OR of `(c0 = v0 AND .. AND c(i-1) = v(i-1) AND ci > vi)`
//! for every `i`. That is the "next row after this tuple" condition, so rows
//! sharing a prefix with the key are neither skipped nor repeated.

use crate::state::CursorValue;
use crate::types::quote_identifier;
use duckdb::types::Value as SqlValue;

/// A query plus its positional parameters, limit last
#[derive(Debug, Clone, PartialEq)]
pub struct ScanQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Resume predicate and its parameters, `None` for an empty key
pub fn resume_predicate(
    cursor_columns: &[String],
    cursor_key: &[CursorValue],
) -> Option<(String, Vec<SqlValue>)> {
    if cursor_key.is_empty() {
        return None;
    }

    let quoted: Vec<String> = cursor_columns.iter().map(|c| quote_identifier(c)).collect();
    let mut clauses = Vec::with_capacity(cursor_key.len());
    let mut params = Vec::new();

    for i in 0..cursor_key.len() {
        let mut terms: Vec<String> = quoted[..i].iter().map(|c| format!("{c} = ?")).collect();
        terms.push(format!("{} > ?", quoted[i]));
        clauses.push(format!("({})", terms.join(" AND ")));

        params.extend(cursor_key[..=i].iter().map(CursorValue::to_sql_value));
    }

    Some((format!("({})", clauses.join(" OR ")), params))
}

/// Build the query of one bounded scan
///
/// `table` must already be a quoted (possibly qualified) reference. The key,
/// when non-empty, must have one value per cursor column.
pub fn build_scan_query(
    table: &str,
    cursor_columns: &[String],
    data_columns: &[String],
    cursor_key: &[CursorValue],
    limit: u64,
) -> ScanQuery {
    let select: Vec<String> = cursor_columns
        .iter()
        .chain(data_columns)
        .map(|c| quote_identifier(c))
        .collect();
    let order_by: Vec<String> = cursor_columns.iter().map(|c| quote_identifier(c)).collect();

    let (where_clause, mut params) = match resume_predicate(cursor_columns, cursor_key) {
        Some((predicate, params)) => (format!(" WHERE {predicate}"), params),
        None => (String::new(), Vec::new()),
    };
    params.push(SqlValue::BigInt(i64::try_from(limit).unwrap_or(i64::MAX)));

    let sql = format!(
        "SELECT {} FROM {table}{where_clause} ORDER BY {} LIMIT ?",
        select.join(", "),
        order_by.join(", ")
    );

    ScanQuery { sql, params }
}
