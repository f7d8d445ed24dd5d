//! Dialect-neutral SQL text generation (spec.md §4.4).
//!
//! Every builder here takes an `&dyn SqlEngine` purely for literal quoting
//! (`make_string_literal`/`make_bytes_literal` are the only engine-specific
//! steps in otherwise-generic template assembly) and returns owned SQL text
//! for the façade to hand to [`super::vtable::SqlEngine::query_string`].
//!
//! Per DESIGN NOTES item 5, the C "variadic NULL-terminated argument list"
//! surface is replaced everywhere with an ordered `&[(&str, &Value)]` slice;
//! a `NULL`-valued entry (`Value::Null`) renders as the unquoted SQL `NULL`.

use crate::engine::vtable::SqlEngine;
use crate::types::Value;

pub(crate) fn literal(engine: &dyn SqlEngine, v: &Value) -> String {
    match v {
        Value::Null => "NULL".to_string(),
        Value::String(b) | Value::StringCi(b) => engine.make_string_literal(&b.as_str_lossy()),
        Value::Bytes(b) => engine.make_bytes_literal(b.payload()),
        other => crate::types::value::to_string(other),
    }
}

fn qualify(engine: &dyn SqlEngine, db: &str, table: &str) -> String {
    format!("{}.{table}", engine.schema_name(db))
}

fn where_clause(engine: &dyn SqlEngine, pairs: &[(&str, &Value)], op: &str, joiner: &str) -> String {
    let clauses: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{k}{op}{}", literal(engine, v)))
        .collect();
    clauses.join(joiner)
}

/// `SELECT select FROM db.table WHERE k1=v1 AND k2=v2 ... [ORDER BY order_by]`.
pub fn get_values_vargs(
    engine: &dyn SqlEngine,
    db: &str,
    table: &str,
    select: &str,
    order_by: Option<&str>,
    pairs: &[(&str, &Value)],
) -> String {
    let mut sql = format!("SELECT {select} FROM {}", qualify(engine, db, table));
    if !pairs.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clause(engine, pairs, "=", " AND "));
    }
    if let Some(order_by) = order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
    sql
}

/// `get_values_vargs` without an `ORDER BY` clause — a convenience wrapper
/// grounded in `examples/original_source/src/DbClientLib.c`'s `get_values`.
pub fn get_values(engine: &dyn SqlEngine, db: &str, table: &str, select: &str, pairs: &[(&str, &Value)]) -> String {
    get_values_vargs(engine, db, table, select, None, pairs)
}

/// Same shape as [`get_values_vargs`], with `=` replaced by `LIKE`.
pub fn get_values_like_vargs(
    engine: &dyn SqlEngine,
    db: &str,
    table: &str,
    select: &str,
    order_by: Option<&str>,
    pairs: &[(&str, &Value)],
) -> String {
    let mut sql = format!("SELECT {select} FROM {}", qualify(engine, db, table));
    if !pairs.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clause(engine, pairs, " LIKE ", " AND "));
    }
    if let Some(order_by) = order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
    sql
}

/// Same predicate shape as [`get_values_vargs`] but `OR`-joined.
pub fn get_or_values_dict(
    engine: &dyn SqlEngine,
    db: &str,
    table: &str,
    select: &str,
    pairs: &[(&str, &Value)],
) -> String {
    let mut sql = format!("SELECT {select} FROM {}", qualify(engine, db, table));
    if !pairs.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clause(engine, pairs, "=", " OR "));
    }
    sql
}

/// Alias for `get_values_vargs(select = "*")` — kept distinct because S1 in
/// spec.md §8 calls `get_records` directly.
pub fn get_records(engine: &dyn SqlEngine, db: &str, table: &str, pairs: &[(&str, &Value)]) -> String {
    get_values_vargs(engine, db, table, "*", None, pairs)
}

pub fn get_records_vargs(
    engine: &dyn SqlEngine,
    db: &str,
    table: &str,
    order_by: Option<&str>,
    pairs: &[(&str, &Value)],
) -> String {
    get_values_vargs(engine, db, table, "*", order_by, pairs)
}

/// `INSERT INTO db.table VALUES (v1, v2, ...)` — positional, ordered by the
/// table's own column order.
pub fn add_record_vargs(engine: &dyn SqlEngine, db: &str, table: &str, values: &[&Value]) -> String {
    let rendered: Vec<String> = values.iter().map(|v| literal(engine, v)).collect();
    format!("INSERT INTO {} VALUES ({})", qualify(engine, db, table), rendered.join(", "))
}

/// `INSERT INTO db.table (k1,k2,...) VALUES (v1,v2,...)`.
pub fn add_record_dict(engine: &dyn SqlEngine, db: &str, table: &str, pairs: &[(&str, &Value)]) -> String {
    let names: Vec<&str> = pairs.iter().map(|(k, _)| *k).collect();
    let values: Vec<String> = pairs.iter().map(|(_, v)| literal(engine, v)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualify(engine, db, table),
        names.join(", "),
        values.join(", ")
    )
}

/// The bulk-insert-then-per-row-fallback policy for `add_records` (spec.md
/// §7): a bulk multi-row `INSERT` statement for every dict sharing the same
/// column set.
pub fn add_records_bulk(engine: &dyn SqlEngine, db: &str, table: &str, rows: &[Vec<(&str, &Value)>]) -> Option<String> {
    let first = rows.first()?;
    let names: Vec<&str> = first.iter().map(|(k, _)| *k).collect();
    let mut value_groups = Vec::with_capacity(rows.len());
    for row in rows {
        let values: Vec<String> = row.iter().map(|(_, v)| literal(engine, v)).collect();
        value_groups.push(format!("({})", values.join(", ")));
    }
    Some(format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualify(engine, db, table),
        names.join(", "),
        value_groups.join(", ")
    ))
}

/// Per-row fallback statement for one row of `add_records`'s bulk failure
/// path: ignores duplicate-key errors so best-effort insertion can proceed.
pub fn add_record_dict_or_ignore(engine: &dyn SqlEngine, db: &str, table: &str, pairs: &[(&str, &Value)]) -> String {
    let names: Vec<&str> = pairs.iter().map(|(k, _)| *k).collect();
    let values: Vec<String> = pairs.iter().map(|(_, v)| literal(engine, v)).collect();
    format!(
        "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
        qualify(engine, db, table),
        names.join(", "),
        values.join(", ")
    )
}

/// `UPDATE db.table SET k=v,... WHERE <primary-key equality>`.
pub fn update_record_dict(
    engine: &dyn SqlEngine,
    db: &str,
    table: &str,
    set_pairs: &[(&str, &Value)],
    key_pairs: &[(&str, &Value)],
) -> String {
    let assignments: Vec<String> = set_pairs
        .iter()
        .map(|(k, v)| format!("{k}={}", literal(engine, v)))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {}",
        qualify(engine, db, table),
        assignments.join(", "),
        where_clause(engine, key_pairs, "=", " AND ")
    )
}

/// `DELETE FROM db.table WHERE k1=v1 AND k2=v2 ...`.
pub fn delete_records_vargs(engine: &dyn SqlEngine, db: &str, table: &str, pairs: &[(&str, &Value)]) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        qualify(engine, db, table),
        where_clause(engine, pairs, "=", " AND ")
    )
}

/// Same as [`delete_records_vargs`] with `LIKE` predicates.
pub fn delete_records_like_vargs(engine: &dyn SqlEngine, db: &str, table: &str, pairs: &[(&str, &Value)]) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        qualify(engine, db, table),
        where_clause(engine, pairs, " LIKE ", " AND ")
    )
}

/// `UPDATE db.table SET ... WHERE <primary-key>=<value-from-row>`, used by
/// `update_result_vargs` once the row's primary-key value has been read out
/// of the `DbResult` it came from.
pub fn update_result_vargs(
    engine: &dyn SqlEngine,
    db: &str,
    table: &str,
    primary_key_field: &str,
    primary_key_value: &Value,
    set_pairs: &[(&str, &Value)],
) -> String {
    update_record_dict(engine, db, table, set_pairs, &[(primary_key_field, primary_key_value)])
}

/// `CREATE INDEX IF NOT EXISTS <table>_<f1>_<f2>..._idx ON db.table(f1,f2,...)`.
/// Open Question #2 (spec.md §9): the index name is a naive underscore join
/// and may collide with a real column name; this builder does not guard
/// against that, matching the original.
pub fn create_index_if_not_exists(engine: &dyn SqlEngine, db: &str, table: &str, fields: &[&str]) -> (String, String) {
    let index_name = format!("{table}_{}_idx", fields.join("_"));
    let sql = format!(
        "CREATE INDEX IF NOT EXISTS {index_name} ON {}({})",
        qualify(engine, db, table),
        fields.join(", ")
    );
    (index_name, sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sqlite::SqliteEngine;

    fn test_engine() -> SqliteEngine {
        SqliteEngine::open_memory().unwrap()
    }

    #[test]
    fn get_values_vargs_builds_and_clause_with_order_by() {
        let engine = test_engine();
        let id = Value::I64(1);
        let sql = get_values_vargs(&engine, "app", "users", "*", Some("id"), &[("id", &id)]);
        assert_eq!(sql, "SELECT * FROM app.users WHERE id=1 ORDER BY id");
    }

    #[test]
    fn get_values_like_vargs_uses_like() {
        let engine = test_engine();
        let name = Value::String(crate::bytes::Bytes::from("al%"));
        let sql = get_values_like_vargs(&engine, "app", "users", "*", None, &[("name", &name)]);
        assert_eq!(sql, "SELECT * FROM app.users WHERE name LIKE 'al%'");
    }

    #[test]
    fn add_record_dict_quotes_strings() {
        let engine = test_engine();
        let name = Value::String(crate::bytes::Bytes::from("O'Hara"));
        let id = Value::I64(1);
        let sql = add_record_dict(&engine, "app", "users", &[("id", &id), ("name", &name)]);
        assert_eq!(sql, "INSERT INTO app.users (id, name) VALUES (1, 'O''Hara')");
    }

    #[test]
    fn null_value_renders_unquoted_null() {
        let engine = test_engine();
        let null = Value::Null;
        let sql = add_record_dict(&engine, "app", "users", &[("note", &null)]);
        assert_eq!(sql, "INSERT INTO app.users (note) VALUES (NULL)");
    }

    #[test]
    fn delete_records_vargs_ands_predicates() {
        let engine = test_engine();
        let a = Value::I64(1);
        let b = Value::I64(2);
        let sql = delete_records_vargs(&engine, "app", "t", &[("a", &a), ("b", &b)]);
        assert_eq!(sql, "DELETE FROM app.t WHERE a=1 AND b=2");
    }

    #[test]
    fn bulk_insert_shares_one_column_list() {
        let engine = test_engine();
        let one = Value::I64(1);
        let two = Value::I64(2);
        let rows = vec![vec![("id", &one)], vec![("id", &two)]];
        let sql = add_records_bulk(&engine, "app", "t", &rows).unwrap();
        assert_eq!(sql, "INSERT INTO app.t (id) VALUES (1), (2)");
    }

    #[test]
    fn index_name_is_naive_underscore_join() {
        let engine = test_engine();
        let (name, sql) = create_index_if_not_exists(&engine, "app", "users", &["first", "last"]);
        assert_eq!(name, "users_first_last_idx");
        assert!(sql.contains("ON app.users(first, last)"));
    }
}
