//! The per-engine driver boundary (spec.md §4.4, DESIGN NOTES item 1): the
//! Rust trait replacing the C `SqlDatabase` function-pointer table.
//!
//! `Database` (in [`super::database`]) depends only on this trait — never on
//! `SqliteEngine` directly — so adding a second engine is a matter of
//! implementing [`SqlEngine`], not touching the façade.

use crate::error::DbxResult;
use crate::result::DbResult;

/// Concrete per-engine capabilities the façade dispatches through.
///
/// # Contract
///
/// - `query_bytes`/`query_string`: execute a statement and marshal every row
///   into a [`DbResult`]; `successful` is set only once the statement runs
///   to completion.
/// - `describe_table`: project the engine's native schema introspection into
///   the 3-column `(fieldName, typeInfo, primaryKey)` shape spec.md §4.4
///   requires of the façade.
/// - `make_string_literal`/`make_bytes_literal`: dialect-specific literal
///   quoting, used by the SQL-text builder.
/// - `compare`: structural comparison hook engines may override (kept for
///   vtable parity; the default descriptor-driven comparator in
///   [`crate::types::value::compare`] is used unless an engine needs
///   collation-specific behavior).
pub trait SqlEngine: Send + Sync {
    /// Execute a statement built as a `Bytes` payload (used internally by
    /// bytes-table round-tripping) and marshal the result.
    fn query_bytes(&self, db: &str, sql: &[u8]) -> DbxResult<DbResult>;

    /// Execute a statement given as UTF-8 SQL text.
    fn query_string(&self, db: &str, sql: &str) -> DbxResult<DbResult>;

    /// The schema name `db` is actually attached under, folding in any
    /// engine-level `db_instance` suffix (spec.md §3). SQL text built by
    /// [`super::sql_builder`] must qualify identifiers with this, not `db`
    /// itself, or a non-empty `db_instance` silently misroutes every query.
    fn schema_name(&self, db: &str) -> String;

    /// Native schema introspection for `db.table`, projected to
    /// `(fieldName, typeInfo, primaryKey)`.
    fn describe_table(&self, db: &str, table: &str) -> DbxResult<DbResult>;

    /// Wrap a string literal per this engine's quoting rules.
    fn make_string_literal(&self, s: &str) -> String;

    /// Wrap a byte literal per this engine's quoting rules.
    fn make_bytes_literal(&self, data: &[u8]) -> String;

    /// Begin a transaction at the engine level (called at the 0→1 edge of
    /// the façade's recursive transaction counter, spec.md §5).
    fn begin(&self, db: &str) -> DbxResult<()>;

    /// Commit the currently open transaction (1→0 edge).
    fn commit(&self, db: &str) -> DbxResult<()>;

    /// Roll back the currently open transaction.
    fn rollback(&self, db: &str) -> DbxResult<()>;

    /// Attach a new managed database by name, creating its backing file if
    /// absent.
    fn add_database(&self, name: &str) -> DbxResult<()>;

    /// Detach and delete a managed database's backing file.
    fn delete_database(&self, name: &str) -> DbxResult<()>;

    /// Detach `old_name`, rename its backing file, and re-attach as
    /// `new_name`. Implementations must leave the engine in its prior state
    /// on any step failure.
    fn rename_database(&self, old_name: &str, new_name: &str) -> DbxResult<()>;

    fn get_num_records(&self, db: &str, table: &str) -> DbxResult<u64>;

    fn get_size(&self, db: &str, table: &str) -> DbxResult<u64>;

    /// Optimize and detach every managed database before the façade drops
    /// its engine handle (spec.md §4.6's disconnect sequence).
    fn disconnect(&self) -> DbxResult<()>;
}

/// Dialect-neutral quoting shared by every engine (spec.md §4.4): single
/// quotes doubled, result wrapped in single quotes.
pub fn quote_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Dialect-neutral hex blob literal: `x'<HEX>'`.
pub fn quote_bytes_literal(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2 + 3);
    out.push_str("x'");
    for byte in data {
        out.push_str(&format!("{byte:02X}"));
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_literal_doubles_embedded_quotes() {
        assert_eq!(quote_string_literal("O'Hara"), "'O''Hara'");
    }

    #[test]
    fn bytes_literal_is_hex_wrapped() {
        assert_eq!(quote_bytes_literal(&[0xDE, 0xAD, 0xBE, 0xEF]), "x'DEADBEEF'");
    }
}
