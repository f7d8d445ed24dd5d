//! Copy-and-rename schema evolution (spec.md §4.7): the algorithm SQLite's
//! lack of in-place column operations forces `add_field` and
//! `change_field_type` to share.

use super::database::FieldSpec;
use super::sql_builder::literal;
use super::vtable::SqlEngine;
use crate::error::{DbxError, DbxResult};
use crate::types::value;

/// Run the seven-step algorithm (spec.md §4.7) against `table`, replacing
/// its field list with `target_fields` (already reflecting the add/modify)
/// and `primary_key` (comma-joined field names).
///
/// `default_for` names a field (normally the newly added one) whose values
/// in every migrated row should be the type's "create" default rather than
/// the value copied from the original table — the original table has no
/// column to copy from for a brand-new field.
pub(crate) fn copy_and_rename(
    engine: &dyn SqlEngine,
    db: &str,
    table: &str,
    target_fields: &[FieldSpec],
    primary_key: &str,
    default_for: Option<&str>,
) -> DbxResult<()> {
    let temp_table = format!("TEMP{table}TEMP");

    let run = || -> DbxResult<()> {
        engine.begin(db)?;
        let schema = engine.schema_name(db);

        let original_fields: Vec<&FieldSpec> = target_fields
            .iter()
            .filter(|f| default_for != Some(f.name.as_str()))
            .collect();
        let select_list: Vec<&str> = original_fields.iter().map(|f| f.name.as_str()).collect();
        let rows = if select_list.is_empty() {
            engine.query_string(db, &format!("SELECT * FROM {schema}.{table} WHERE 0"))?
        } else {
            engine.query_string(db, &format!("SELECT {} FROM {schema}.{table}", select_list.join(", ")))?
        };

        let column_defs: Vec<String> = target_fields.iter().map(|f| format!("{} {}", f.name, f.to_ddl())).collect();
        let mut create_sql = format!("CREATE TABLE {schema}.{temp_table} ({}", column_defs.join(", "));
        if !primary_key.is_empty() {
            create_sql.push_str(&format!(", PRIMARY KEY ({primary_key})"));
        }
        create_sql.push(')');
        engine.query_string(db, &create_sql)?;

        for row_idx in 0..rows.num_results() {
            let mut values = Vec::with_capacity(target_fields.len());
            for field in target_fields {
                if default_for == Some(field.name.as_str()) {
                    values.push(literal(engine, &value::create(field.kind, None)));
                } else {
                    let cell = rows.get_by_name(row_idx + 1, &field.name)?;
                    values.push(literal(engine, &cell));
                }
            }
            let sql = format!(
                "INSERT INTO {schema}.{temp_table} VALUES ({})",
                values.join(", ")
            );
            engine.query_string(db, &sql)?;
        }

        engine.query_string(db, &format!("DROP TABLE {schema}.{table}"))?;
        engine.query_string(db, &format!("ALTER TABLE {schema}.{temp_table} RENAME TO {table}"))?;
        engine.commit(db)?;
        Ok(())
    };

    match run() {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = engine.rollback(db);
            Err(DbxError::SchemaEvolution(format!("copy-and-rename on {db}.{table} failed: {e}")))
        }
    }
}
