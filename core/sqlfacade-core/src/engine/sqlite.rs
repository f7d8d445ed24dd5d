//! The SQLite reference engine adapter (spec.md §4.6): connection setup,
//! the `Databases` metadata table, query marshalling, and schema-name-driven
//! attach/detach — behind the [`SqlEngine`] trait.
//!
//! rusqlite's `ATTACH` support is connection-wide rather than per-file, so a
//! single [`rusqlite::Connection`] backs the metadata database *and* every
//! attached managed database; `Mutex` serializes access since `Connection`
//! is `Send` but not `Sync`.

use crate::bytes::Bytes;
use crate::engine::vtable::{quote_bytes_literal, quote_string_literal, SqlEngine};
use crate::error::{DbxError, DbxResult};
use crate::result::DbResult;
use crate::types::{owning_descriptor_for, TypeKind, Value};
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Raised attached-database limit (spec.md §4.6 step 2).
const MAX_ATTACHED: i32 = 125;

pub struct SqliteEngine {
    conn: Mutex<Connection>,
    root: PathBuf,
    /// Appended to every database file/schema name, per spec.md §3's
    /// `db_instance` global (threaded in here via [`crate::config::DbConfig`]
    /// rather than a process mutable, per DESIGN NOTES item 4).
    db_instance: String,
}

fn instance_name(base: &str, db_instance: &str) -> String {
    if db_instance.is_empty() {
        base.to_string()
    } else {
        format!("{base}[{db_instance}]")
    }
}

impl SqliteEngine {
    /// Open (or create) the metadata database at `<path>/main[<db_instance>]`
    /// and attach every row of its `Databases` table (spec.md §4.6 steps
    /// 1-4).
    #[instrument(skip(path, db_instance))]
    pub fn open(path: &Path, db_instance: &str) -> DbxResult<Self> {
        std::fs::create_dir_all(path)?;
        let main_file = path.join(instance_name("main", db_instance));
        info!(path = %main_file.display(), "opening sqlfacade metadata database");
        let conn = Connection::open(&main_file)?;
        conn.execute_batch("PRAGMA extended_result_codes = ON;")?;
        conn.set_limit(rusqlite::limits::Limit::SQLITE_LIMIT_ATTACHED, MAX_ATTACHED);
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS Databases (
                name varchar(40) PRIMARY KEY,
                type varchar(40),
                connection blob
            );",
        )?;
        let engine = SqliteEngine {
            conn: Mutex::new(conn),
            root: path.to_path_buf(),
            db_instance: db_instance.to_string(),
        };
        engine.attach_all_sqlite_databases()?;
        Ok(engine)
    }

    /// An unattached, in-memory engine for unit tests that exercise SQL
    /// generation without touching the filesystem.
    pub fn open_memory() -> DbxResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(SqliteEngine {
            conn: Mutex::new(conn),
            root: PathBuf::new(),
            db_instance: String::new(),
        })
    }

    fn attach_all_sqlite_databases(&self) -> DbxResult<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT name, connection FROM Databases WHERE type = 'sqlite'")?;
        let rows: Vec<(String, Vec<u8>)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        for (name, connection) in rows {
            let path = String::from_utf8_lossy(&connection).into_owned();
            let schema = instance_name(&name, &self.db_instance);
            conn.execute(&format!("ATTACH '{path}' AS \"{schema}\""), [])?;
        }
        Ok(())
    }

    fn schema_for(&self, db: &str) -> String {
        instance_name(db, &self.db_instance)
    }

    fn file_for(&self, db: &str) -> PathBuf {
        self.root.join(instance_name(db, &self.db_instance))
    }

    fn marshal_rows(stmt: &mut rusqlite::Statement<'_>) -> DbxResult<DbResult> {
        let column_count = stmt.column_count();
        let column_names: Vec<String> = (0..column_count)
            .map(|i| stmt.column_name(i).unwrap_or("").to_string())
            .collect();
        // Computed from the statement's declared column types so a
        // zero-row result still reports correct field arity/types; used
        // only if no row arrives to infer types from directly.
        let declared_field_types: Vec<Option<&'static crate::types::TypeDescriptor>> = (0..column_count)
            .map(|i| {
                let kind = super::database::sql_type_name_to_kind(stmt.column_decltype(i).unwrap_or(""));
                Some(owning_descriptor_for(kind))
            })
            .collect();

        let mut rows = stmt.query([])?;
        let mut result: Option<DbResult> = None;
        let mut successful = false;

        loop {
            match rows.next()? {
                None => {
                    successful = true;
                    break;
                }
                Some(row) => {
                    if result.is_none() {
                        let mut field_types = Vec::with_capacity(column_count);
                        for i in 0..column_count {
                            let kind = sqlite_type_to_kind(row.get_ref(i)?);
                            field_types.push(Some(owning_descriptor_for(kind)));
                        }
                        result = Some(DbResult::new(column_names.clone(), field_types));
                    }
                    let r = result.as_mut().unwrap();
                    let mut cells = Vec::with_capacity(column_count);
                    for i in 0..column_count {
                        cells.push(cell_from_sqlite(row.get_ref(i)?));
                    }
                    r.push_row(cells);
                }
            }
        }

        let mut result = result.unwrap_or_else(|| DbResult::new(column_names, declared_field_types));
        result.successful = successful;
        Ok(result)
    }
}

fn sqlite_type_to_kind(v: ValueRef<'_>) -> TypeKind {
    match v {
        ValueRef::Integer(_) => TypeKind::I64,
        ValueRef::Real(_) => TypeKind::F64,
        ValueRef::Text(_) => TypeKind::String,
        ValueRef::Blob(_) => TypeKind::Bytes,
        ValueRef::Null => TypeKind::Bytes,
    }
}

fn cell_from_sqlite(v: ValueRef<'_>) -> Option<Arc<Value>> {
    match v {
        ValueRef::Integer(n) => Some(Arc::new(Value::I64(n))),
        ValueRef::Real(f) => Some(Arc::new(Value::F64(f))),
        ValueRef::Text(t) => Some(Arc::new(Value::String(Bytes::from(String::from_utf8_lossy(t).as_ref())))),
        ValueRef::Blob(b) => Some(Arc::new(Value::Bytes(Bytes::from(b)))),
        ValueRef::Null => Some(Arc::new(Value::Bytes(Bytes::new()))),
    }
}

impl SqlEngine for SqliteEngine {
    fn query_bytes(&self, db: &str, sql: &[u8]) -> DbxResult<DbResult> {
        let text = std::str::from_utf8(sql)
            .map_err(|e| DbxError::BlobDecode(format!("query bytes not valid utf-8: {e}")))?;
        self.query_string(db, text)
    }

    fn schema_name(&self, db: &str) -> String {
        self.schema_for(db)
    }

    #[instrument(skip(self, sql))]
    fn query_string(&self, _db: &str, sql: &str) -> DbxResult<DbResult> {
        let conn = self.conn.lock();
        let mut stmt = match conn.prepare(sql) {
            Ok(stmt) => stmt,
            Err(e) => {
                warn!(error = %e, sql, "engine query failed to prepare");
                return Err(DbxError::from(e));
            }
        };
        Self::marshal_rows(&mut stmt)
    }

    fn describe_table(&self, db: &str, table: &str) -> DbxResult<DbResult> {
        let schema = self.schema_for(db);
        let sql = format!("PRAGMA \"{schema}\".table_info(\"{table}\")");
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut result = DbResult::new(
            vec!["fieldName".to_string(), "typeInfo".to_string(), "primaryKey".to_string()],
            vec![Some(&crate::types::STRING), Some(&crate::types::STRING), Some(&crate::types::STRING)],
        );
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            let native_type: String = row.get(2)?;
            let pk: i64 = row.get(5)?;
            result.push_row(vec![
                Some(Arc::new(Value::String(Bytes::from(name.as_str())))),
                Some(Arc::new(Value::String(Bytes::from(native_type.as_str())))),
                Some(Arc::new(Value::String(Bytes::from(if pk != 0 { "true" } else { "false" })))),
            ]);
        }
        result.successful = true;
        Ok(result)
    }

    fn make_string_literal(&self, s: &str) -> String {
        quote_string_literal(s)
    }

    fn make_bytes_literal(&self, data: &[u8]) -> String {
        quote_bytes_literal(data)
    }

    fn begin(&self, _db: &str) -> DbxResult<()> {
        self.conn.lock().execute_batch("BEGIN;")?;
        Ok(())
    }

    fn commit(&self, _db: &str) -> DbxResult<()> {
        self.conn.lock().execute_batch("COMMIT;")?;
        Ok(())
    }

    fn rollback(&self, _db: &str) -> DbxResult<()> {
        self.conn.lock().execute_batch("ROLLBACK;")?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn add_database(&self, name: &str) -> DbxResult<()> {
        let file = self.file_for(name);
        let schema = self.schema_for(name);
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO Databases (name, type, connection) VALUES (?1, 'sqlite', ?2)",
            rusqlite::params![name, file.to_string_lossy().as_ref()],
        )?;
        conn.execute(&format!("ATTACH '{}' AS \"{schema}\"", file.display()), [])?;
        info!(database = name, "attached managed database");
        Ok(())
    }

    fn delete_database(&self, name: &str) -> DbxResult<()> {
        let schema = self.schema_for(name);
        let file = self.file_for(name);
        let conn = self.conn.lock();
        conn.execute("DELETE FROM Databases WHERE name = ?1", rusqlite::params![name])?;
        conn.execute(&format!("DETACH \"{schema}\""), [])?;
        drop(conn);
        if file.exists() {
            std::fs::remove_file(&file)?;
        }
        Ok(())
    }

    fn rename_database(&self, old_name: &str, new_name: &str) -> DbxResult<()> {
        let old_schema = self.schema_for(old_name);
        let new_schema = self.schema_for(new_name);
        let old_file = self.file_for(old_name);
        let new_file = self.file_for(new_name);

        let result: DbxResult<()> = (|| {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO Databases (name, type, connection) VALUES (?1, 'sqlite', ?2)",
                rusqlite::params![new_name, new_file.to_string_lossy().as_ref()],
            )?;
            conn.execute(&format!("DETACH \"{old_schema}\""), [])?;
            drop(conn);
            std::fs::rename(&old_file, &new_file)?;
            let conn = self.conn.lock();
            conn.execute(&format!("ATTACH '{}' AS \"{new_schema}\"", new_file.display()), [])?;
            conn.execute("DELETE FROM Databases WHERE name = ?1", rusqlite::params![old_name])?;
            Ok(())
        })();

        if let Err(ref e) = result {
            warn!(error = %e, "rename_database failed, leaving prior state");
        }
        result
    }

    fn get_num_records(&self, db: &str, table: &str) -> DbxResult<u64> {
        let schema = self.schema_for(db);
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM \"{schema}\".\"{table}\""), [], |r| r.get(0))?;
        Ok(count as u64)
    }

    fn get_size(&self, db: &str, _table: &str) -> DbxResult<u64> {
        let schema = self.schema_for(db);
        let conn = self.conn.lock();
        let page_count: i64 = conn.query_row(&format!("PRAGMA \"{schema}\".page_count"), [], |r| r.get(0))?;
        let page_size: i64 = conn.query_row(&format!("PRAGMA \"{schema}\".page_size"), [], |r| r.get(0))?;
        Ok((page_count * page_size) as u64)
    }

    fn disconnect(&self) -> DbxResult<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("PRAGMA database_list")?;
        let schemas: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        for schema in schemas {
            if schema == "main" || schema == "temp" {
                continue;
            }
            conn.execute_batch(&format!("PRAGMA \"{schema}\".optimize;"))?;
            conn.execute(&format!("DETACH \"{schema}\""), [])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_databases_table() {
        let dir = tempdir().unwrap();
        let engine = SqliteEngine::open(dir.path(), "").unwrap();
        let r = engine.query_string("main", "SELECT name FROM Databases").unwrap();
        assert!(r.successful);
        assert_eq!(r.num_results(), 0);
    }

    #[test]
    fn add_database_attaches_and_is_queryable() {
        let dir = tempdir().unwrap();
        let engine = SqliteEngine::open(dir.path(), "").unwrap();
        engine.add_database("app").unwrap();
        engine
            .query_string("app", "CREATE TABLE app.users (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        engine
            .query_string("app", "INSERT INTO app.users VALUES (1, 'alice')")
            .unwrap();
        let r = engine.query_string("app", "SELECT id, name FROM app.users").unwrap();
        assert_eq!(r.num_results(), 1);
    }

    #[test]
    fn describe_table_reports_primary_key() {
        let dir = tempdir().unwrap();
        let engine = SqliteEngine::open(dir.path(), "").unwrap();
        engine.add_database("app").unwrap();
        engine
            .query_string("app", "CREATE TABLE app.users (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        let desc = engine.describe_table("app", "users").unwrap();
        assert_eq!(desc.num_results(), 2);
        let pk = desc.get_by_name(1, "primaryKey").unwrap();
        assert_eq!(crate::types::value::to_string(&pk), "true");
    }

    #[test]
    fn db_instance_suffix_is_applied_to_schema_and_file() {
        let dir = tempdir().unwrap();
        let engine = SqliteEngine::open(dir.path(), "shard1").unwrap();
        assert!(dir.path().join("main[shard1]").exists());
        engine.add_database("app").unwrap();
        assert!(dir.path().join("app[shard1]").exists());
    }
}
