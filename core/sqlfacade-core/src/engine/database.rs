//! The `Database` façade (spec.md §4.4): the generic operational surface
//! that validates parameters, takes the appropriate lock, and dispatches
//! through a [`SqlEngine`] or a [`super::sql_builder`] SQL-text builder.
//!
//! Mirrors the teacher's struct-of-subsystems shape (`core/dbx-core/src/engine/database.rs`):
//! one `DatabaseInner` owns the engine handle plus every concurrency
//! primitive, and the public `Database` is a cheap `Arc` handle onto it so
//! cloning a façade for a new thread is just a refcount bump.

use super::ddl;
use super::sql_builder;
use super::sqlite::SqliteEngine;
use super::vtable::SqlEngine;
use crate::concurrency::{LockHandle, RecordLockHandle, RecordLocks, TableLocks, TransactionGuard, Transactions};
use crate::config::DbConfig;
use crate::error::{DbxError, DbxResult};
use crate::bytes::Bytes;
use crate::result::DbResult;
use crate::types::{value, TypeDescriptor, TypeKind};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A DDL column specification: a [`TypeKind`] plus, for `String` columns, an
/// optional `VARCHAR(n)` width (spec.md §4.4's "name TYPE or name
/// VARCHAR(n)").
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: TypeKind,
    pub varchar_len: Option<u32>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        FieldSpec {
            name: name.into(),
            kind,
            varchar_len: None,
        }
    }

    pub fn varchar(name: impl Into<String>, len: u32) -> Self {
        FieldSpec {
            name: name.into(),
            kind: TypeKind::String,
            varchar_len: Some(len),
        }
    }

    pub(crate) fn to_sql(&self) -> &'static str {
        match (self.kind, self.varchar_len) {
            (TypeKind::String, Some(_)) => "VARCHAR",
            (TypeKind::String, None) | (TypeKind::StringCi, _) => "TEXT",
            (TypeKind::Bytes, _) | (TypeKind::Null, _) => "BLOB",
            (TypeKind::F32, _) | (TypeKind::F64, _) => "REAL",
            _ => "INTEGER",
        }
    }

    pub(crate) fn to_ddl(&self) -> String {
        match (self.kind, self.varchar_len) {
            (TypeKind::String, Some(len)) => format!("VARCHAR({len})"),
            _ => self.to_sql().to_string(),
        }
    }
}

/// Native SQLite type-affinity string → `TypeKind`, used by `describe_table`
/// and the schema cache to recover a usable `TypeDescriptor` from a column's
/// declared type text (spec.md §4.4's `sql_type_name_to_type_descriptor`).
pub(crate) fn sql_type_name_to_kind(native: &str) -> TypeKind {
    let upper = native.to_ascii_uppercase();
    if upper.contains("INT") {
        TypeKind::I64
    } else if upper.contains("CHAR") || upper.contains("TEXT") || upper.contains("CLOB") {
        TypeKind::String
    } else if upper.contains("BLOB") || upper.is_empty() {
        TypeKind::Bytes
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        TypeKind::F64
    } else {
        TypeKind::Bytes
    }
}

pub(crate) struct DatabaseInner {
    pub(crate) engine: Box<dyn SqlEngine>,
    pub(crate) table_locks: TableLocks,
    record_locks: RecordLocks,
    transactions: Transactions,
    /// `(db, table) -> raw engine describe_table() output`, invalidated on
    /// every DDL operation (spec.md §4.4: "cache key is (db, table) and is
    /// invalidated on DDL").
    describe_cache: DashMap<(String, String), DbResult>,
    indexed_field_sets: Mutex<HashSet<String>>,
}

/// Engine-agnostic database façade (spec.md §3's "Database"). Cloning is a
/// cheap `Arc` bump; every clone shares the same engine connection, lock
/// dictionaries, and transaction counter.
#[derive(Clone)]
pub struct Database(pub(crate) Arc<DatabaseInner>);

impl Database {
    /// Open (or create) the database at `config.root`, matching spec.md
    /// §4.6 steps 1-4 via the SQLite engine adapter.
    #[instrument(skip(config))]
    pub fn init(config: DbConfig) -> DbxResult<Database> {
        info!(root = %config.root.display(), instance = %config.db_instance, "initializing database façade");
        let engine = SqliteEngine::open(&config.root, &config.db_instance)?;
        Ok(Database(Arc::new(DatabaseInner {
            engine: Box::new(engine),
            table_locks: TableLocks::new(),
            record_locks: RecordLocks::new(),
            transactions: Transactions::new(),
            describe_cache: DashMap::new(),
            indexed_field_sets: Mutex::new(HashSet::new()),
        })))
    }

    /// Build a façade around an arbitrary [`SqlEngine`] — used by tests and
    /// by any future non-SQLite adapter.
    pub fn with_engine(engine: Box<dyn SqlEngine>) -> Database {
        Database(Arc::new(DatabaseInner {
            engine,
            table_locks: TableLocks::new(),
            record_locks: RecordLocks::new(),
            transactions: Transactions::new(),
            describe_cache: DashMap::new(),
            indexed_field_sets: Mutex::new(HashSet::new()),
        }))
    }

    fn engine(&self) -> &dyn SqlEngine {
        self.0.engine.as_ref()
    }

    fn invalidate_describe_cache(&self, db: &str, table: &str) {
        self.0.describe_cache.remove(&(db.to_string(), table.to_string()));
    }

    // ---- Concurrency -----------------------------------------------------

    pub fn lock_tables(&self, tables: &[String]) -> DbxResult<LockHandle> {
        Ok(TableLocks::lock_tables_dict(&self.0, tables))
    }

    pub fn unlock_tables(&self, handle: LockHandle) {
        TableLocks::unlock_tables(&self.0, handle)
    }

    /// Block until no other thread holds `db.table` (spec.md §4.4's
    /// pre-mutation check), without itself claiming the lock or touching
    /// the engine transaction.
    pub fn wait_for_table_unlocked(&self, db: &str, table: &str) -> DbxResult<()> {
        let full_name = format!("{db}.{table}");
        TableLocks::wait_for_unlocked(&self.0, &full_name);
        Ok(())
    }

    pub fn lock_records(&self, db_name: &str, table_name: &str, fields: &[(&str, &crate::types::Value)]) -> RecordLockHandle {
        let key = RecordLocks::canonical_key(db_name, table_name, fields);
        self.0.record_locks.lock(key)
    }

    pub fn unlock_records(&self, handle: RecordLockHandle) {
        self.0.record_locks.unlock(handle)
    }

    pub fn start_transaction(&self, db: &str) -> DbxResult<()> {
        self.0.transactions.start(self.engine(), db)
    }

    pub fn commit_transaction(&self, db: &str) -> DbxResult<()> {
        self.0.transactions.commit(self.engine(), db)
    }

    pub fn rollback_transaction(&self, db: &str) -> DbxResult<()> {
        self.0.transactions.rollback(self.engine(), db)
    }

    pub fn transaction_depth(&self) -> u32 {
        self.0.transactions.depth()
    }

    /// A scoped transaction guard (DESIGN NOTES item 8): rolls back on drop
    /// unless `commit()`/`rollback()` was called explicitly.
    pub fn transaction<'a>(&'a self, db: &str) -> DbxResult<TransactionGuard<'a>> {
        self.start_transaction(db)?;
        Ok(TransactionGuard::new(self, db.to_string()))
    }

    // ---- Database management ----------------------------------------------

    pub fn add_database(&self, name: &str) -> DbxResult<()> {
        if name.is_empty() {
            return Err(DbxError::NullParameter("name".to_string()));
        }
        self.engine().add_database(name)
    }

    pub fn delete_database(&self, name: &str) -> DbxResult<()> {
        self.engine().delete_database(name)
    }

    pub fn rename_database(&self, old_name: &str, new_name: &str) -> DbxResult<()> {
        self.engine().rename_database(old_name, new_name)
    }

    /// Close the engine connection. Locks and per-thread state are dropped
    /// with `self`; there is nothing further to release explicitly.
    pub fn disconnect(self) -> DbxResult<()> {
        self.engine().disconnect()
    }

    // ---- Query generation (spec.md §4.4) ----------------------------------

    pub fn get_values(&self, db: &str, table: &str, select: &str, pairs: &[(&str, &crate::types::Value)]) -> DbxResult<DbResult> {
        let sql = sql_builder::get_values(self.engine(), db, table, select, pairs);
        self.run_select(db, table, &sql)
    }

    pub fn get_values_vargs(
        &self,
        db: &str,
        table: &str,
        select: &str,
        order_by: Option<&str>,
        pairs: &[(&str, &crate::types::Value)],
    ) -> DbxResult<DbResult> {
        let sql = sql_builder::get_values_vargs(self.engine(), db, table, select, order_by, pairs);
        self.run_select(db, table, &sql)
    }

    pub fn get_values_like_vargs(
        &self,
        db: &str,
        table: &str,
        select: &str,
        order_by: Option<&str>,
        pairs: &[(&str, &crate::types::Value)],
    ) -> DbxResult<DbResult> {
        let sql = sql_builder::get_values_like_vargs(self.engine(), db, table, select, order_by, pairs);
        self.run_select(db, table, &sql)
    }

    pub fn get_or_values_dict(&self, db: &str, table: &str, select: &str, pairs: &[(&str, &crate::types::Value)]) -> DbxResult<DbResult> {
        let sql = sql_builder::get_or_values_dict(self.engine(), db, table, select, pairs);
        self.run_select(db, table, &sql)
    }

    pub fn get_records(&self, db: &str, table: &str, pairs: &[(&str, &crate::types::Value)]) -> DbxResult<DbResult> {
        let sql = sql_builder::get_records(self.engine(), db, table, pairs);
        self.run_select(db, table, &sql)
    }

    pub fn get_records_vargs(&self, db: &str, table: &str, order_by: Option<&str>, pairs: &[(&str, &crate::types::Value)]) -> DbxResult<DbResult> {
        let sql = sql_builder::get_records_vargs(self.engine(), db, table, order_by, pairs);
        self.run_select(db, table, &sql)
    }

    fn run_select(&self, db: &str, table: &str, sql: &str) -> DbxResult<DbResult> {
        let mut result = self.engine().query_string(db, sql)?;
        result.finalize(db, table, Arc::downgrade(&self.0));
        Ok(result)
    }

    pub fn add_record_vargs(&self, db: &str, table: &str, values: &[&crate::types::Value]) -> DbxResult<()> {
        self.wait_for_table_unlocked(db, table)?;
        let sql = sql_builder::add_record_vargs(self.engine(), db, table, values);
        self.engine().query_string(db, &sql)?;
        Ok(())
    }

    pub fn add_record_dict(&self, db: &str, table: &str, pairs: &[(&str, &crate::types::Value)]) -> DbxResult<()> {
        self.wait_for_table_unlocked(db, table)?;
        let sql = sql_builder::add_record_dict(self.engine(), db, table, pairs);
        self.engine().query_string(db, &sql)?;
        Ok(())
    }

    /// Bulk-insert-then-per-row-fallback (spec.md §7): returns success only
    /// when the bulk statement succeeded.
    pub fn add_records(&self, db: &str, table: &str, rows: &[Vec<(&str, &crate::types::Value)>]) -> DbxResult<bool> {
        self.wait_for_table_unlocked(db, table)?;
        let Some(bulk_sql) = sql_builder::add_records_bulk(self.engine(), db, table, rows) else {
            return Ok(true);
        };
        match self.engine().query_string(db, &bulk_sql) {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!(error = %e, "bulk add_records failed, falling back to per-row INSERT OR IGNORE");
                for row in rows {
                    let sql = sql_builder::add_record_dict_or_ignore(self.engine(), db, table, row);
                    if let Err(e) = self.engine().query_string(db, &sql) {
                        warn!(error = %e, "per-row add_records fallback failed for one row");
                    }
                }
                Ok(false)
            }
        }
    }

    pub fn update_record_dict(
        &self,
        db: &str,
        table: &str,
        set_pairs: &[(&str, &crate::types::Value)],
        key_pairs: &[(&str, &crate::types::Value)],
    ) -> DbxResult<()> {
        self.wait_for_table_unlocked(db, table)?;
        let sql = sql_builder::update_record_dict(self.engine(), db, table, set_pairs, key_pairs);
        self.engine().query_string(db, &sql)?;
        Ok(())
    }

    /// `update_result_vargs` (spec.md §4.4): `result` must trace back to a
    /// real table with a known primary key.
    pub fn update_result(&self, result: &DbResult, row: usize, new_fields: &[(&str, &crate::types::Value)]) -> DbxResult<()> {
        if result.table_name.is_empty() || result.db_name.is_empty() {
            return Err(DbxError::NotUpdatable("result has no source table".to_string()));
        }
        let desc = self.describe_table(&result.db_name, &result.table_name)?;
        let mut pk_field = None;
        for i in 0..desc.num_results() {
            let is_pk = desc.get_by_name(i + 1, "primaryKey")?;
            if value::to_string(&is_pk) == "true" {
                pk_field = Some(value::to_string(&desc.get_by_name(i + 1, "fieldName")?));
                break;
            }
        }
        let pk_field = pk_field.ok_or_else(|| DbxError::NotUpdatable(format!("{}.{} has no primary key", result.db_name, result.table_name)))?;
        let pk_value = result.get_by_name(row + 1, &pk_field)?;
        self.wait_for_table_unlocked(&result.db_name, &result.table_name)?;
        let sql = sql_builder::update_result_vargs(self.engine(), &result.db_name, &result.table_name, &pk_field, &pk_value, new_fields);
        self.engine().query_string(&result.db_name, &sql)?;
        Ok(())
    }

    pub fn delete_records_vargs(&self, db: &str, table: &str, pairs: &[(&str, &crate::types::Value)]) -> DbxResult<()> {
        self.wait_for_table_unlocked(db, table)?;
        let sql = sql_builder::delete_records_vargs(self.engine(), db, table, pairs);
        self.engine().query_string(db, &sql)?;
        Ok(())
    }

    pub fn delete_records_like_vargs(&self, db: &str, table: &str, pairs: &[(&str, &crate::types::Value)]) -> DbxResult<()> {
        self.wait_for_table_unlocked(db, table)?;
        let sql = sql_builder::delete_records_like_vargs(self.engine(), db, table, pairs);
        self.engine().query_string(db, &sql)?;
        Ok(())
    }

    /// Create the named index the first time this field combination is
    /// queried (spec.md §4.4.a). Open Question #2: no collision guard.
    pub fn ensure_field_indexed_vargs(&self, db: &str, table: &str, fields: &[&str]) -> DbxResult<()> {
        let (index_name, sql) = sql_builder::create_index_if_not_exists(self.engine(), db, table, fields);
        let mut seen = self.0.indexed_field_sets.lock();
        if seen.contains(&index_name) {
            return Ok(());
        }
        self.engine().query_string(db, &sql)?;
        seen.insert(index_name);
        Ok(())
    }

    pub fn ensure_field_indexed(&self, db: &str, table: &str, field: &str) -> DbxResult<()> {
        self.ensure_field_indexed_vargs(db, table, &[field])
    }

    // ---- DDL ---------------------------------------------------------------

    pub fn add_table_list(&self, db: &str, table: &str, primary_key: &[String], fields: &[FieldSpec]) -> DbxResult<()> {
        self.wait_for_table_unlocked(db, table)?;
        let schema = self.engine().schema_name(db);
        let column_defs: Vec<String> = fields.iter().map(|f| format!("{} {}", f.name, f.to_ddl())).collect();
        let mut sql = format!("CREATE TABLE {schema}.{table} ({}", column_defs.join(", "));
        if !primary_key.is_empty() {
            sql.push_str(&format!(", PRIMARY KEY ({})", primary_key.join(", ")));
        }
        sql.push(')');
        self.engine().query_string(db, &sql)?;
        self.invalidate_describe_cache(db, table);
        Ok(())
    }

    fn current_fields_and_pk(&self, db: &str, table: &str) -> DbxResult<(Vec<FieldSpec>, Vec<String>)> {
        let desc = self.describe_table(db, table)?;
        let mut fields = Vec::with_capacity(desc.num_results());
        let mut pk = Vec::new();
        for i in 0..desc.num_results() {
            let name = value::to_string(&desc.get_by_name(i + 1, "fieldName")?);
            let native = value::to_string(&desc.get_by_name(i + 1, "typeInfo")?);
            let is_pk = value::to_string(&desc.get_by_name(i + 1, "primaryKey")?) == "true";
            if is_pk {
                pk.push(name.clone());
            }
            fields.push(FieldSpec::new(name, sql_type_name_to_kind(&native)));
        }
        Ok((fields, pk))
    }

    pub fn add_field(&self, db: &str, table: &str, after_field: Option<&str>, new_field: FieldSpec) -> DbxResult<()> {
        self.wait_for_table_unlocked(db, table)?;
        let (mut fields, pk) = self.current_fields_and_pk(db, table)?;
        let insert_at = match after_field {
            Some(name) => fields.iter().position(|f| f.name == name).map(|i| i + 1).unwrap_or(fields.len()),
            None => 0,
        };
        let new_name = new_field.name.clone();
        fields.insert(insert_at, new_field);
        let result = ddl::copy_and_rename(self.engine(), db, table, &fields, &pk.join(", "), Some(&new_name));
        self.invalidate_describe_cache(db, table);
        result
    }

    pub fn change_field_type(&self, db: &str, table: &str, field_name: &str, new_type: FieldSpec) -> DbxResult<()> {
        self.wait_for_table_unlocked(db, table)?;
        let (mut fields, pk) = self.current_fields_and_pk(db, table)?;
        let idx = fields
            .iter()
            .position(|f| f.name == field_name)
            .ok_or_else(|| DbxError::FieldNotFound(field_name.to_string()))?;
        fields[idx] = FieldSpec {
            name: field_name.to_string(),
            ..new_type
        };
        let result = ddl::copy_and_rename(self.engine(), db, table, &fields, &pk.join(", "), None);
        self.invalidate_describe_cache(db, table);
        result
    }

    pub fn rename_table(&self, db: &str, table: &str, new_name: &str) -> DbxResult<()> {
        self.wait_for_table_unlocked(db, table)?;
        let schema = self.engine().schema_name(db);
        self.engine().query_string(db, &format!("ALTER TABLE {schema}.{table} RENAME TO {new_name}"))?;
        self.invalidate_describe_cache(db, table);
        Ok(())
    }

    pub fn change_field_name(&self, db: &str, table: &str, old_name: &str, new_name: &str) -> DbxResult<()> {
        self.wait_for_table_unlocked(db, table)?;
        let schema = self.engine().schema_name(db);
        self.engine()
            .query_string(db, &format!("ALTER TABLE {schema}.{table} RENAME COLUMN {old_name} TO {new_name}"))?;
        self.invalidate_describe_cache(db, table);
        Ok(())
    }

    pub fn delete_field(&self, db: &str, table: &str, field_name: &str) -> DbxResult<()> {
        self.wait_for_table_unlocked(db, table)?;
        let schema = self.engine().schema_name(db);
        self.engine().query_string(db, &format!("ALTER TABLE {schema}.{table} DROP COLUMN {field_name}"))?;
        self.invalidate_describe_cache(db, table);
        Ok(())
    }

    pub fn delete_table(&self, db: &str, table: &str) -> DbxResult<()> {
        self.wait_for_table_unlocked(db, table)?;
        let schema = self.engine().schema_name(db);
        self.engine().query_string(db, &format!("DROP TABLE {schema}.{table}"))?;
        self.invalidate_describe_cache(db, table);
        Ok(())
    }

    // ---- Introspection -------------------------------------------------------

    /// Raw `(fieldName, typeInfo, primaryKey)` description, cached per
    /// `(db, table)` until the next DDL operation. The `typeInfo` column's
    /// field type is set to `None` to mark it polymorphic (spec.md §4.4):
    /// callers needing the resolved [`TypeDescriptor`] use
    /// [`Database::get_field_type_by_name`] instead of reading the cell's
    /// native-type string directly.
    pub fn describe_table(&self, db: &str, table: &str) -> DbxResult<DbResult> {
        let key = (db.to_string(), table.to_string());
        if let Some(cached) = self.0.describe_cache.get(&key) {
            return Ok(cached.copy());
        }
        let mut raw = self.engine().describe_table(db, table)?;
        raw.finalize(db, table, Arc::downgrade(&self.0));
        self.0.describe_cache.insert(key, raw.copy());
        Ok(raw)
    }

    pub fn get_field_type_by_name(&self, db: &str, table: &str, field: &str) -> DbxResult<&'static TypeDescriptor> {
        let desc = self.describe_table(db, table)?;
        let idx = desc
            .get_field_index_by_name(field)
            .ok_or_else(|| DbxError::FieldNotFound(field.to_string()))?;
        self.get_field_type_by_index(db, table, idx)
    }

    pub fn get_field_type_by_index(&self, db: &str, table: &str, index: usize) -> DbxResult<&'static TypeDescriptor> {
        let desc = self.describe_table(db, table)?;
        let native = value::to_string(&desc.get_by_index(index + 1, 1)?);
        Ok(crate::types::owning_descriptor_for(sql_type_name_to_kind(&native)))
    }

    pub fn get_num_records(&self, db: &str, table: &str) -> DbxResult<u64> {
        self.engine().get_num_records(db, table)
    }

    pub fn get_size(&self, db: &str, table: &str) -> DbxResult<u64> {
        self.engine().get_size(db, table)
    }

    // ---- Conversion utilities --------------------------------------------

    pub fn to_csv(&self, result: &DbResult) -> String {
        result.to_csv()
    }

    pub fn to_bytes(&self, result: &DbResult, record_delim: &str, field_delim: &str) -> String {
        result.to_delimited(record_delim, field_delim)
    }

    /// Round-trip a `DbResult` into an all-`Bytes` table (spec.md §4.4):
    /// every cell becomes its `Bytes` representation, losing type fidelity
    /// in exchange for an engine-agnostic transport shape.
    pub fn result_to_bytes_table(&self, result: &DbResult) -> DbResult {
        let field_names = result.field_names();
        let field_types = vec![Some(&crate::types::BYTES); field_names.len()];
        let mut out = DbResult::new(field_names, field_types);
        for row in 0..result.num_results() {
            let mut cells = Vec::with_capacity(result.num_fields());
            for col in 0..result.num_fields() {
                let cell = result.get_by_index(row + 1, col).unwrap_or_else(|_| Arc::new(crate::types::Value::Null));
                cells.push(Some(Arc::new(crate::types::Value::Bytes(value::to_bytes(&cell)))));
            }
            out.push_row(cells);
        }
        out.successful = result.successful;
        out
    }

    /// Inverse of [`Database::result_to_bytes_table`]: re-parse each
    /// `Bytes` cell under the caller-supplied target types.
    pub fn bytes_table_to_result(&self, bytes_table: &DbResult, field_types: Vec<Option<&'static TypeDescriptor>>) -> DbxResult<DbResult> {
        let field_names = bytes_table.field_names();
        if field_types.len() != field_names.len() {
            return Err(DbxError::TypeMismatch {
                expected: format!("{} field types", field_names.len()),
                actual: format!("{} field types", field_types.len()),
            });
        }
        let mut out = DbResult::new(field_names, field_types.clone());
        for row in 0..bytes_table.num_results() {
            let mut cells = Vec::with_capacity(bytes_table.num_fields());
            for (col, td) in field_types.iter().enumerate() {
                let cell = bytes_table.get_by_index(row + 1, col)?;
                let text = value::to_string(&cell);
                let parsed = match td {
                    Some(td) => td.create(Some(&text)),
                    None => crate::types::Value::String(Bytes::from(text.as_str())),
                };
                cells.push(Some(Arc::new(parsed)));
            }
            out.push_row(cells);
        }
        out.successful = bytes_table.successful;
        Ok(out)
    }

    /// No-op if `db.table` already matches `result`'s schema; otherwise
    /// drops the destination (if present) and recreates it from `result`'s
    /// field names/types (spec.md §4.4).
    pub fn create_table_from_result(&self, db: &str, table: &str, result: &DbResult) -> DbxResult<()> {
        if let Ok(existing) = self.describe_table(db, table) {
            if existing.field_names() == result.field_names() {
                return Ok(());
            }
            self.delete_table(db, table)?;
        }
        let fields: Vec<FieldSpec> = result
            .field_names()
            .into_iter()
            .zip(result.field_types().iter())
            .map(|(name, td)| match td {
                Some(td) if td.kind == TypeKind::String => FieldSpec::varchar(name, 255),
                Some(td) => FieldSpec::new(name, td.kind),
                None => FieldSpec::varchar(name, 255),
            })
            .collect();
        self.add_table_list(db, table, &[], &fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use tempfile::tempdir;

    fn open_test_db() -> Database {
        let dir = tempdir().unwrap();
        Database::init(DbConfig::new(dir.into_path())).unwrap()
    }

    #[test]
    fn create_insert_select_round_trips() {
        let db = open_test_db();
        db.add_database("app").unwrap();
        db.add_table_list(
            "app",
            "users",
            &["id".to_string()],
            &[FieldSpec::new("id", TypeKind::I64), FieldSpec::varchar("name", 40)],
        )
        .unwrap();
        let one = Value::I64(1);
        let alice = Value::String(Bytes::from("alice"));
        db.add_record_vargs("app", "users", &[&one, &alice]).unwrap();

        let r = db.get_records("app", "users", &[]).unwrap();
        assert_eq!(r.num_results(), 1);
        assert_eq!(value::to_string(&r.get_by_name(1, "id").unwrap()), "1");
        assert_eq!(value::to_string(&r.get_by_name(1, "name").unwrap()), "alice");
    }

    #[test]
    fn update_result_writes_back_to_source_table() {
        let db = open_test_db();
        db.add_database("app").unwrap();
        db.add_table_list(
            "app",
            "users",
            &["id".to_string()],
            &[FieldSpec::new("id", TypeKind::I64), FieldSpec::varchar("name", 40)],
        )
        .unwrap();
        let one = Value::I64(1);
        let alice = Value::String(Bytes::from("alice"));
        db.add_record_vargs("app", "users", &[&one, &alice]).unwrap();
        let r = db.get_records("app", "users", &[]).unwrap();
        let alicia = Value::String(Bytes::from("alicia"));
        db.update_result(&r, 0, &[("name", &alicia)]).unwrap();
        let r2 = db.get_records("app", "users", &[]).unwrap();
        assert_eq!(value::to_string(&r2.get_by_name(1, "name").unwrap()), "alicia");
    }

    #[test]
    fn add_field_schema_evolution_appends_column() {
        let db = open_test_db();
        db.add_database("app").unwrap();
        db.add_table_list(
            "app",
            "users",
            &["id".to_string()],
            &[FieldSpec::new("id", TypeKind::I64), FieldSpec::varchar("name", 40)],
        )
        .unwrap();
        let one = Value::I64(1);
        let alice = Value::String(Bytes::from("alice"));
        db.add_record_vargs("app", "users", &[&one, &alice]).unwrap();

        db.add_field("app", "users", Some("name"), FieldSpec::varchar("email", 80)).unwrap();
        let desc = db.describe_table("app", "users").unwrap();
        assert_eq!(desc.num_results(), 3);
        assert_eq!(desc.get_field_index_by_name("email"), Some(2));

        let r = db.get_records("app", "users", &[]).unwrap();
        assert_eq!(value::to_string(&r.get_by_name(1, "id").unwrap()), "1");
    }

    #[test]
    fn ensure_field_indexed_is_idempotent() {
        let db = open_test_db();
        db.add_database("app").unwrap();
        db.add_table_list("app", "users", &["id".to_string()], &[FieldSpec::new("id", TypeKind::I64)])
            .unwrap();
        db.ensure_field_indexed("app", "users", "id").unwrap();
        db.ensure_field_indexed("app", "users", "id").unwrap();
    }

    #[test]
    fn describe_cache_is_invalidated_on_ddl() {
        let db = open_test_db();
        db.add_database("app").unwrap();
        db.add_table_list("app", "users", &["id".to_string()], &[FieldSpec::new("id", TypeKind::I64)])
            .unwrap();
        let before = db.describe_table("app", "users").unwrap();
        assert_eq!(before.num_results(), 1);
        db.add_field("app", "users", None, FieldSpec::varchar("name", 40)).unwrap();
        let after = db.describe_table("app", "users").unwrap();
        assert_eq!(after.num_results(), 2);
    }

    #[test]
    fn add_records_bulk_inserts_multiple_rows() {
        let db = open_test_db();
        db.add_database("app").unwrap();
        db.add_table_list("app", "users", &["id".to_string()], &[FieldSpec::new("id", TypeKind::I64)])
            .unwrap();
        let one = Value::I64(1);
        let two = Value::I64(2);
        let ok = db
            .add_records("app", "users", &[vec![("id", &one)], vec![("id", &two)]])
            .unwrap();
        assert!(ok);
        let r = db.get_records("app", "users", &[]).unwrap();
        assert_eq!(r.num_results(), 2);
    }
}
