//! Recursive transactions (spec.md §5): a per-`Database` counter guarded by
//! a mutex, issuing the engine's `BEGIN`/`COMMIT`/`ROLLBACK` only at the
//! 0→1 and 1→0 edges.
//!
//! Per DESIGN NOTES item 8 ("keep the counter but encapsulate it in a
//! transaction-guard object whose scoped release decrements"), the counter
//! itself stays a plain integer behind a mutex — the type that composes
//! with `?` and scoped release is [`TransactionGuard`], acquired via
//! [`Transactions::begin`].

use crate::engine::vtable::SqlEngine;
use crate::error::DbxResult;
use parking_lot::Mutex;
use tracing::warn;

pub(crate) struct Transactions {
    count: Mutex<u32>,
}

impl Transactions {
    pub(crate) fn new() -> Self {
        Transactions { count: Mutex::new(0) }
    }

    pub(crate) fn start(&self, engine: &dyn SqlEngine, db: &str) -> DbxResult<()> {
        let mut count = self.count.lock();
        if *count == 0 {
            engine.begin(db)?;
        }
        *count += 1;
        Ok(())
    }

    pub(crate) fn commit(&self, engine: &dyn SqlEngine, db: &str) -> DbxResult<()> {
        let mut count = self.count.lock();
        if *count == 0 {
            warn!("commit_transaction called with no open transaction");
            return Ok(());
        }
        if *count > 1 {
            *count -= 1;
            return Ok(());
        }
        engine.commit(db)?;
        *count -= 1;
        Ok(())
    }

    pub(crate) fn rollback(&self, engine: &dyn SqlEngine, db: &str) -> DbxResult<()> {
        let mut count = self.count.lock();
        if *count == 0 {
            warn!("rollback_transaction called with no open transaction");
            return Ok(());
        }
        if *count > 1 {
            *count -= 1;
            return Ok(());
        }
        engine.rollback(db)?;
        *count -= 1;
        Ok(())
    }

    pub(crate) fn depth(&self) -> u32 {
        *self.count.lock()
    }
}

/// A scoped transaction: `commit()` or `rollback()` consumes it explicitly;
/// dropping without either rolls back, so an early `?` return inside a
/// transactional block can't silently leave the engine mid-transaction.
pub struct TransactionGuard<'a> {
    database: &'a crate::engine::database::Database,
    db_name: String,
    finished: bool,
}

impl<'a> TransactionGuard<'a> {
    pub(crate) fn new(database: &'a crate::engine::database::Database, db_name: String) -> Self {
        TransactionGuard {
            database,
            db_name,
            finished: false,
        }
    }

    pub fn commit(mut self) -> DbxResult<()> {
        self.finished = true;
        self.database.commit_transaction(&self.db_name)
    }

    pub fn rollback(mut self) -> DbxResult<()> {
        self.finished = true;
        self.database.rollback_transaction(&self.db_name)
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.database.rollback_transaction(&self.db_name) {
                warn!(error = %e, "implicit rollback on TransactionGuard drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;
    use crate::engine::database::Database;
    use tempfile::tempdir;

    fn open_test_db() -> Database {
        let dir = tempdir().unwrap();
        Database::init(DbConfig::new(dir.into_path())).unwrap()
    }

    #[test]
    fn nested_start_commit_issues_one_begin_and_commit() {
        let db = open_test_db();
        db.add_database("app").unwrap();
        db.start_transaction("app").unwrap();
        db.start_transaction("app").unwrap();
        db.start_transaction("app").unwrap();
        assert_eq!(db.transaction_depth(), 3);
        db.commit_transaction("app").unwrap();
        db.commit_transaction("app").unwrap();
        assert_eq!(db.transaction_depth(), 1);
        db.commit_transaction("app").unwrap();
        assert_eq!(db.transaction_depth(), 0);
    }

    #[test]
    fn guard_rolls_back_on_early_drop() {
        let db = open_test_db();
        db.add_database("app").unwrap();
        {
            let _guard = db.transaction("app").unwrap();
            // Dropped without commit: rollback fires.
        }
        assert_eq!(db.transaction_depth(), 0);
    }
}
