//! Configuration threaded into [`crate::engine::database::Database::init`]
//! (DESIGN NOTES item 4): replaces the original's single process-wide
//! mutable `db_instance` string with an explicit, per-`Database` value that
//! cannot be mutated after construction.

use std::path::PathBuf;

/// Construction-time configuration for a [`crate::engine::database::Database`].
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Root directory holding `main[<db_instance>]` and every managed
    /// database file (spec.md §6).
    pub root: PathBuf,
    /// Optional suffix appended to every database name sent to the engine,
    /// disambiguating parallel instances sharing a filesystem (spec.md §3's
    /// `db_instance`). Empty means "no suffix".
    pub db_instance: String,
}

impl DbConfig {
    /// A config with no `db_instance` suffix.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DbConfig {
            root: root.into(),
            db_instance: String::new(),
        }
    }

    /// Set the `db_instance` suffix (builder-style; `DbConfig` has no setter
    /// once handed to `Database::init` — spec.md §9's "forbid post-init
    /// mutation").
    pub fn with_db_instance(mut self, db_instance: impl Into<String>) -> Self {
        self.db_instance = db_instance.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_instance_suffix_is_empty() {
        let cfg = DbConfig::new("/tmp/db");
        assert_eq!(cfg.db_instance, "");
    }

    #[test]
    fn with_db_instance_sets_suffix() {
        let cfg = DbConfig::new("/tmp/db").with_db_instance("shard1");
        assert_eq!(cfg.db_instance, "shard1");
    }
}
