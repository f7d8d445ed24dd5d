//! sqlfacade-core: a polymorphic SQL database-abstraction layer.
//!
//! Three subsystems compose into one façade:
//!
//! - [`types`]: a runtime [`types::TypeDescriptor`] registry and the
//!   [`types::Value`] sum type that powers generic serialization,
//!   comparison, and copying.
//! - [`result`]: [`result::DbResult`], the tabular container every query
//!   returns — a field-name header row plus typed, owned data rows.
//! - [`engine`]: the [`engine::SqlEngine`] driver trait, a SQLite adapter,
//!   dialect-neutral SQL text generation, and [`engine::Database`], the
//!   façade applications actually call into.
//!
//! [`concurrency`] provides the table-lock, record-lock, and recursive
//! transaction primitives [`engine::Database`] uses internally to guard
//! concurrent access to a shared engine connection.
//!
//! # Quick start
//!
//! ```no_run
//! use sqlfacade_core::config::DbConfig;
//! use sqlfacade_core::engine::{Database, FieldSpec};
//! use sqlfacade_core::types::{TypeKind, Value};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::init(DbConfig::new("./data"))?;
//! db.add_database("app")?;
//! db.add_table_list(
//!     "app",
//!     "users",
//!     &["id".to_string()],
//!     &[FieldSpec::new("id", TypeKind::I64), FieldSpec::varchar("name", 40)],
//! )?;
//!
//! let id = Value::I64(1);
//! let name = Value::String("alice".into());
//! db.add_record_vargs("app", "users", &[&id, &name])?;
//!
//! let rows = db.get_records("app", "users", &[])?;
//! assert_eq!(rows.num_results(), 1);
//! # Ok(())
//! # }
//! ```

pub mod bytes;
pub mod concurrency;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod result;
pub mod types;

pub use config::DbConfig;
pub use engine::{Database, FieldSpec, SqlEngine};
pub use error::{DbxError, DbxResult};
pub use result::DbResult;
