//! The façade layer (spec.md §4.4/§4.6): a `SqlEngine` driver trait, the
//! concrete SQLite adapter, dialect-neutral SQL text generation, the
//! `Database` façade itself, and the copy-and-rename schema-evolution
//! algorithm it shares between `add_field` and `change_field_type`.

pub mod database;
pub mod ddl;
pub mod sql_builder;
pub mod sqlite;
pub mod vtable;

pub use database::{Database, FieldSpec};
pub use sqlite::SqliteEngine;
pub use vtable::SqlEngine;
