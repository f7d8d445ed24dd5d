//! End-to-end scenarios exercised through the public façade, one test per
//! scenario in spec.md §8.

use sqlfacade_core::config::DbConfig;
use sqlfacade_core::engine::{Database, FieldSpec, SqlEngine, SqliteEngine};
use sqlfacade_core::types::{value, TypeKind, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn open_db() -> Database {
    let dir = tempdir().unwrap();
    Database::init(DbConfig::new(dir.into_path())).unwrap()
}

fn seed_users(db: &Database) {
    db.add_database("app").unwrap();
    db.add_table_list(
        "app",
        "users",
        &["id".to_string()],
        &[FieldSpec::new("id", TypeKind::I64), FieldSpec::varchar("name", 40)],
    )
    .unwrap();
    let id = Value::I64(1);
    let name = Value::String("alice".into());
    db.add_record_vargs("app", "users", &[&id, &name]).unwrap();
}

#[test]
fn s1_create_insert_select() {
    let db = open_db();
    seed_users(&db);
    let r = db.get_records("app", "users", &[]).unwrap();
    assert_eq!(r.num_results(), 1);
    assert_eq!(value::to_string(&r.get_by_name(1, "id").unwrap()), "1");
    assert_eq!(value::to_string(&r.get_by_name(1, "name").unwrap()), "alice");
}

#[test]
fn s2_update_by_result() {
    let db = open_db();
    seed_users(&db);
    let r = db.get_records("app", "users", &[]).unwrap();
    let alicia = Value::String("alicia".into());
    db.update_result(&r, 0, &[("name", &alicia)]).unwrap();
    let r2 = db.get_records("app", "users", &[]).unwrap();
    assert_eq!(value::to_string(&r2.get_by_name(1, "name").unwrap()), "alicia");
}

#[test]
fn s3_add_field_schema_evolution() {
    let db = open_db();
    seed_users(&db);
    db.add_field("app", "users", Some("name"), FieldSpec::varchar("email", 80)).unwrap();
    let r = db.describe_table("app", "users").unwrap();
    assert_eq!(r.num_results(), 3);
    assert_eq!(r.get_field_index_by_name("email"), Some(2));
}

#[test]
fn s4_bytes_literal_escape() {
    let engine = SqliteEngine::open_memory().unwrap();
    assert_eq!(engine.make_string_literal("O'Hara"), "'O''Hara'");
    assert_eq!(engine.make_bytes_literal(&[0xDE, 0xAD, 0xBE, 0xEF]), "x'DEADBEEF'");
}

#[test]
fn s5_lock_contention_multithreaded() {
    let db = Arc::new(open_db());
    db.add_database("app").unwrap();
    let unblocked_at = AtomicU64::new(0);
    std::thread::scope(|scope| {
        let t1_db = db.clone();
        scope.spawn(move || {
            let h = t1_db.lock_tables(&["app.users".to_string()]).unwrap();
            std::thread::sleep(Duration::from_millis(100));
            t1_db.unlock_tables(h);
        });
        std::thread::sleep(Duration::from_millis(10));
        let t2_db = db.clone();
        let t0 = Instant::now();
        let waited = scope.spawn(move || {
            let h = t2_db.lock_tables(&["app.users".to_string()]).unwrap();
            let elapsed = t0.elapsed();
            t2_db.unlock_tables(h);
            elapsed
        });
        let elapsed = waited.join().unwrap();
        unblocked_at.store(elapsed.as_millis() as u64, Ordering::SeqCst);
    });
    assert!(unblocked_at.load(Ordering::SeqCst) >= 90, "unblocked too early");
}

#[test]
fn s6_range_slice() {
    use sqlfacade_core::result::DbResult;
    let mut r = DbResult::new(
        vec!["id".to_string(), "name".to_string()],
        vec![Some(&sqlfacade_core::types::I64), Some(&sqlfacade_core::types::STRING)],
    );
    for i in 0..10i64 {
        r.push_row(vec![
            Some(Arc::new(Value::I64(i))),
            Some(Arc::new(Value::String(format!("row-{i}").as_str().into()))),
        ]);
    }
    let s = r.get_range(3, 7).unwrap();
    assert_eq!(s.num_results(), 4);
    // s's first data row (row 1) corresponds to r's data row at index 3
    // (row 4, since row 0 is the header).
    assert_eq!(
        value::to_string(&s.get_by_name(1, "id").unwrap()),
        value::to_string(&r.get_by_name(4, "id").unwrap())
    );
}
