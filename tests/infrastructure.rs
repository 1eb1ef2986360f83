//! Migrations, pooling and transaction scopes against a real database.
//!
//! Requires `TEST_DATABASE_URL`; every test is skipped without it.

mod common;

use pantry::migration::Migrator;
use pantry::pool::worker::run_all;
use pantry::raw_sql::{execute_unprepared, query_value};
use pantry::{DbError, DbExecutor, PantryError, PooledConnection};

use common::fixture;

#[test]
fn test_embedded_migrations_fully_applied() {
    let Some(fx) = fixture() else { return };
    let migrator = Migrator::embedded();
    let status = migrator.status(&fx.conn).expect("status");
    assert!(status.pending.is_empty());
    assert_eq!(status.applied.len(), migrator.migrations().len());

    let applied = migrator.up(&fx.conn, None).expect("re-run");
    assert_eq!(applied, 0);
    assert!(!pantry::migration::lock::is_migration_lock_held(&fx.conn).unwrap());
}

#[test]
fn test_pool_times_out_when_exhausted() {
    let Some(fx) = fixture() else { return };
    let pool = fx.db.pool(1, 1).expect("pool");
    assert_eq!(pool.size(), 1);

    let held = pool.acquire().expect("first acquire");
    assert_eq!(pool.idle(), 0);
    match pool.acquire() {
        Err(DbError::PoolTimeout(1)) => {}
        Err(other) => panic!("expected pool timeout, got {other}"),
        Ok(_) => panic!("expected pool timeout, got a connection"),
    }

    drop(held);
    assert_eq!(pool.idle(), 1);
    assert!(pool.check_health().unwrap());
}

#[test]
fn test_waiting_coroutines_share_single_connection() {
    let Some(fx) = fixture() else { return };
    let pool = fx.db.pool(1, 10).expect("pool");
    // Far more waiters than worker threads: each holder must be resumed on its
    // socket I/O while the others wait for the slot.
    let jobs: Vec<_> = (0..32)
        .map(|n: i32| {
            move |conn: &PooledConnection| -> Result<i32, PantryError> {
                Ok(query_value(conn, "SELECT $1::INT4 FROM pg_sleep(0.01)", &[&n])?)
            }
        })
        .collect();
    let results = run_all(&pool, jobs).expect("every job gets the connection");
    assert_eq!(results, (0..32).collect::<Vec<_>>());
    assert_eq!(pool.idle(), 1);
}

#[test]
fn test_dead_connection_replaced_on_next_acquire() {
    let Some(fx) = fixture() else { return };
    let pool = fx.db.pool(1, 5).expect("pool");
    {
        let conn = pool.acquire().expect("acquire");
        let _ = conn.execute("SELECT pg_terminate_backend(pg_backend_pid())", &[]);
        assert!(!matches!(conn.check_health(), Ok(true)));
    }
    assert_eq!(pool.idle(), 1);

    let conn = pool.acquire().expect("reconnected");
    assert!(conn.check_health().unwrap());
    let one: i32 = query_value(&*conn, "SELECT 1", &[]).unwrap();
    assert_eq!(one, 1);
}

#[test]
fn test_nested_scope_rolls_back_to_savepoint() {
    let Some(fx) = fixture() else { return };
    execute_unprepared(
        &fx.conn,
        "CREATE TEMP TABLE IF NOT EXISTS scope_probe (label TEXT NOT NULL)",
    )
    .unwrap();

    let outer = fx.conn.begin().unwrap();
    outer
        .execute("INSERT INTO scope_probe (label) VALUES ($1)", &[&"outer"])
        .unwrap();
    {
        let inner = outer.begin().unwrap();
        assert_eq!(inner.depth(), 1);
        inner
            .execute("INSERT INTO scope_probe (label) VALUES ($1)", &[&"inner"])
            .unwrap();
        assert!(inner.execute("SELECT 1 / 0", &[]).is_err());
        // dropped without commit
    }
    outer.commit().unwrap();

    let labels: i64 = query_value(&fx.conn, "SELECT COUNT(*) FROM scope_probe WHERE label = 'outer'", &[]).unwrap();
    assert_eq!(labels, 1);
    let inner: i64 = query_value(&fx.conn, "SELECT COUNT(*) FROM scope_probe WHERE label = 'inner'", &[]).unwrap();
    assert_eq!(inner, 0);
}

#[test]
fn test_released_savepoint_leaves_outer_open() {
    let Some(fx) = fixture() else { return };
    let outer = fx.conn.begin().unwrap();
    let inner = outer.begin().unwrap();
    inner.commit().unwrap();
    assert!(!outer.is_closed());
    outer.rollback().unwrap();
    assert!(fx.conn.check_health().unwrap());
}
