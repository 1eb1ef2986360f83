//! Request workers: each request runs on its own `may` coroutine with its own
//! pooled connection, so concurrent requests never share a database session.

use may::coroutine::JoinHandle;

use crate::error::PantryError;
use crate::pool::manager::{DbPool, PooledConnection};

/// Spawn `job` on a new coroutine with a connection checked out of `pool`.
///
/// The connection goes back to the pool when the job returns. Join the handle to
/// collect the job's result; a panic inside the job surfaces as `Err` from `join`.
pub fn spawn_request<T, F>(pool: &DbPool, job: F) -> JoinHandle<Result<T, PantryError>>
where
    T: Send + 'static,
    F: FnOnce(&PooledConnection) -> Result<T, PantryError> + Send + 'static,
{
    let pool = pool.clone();
    may::go!(move || {
        let conn = pool.acquire()?;
        job(&conn)
    })
}

/// Run every job concurrently and collect the results in submission order.
///
/// # Errors
///
/// Returns the first job error, or `PantryError::Internal` if a job panicked.
pub fn run_all<T, F>(pool: &DbPool, jobs: Vec<F>) -> Result<Vec<T>, PantryError>
where
    T: Send + 'static,
    F: FnOnce(&PooledConnection) -> Result<T, PantryError> + Send + 'static,
{
    let handles: Vec<_> = jobs.into_iter().map(|job| spawn_request(pool, job)).collect();
    handles
        .into_iter()
        .map(|handle| {
            handle
                .join()
                .map_err(|_| PantryError::Internal("request coroutine panicked".to_string()))?
        })
        .collect()
}
