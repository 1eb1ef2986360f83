//! Connection pooling and request workers.
//!
//! `DbPool` owns a fixed set of persistent connections handed out through a
//! bounded channel; `worker` runs each request on its own `may` coroutine with
//! a connection checked out of the pool.

pub mod config;
pub mod manager;
pub mod worker;

pub use manager::{DbPool, PooledConnection};
