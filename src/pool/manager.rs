//! Pool Manager
//!
//! A fixed set of persistent `may_postgres` connections handed out through a
//! `may` mpmc channel. Acquiring waits for a free slot up to the configured
//! timeout; dropping the guard returns the connection.

use may::sync::mpmc::{channel, Receiver, Sender};
use may_postgres::types::ToSql;
use may_postgres::Row;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::connection::connect;
use crate::executor::{DbError, DbExecutor, PgExecutor};
use crate::pool::config::DatabaseConfig;
use crate::transaction::{Transaction, TransactionError};

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// A pool slot. `None` marks a connection that was found dead on release and
/// is re-established by the next `acquire`.
type Slot = Option<PgExecutor>;

/// Pool of persistent connections
///
/// Slots travel over a `may` channel, so a coroutine waiting for a free
/// connection yields to the scheduler instead of blocking its worker thread.
#[derive(Clone)]
pub struct DbPool {
    slots: Receiver<Slot>,
    returns: Sender<Slot>,
    idle: Arc<AtomicUsize>,
    url: Arc<str>,
    size: usize,
    timeout: Duration,
}

fn open(url: &str) -> Result<PgExecutor, DbError> {
    connect(url)
        .map(PgExecutor::new)
        .map_err(|e| DbError::Other(format!("Connection error: {e}")))
}

impl DbPool {
    /// Open `max_connections` connections to `url`.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if any connection cannot be established.
    pub fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        let size = config.max_connections.max(1);
        let (returns, slots) = channel();
        for _ in 0..size {
            returns
                .send(Some(open(&config.url)?))
                .map_err(|_| DbError::Other("pool slot channel closed".to_string()))?;
        }
        log::info!("database pool ready with {size} connections");
        Ok(Self {
            slots,
            returns,
            idle: Arc::new(AtomicUsize::new(size)),
            url: Arc::from(config.url.as_str()),
            size,
            timeout: Duration::from_secs(config.pool_timeout_seconds),
        })
    }

    /// Number of connections owned by the pool
    pub fn size(&self) -> usize {
        self.size
    }

    /// Connections currently free
    pub fn idle(&self) -> usize {
        self.idle.load(Ordering::Acquire)
    }

    /// Wait for a free connection
    ///
    /// # Errors
    ///
    /// Returns `DbError::PoolTimeout` when no connection frees up within the pool
    /// timeout, or the connect error when a dead slot cannot be re-established.
    pub fn acquire(&self) -> Result<PooledConnection, DbError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::acquire_connection_span().entered();

        let start = Instant::now();
        #[cfg(feature = "metrics")]
        METRICS.enter_queue();
        let received = self.slots.recv_timeout(self.timeout);
        #[cfg(feature = "metrics")]
        {
            METRICS.leave_queue();
            METRICS.record_connection_wait(start.elapsed());
        }

        let slot = match received {
            Ok(slot) => slot,
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "no pooled connection free after {:?} (pool size {})",
                    start.elapsed(),
                    self.size
                );
                return Err(DbError::PoolTimeout(self.timeout.as_secs()));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(DbError::Other("pool slot channel closed".to_string()));
            }
        };
        self.idle.fetch_sub(1, Ordering::AcqRel);

        let executor = match slot {
            Some(executor) => executor,
            None => match open(&self.url) {
                Ok(executor) => {
                    log::info!("re-established pooled connection");
                    executor
                }
                Err(e) => {
                    self.give_back(None);
                    return Err(e);
                }
            },
        };
        Ok(PooledConnection {
            executor: Some(executor),
            pool: self.clone(),
        })
    }

    fn give_back(&self, slot: Slot) {
        self.idle.fetch_add(1, Ordering::AcqRel);
        // The receiving side lives as long as any DbPool clone does.
        let _ = self.returns.send(slot);
    }

    /// Run the liveness probe on one pooled connection
    ///
    /// # Errors
    ///
    /// Returns `DbError` if no connection is available or the probe cannot run.
    pub fn check_health(&self) -> Result<bool, DbError> {
        self.acquire()?.check_health()
    }
}

/// A connection checked out of a `DbPool`; returned on drop.
///
/// A connection that fails the liveness probe on release goes back as an
/// empty slot and is reconnected on its next checkout.
pub struct PooledConnection {
    executor: Option<PgExecutor>,
    pool: DbPool,
}

impl PooledConnection {
    fn inner(&self) -> Result<&PgExecutor, DbError> {
        self.executor
            .as_ref()
            .ok_or_else(|| DbError::Other("pooled connection already released".to_string()))
    }
}

impl Deref for PooledConnection {
    type Target = PgExecutor;

    fn deref(&self) -> &PgExecutor {
        match self.executor.as_ref() {
            Some(executor) => executor,
            None => unreachable!("executor is only taken in drop"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(executor) = self.executor.take() else {
            return;
        };
        let slot = match executor.check_health() {
            Ok(true) => Some(executor),
            Ok(false) | Err(_) => {
                log::warn!("discarding dead pooled connection");
                None
            }
        };
        self.pool.give_back(slot);
    }
}

impl DbExecutor for PooledConnection {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, DbError> {
        self.inner()?.execute(query, params)
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, DbError> {
        self.inner()?.query_one(query, params)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, DbError> {
        self.inner()?.query_all(query, params)
    }

    fn begin(&self) -> Result<Transaction, TransactionError> {
        self.inner()
            .map_err(|e| TransactionError::Other(e.to_string()))?
            .begin()
    }
}
