//! Bounded connection pool shared by every capability module
//!
//! A thin layer over deadpool's managed pool:
//! - `max_size` bounds checked-out connections; waiting is capped by `acquire_timeout`
//! - Idle connections are recycled by the backend manager before reuse
//! - Handles are RAII guards: release happens exactly once, on drop or `release()`
//! - A connection whose operation failed with a connectivity error is taken out
//!   of the pool and closed, not reused
//! - No retries here; callers decide whether a retryable error is worth another attempt

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool::managed::{self, Object, PoolError, TimeoutType};
use deadpool::Runtime;
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::Notify;

use super::error::DbError;

/// Default maximum connections for the pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default ceiling for `acquire()`.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Backend adapter: a deadpool manager (create + recycle) that can also run
/// a trivial round trip for the health check.
#[async_trait]
pub trait Manager: managed::Manager<Error = DbError> + 'static {
    async fn ping(&self, conn: &mut Self::Type) -> Result<(), DbError>;
}

/// Pool sizing and timeouts
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

/// Point-in-time view of pool accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub max: u32,
    pub in_use: usize,
    pub idle: usize,
    pub acquired_total: u64,
    pub closed: bool,
}

/// Shared connection pool. Cloning is cheap and yields the same pool.
pub struct Pool<M: Manager> {
    inner: managed::Pool<M>,
    config: PoolConfig,
    usage: Arc<Usage>,
}

impl<M: Manager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: self.config.clone(),
            usage: Arc::clone(&self.usage),
        }
    }
}

/// Checkout accounting deadpool does not keep.
#[derive(Default)]
struct Usage {
    in_use: AtomicUsize,
    acquired_total: AtomicU64,
    released: Notify,
}

impl<M: Manager> Pool<M> {
    /// Create a pool without opening any connection yet.
    pub fn new(manager: M, config: PoolConfig) -> Result<Self, DbError> {
        let config = PoolConfig {
            max_connections: config.max_connections.max(1),
            ..config
        };
        let timeout = Some(config.acquire_timeout);
        let inner = managed::Pool::builder(manager)
            .max_size(config.max_connections as usize)
            .wait_timeout(timeout)
            .create_timeout(timeout)
            .recycle_timeout(timeout)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| DbError::Configuration(e.to_string()))?;

        Ok(Self {
            inner,
            config,
            usage: Arc::default(),
        })
    }

    /// Create a pool and verify the datastore is reachable by opening one connection.
    pub async fn connect(manager: M, config: PoolConfig) -> Result<Self, DbError> {
        let pool = Self::new(manager, config)?;
        pool.acquire().await?.release();
        Ok(pool)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn manager(&self) -> &M {
        self.inner.manager()
    }

    /// Check out a connection, waiting at most `acquire_timeout` for capacity.
    ///
    /// Only the calling task waits; other tasks keep using the pool.
    pub async fn acquire(&self) -> Result<PooledConnection<M>, DbError> {
        let object = self.inner.get().await.map_err(|e| self.classify(e))?;

        self.usage.in_use.fetch_add(1, Ordering::AcqRel);
        self.usage.acquired_total.fetch_add(1, Ordering::Relaxed);
        Ok(PooledConnection {
            object: Some(object),
            usage: Arc::clone(&self.usage),
            broken: false,
        })
    }

    fn classify(&self, e: PoolError<DbError>) -> DbError {
        match e {
            PoolError::Timeout(TimeoutType::Wait) => {
                let timeout = self.config.acquire_timeout;
                tracing::warn!(?timeout, "timed out waiting for a pooled connection");
                DbError::PoolTimeout(timeout)
            }
            PoolError::Timeout(_) => DbError::Timeout,
            PoolError::Backend(e) => e,
            PoolError::Closed => DbError::PoolClosed,
            other => DbError::Configuration(other.to_string()),
        }
    }

    /// Acquire, run `op`, release.
    ///
    /// The work runs on its own task: if the caller is dropped (client went
    /// away) the operation still completes and the connection is released.
    pub async fn run<T, F>(&self, op: F) -> Result<T, DbError>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut M::Type) -> BoxFuture<'c, Result<T, DbError>> + Send + 'static,
    {
        let pool = self.clone();
        let task = tokio::spawn(async move {
            let mut conn = pool.acquire().await?;
            let result = conn.execute(op).await;
            conn.release();
            result
        });

        match task.await {
            Ok(result) => result,
            Err(e) => Err(DbError::Aborted(e.to_string())),
        }
    }

    /// Acquire, ping, release. Used by the health reporter.
    pub async fn health_check(&self) -> Result<(), DbError> {
        let pool = self.clone();
        let task = tokio::spawn(async move {
            let mut conn = pool.acquire().await?;
            let result = pool.manager().ping(&mut *conn).await;
            if matches!(&result, Err(e) if e.is_connectivity()) {
                conn.mark_broken();
            }
            conn.release();
            result
        });

        match task.await {
            Ok(result) => result,
            Err(e) => Err(DbError::Aborted(e.to_string())),
        }
    }

    pub fn status(&self) -> PoolStatus {
        let in_use = self.usage.in_use.load(Ordering::Acquire);
        PoolStatus {
            max: self.config.max_connections,
            in_use,
            idle: self.inner.status().size.saturating_sub(in_use),
            acquired_total: self.usage.acquired_total.load(Ordering::Relaxed),
            closed: self.inner.is_closed(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Stop handing out connections and drop the idle ones, then wait for
    /// every outstanding handle to come back. Returned connections are closed.
    pub async fn close(&self) {
        if self.inner.is_closed() {
            return;
        }

        tracing::info!(in_use = self.status().in_use, "closing connection pool");
        self.inner.close();
        loop {
            // Registered before the check so a release in between is not missed.
            let released = self.usage.released.notified();
            if self.usage.in_use.load(Ordering::Acquire) == 0 {
                break;
            }
            released.await;
        }
        tracing::info!("connection pool closed");
    }
}

/// A checked-out connection. Returned to the pool when dropped.
pub struct PooledConnection<M: Manager> {
    object: Option<Object<M>>,
    usage: Arc<Usage>,
    broken: bool,
}

impl<M: Manager> PooledConnection<M> {
    /// Run one data operation on this connection.
    ///
    /// A connectivity failure marks the connection broken so it is closed on
    /// release. The error is returned unchanged; nothing is retried.
    pub async fn execute<T, F>(&mut self, op: F) -> Result<T, DbError>
    where
        F: for<'c> FnOnce(&'c mut M::Type) -> BoxFuture<'c, Result<T, DbError>>,
    {
        let result = op(&mut **self).await;
        if let Err(e) = &result {
            if e.is_connectivity() {
                tracing::warn!(error = %e, "connection lost during operation");
                self.broken = true;
            }
        }
        result
    }

    /// Close this connection on release instead of returning it to the pool.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Return the connection to the pool.
    pub fn release(self) {
        drop(self);
    }
}

impl<M: Manager> Deref for PooledConnection<M> {
    type Target = M::Type;

    fn deref(&self) -> &Self::Target {
        self.object.as_deref().expect("connection is present until release")
    }
}

impl<M: Manager> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.object.as_deref_mut().expect("connection is present until release")
    }
}

impl<M: Manager> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        if let Some(object) = self.object.take() {
            if self.broken {
                tracing::debug!("closing broken pooled connection");
                // Detaching frees the slot; the connection closes when dropped here.
                drop(Object::take(object));
            } else {
                drop(object);
            }
        }
        self.usage.in_use.fetch_sub(1, Ordering::AcqRel);
        self.usage.released.notify_waiters();
    }
}
