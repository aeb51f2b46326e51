//! Bounded pool of connection permits.
//!
//! # Design
//! The ureq agent keeps idle connections for reuse but does not cap how many
//! exchanges run at once. `ConnectionPool` supplies that cap: every exchange
//! holds a `PoolPermit` for its whole duration, and the permit hands its slot
//! back when dropped, so release happens exactly once on every exit path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::error::TransportError;

/// Shared permit pool. Clones refer to the same pool.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    size: usize,
    acquire_timeout: Duration,
    available: Mutex<usize>,
    freed: Condvar,
}

/// One outstanding exchange. Returns its slot to the pool on drop.
#[derive(Debug)]
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct PoolPermit {
    inner: Arc<Inner>,
}

impl ConnectionPool {
    pub fn new(size: usize, acquire_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                size,
                acquire_timeout,
                available: Mutex::new(size),
                freed: Condvar::new(),
            }),
        }
    }

    /// Take a permit, waiting up to the acquire timeout for one to free up.
    pub fn acquire(&self) -> Result<PoolPermit, TransportError> {
        let deadline = Instant::now() + self.inner.acquire_timeout;
        let mut available = self.inner.available.lock();
        while *available == 0 {
            if self.inner.freed.wait_until(&mut available, deadline).timed_out() && *available == 0 {
                warn!(
                    pool_size = self.inner.size,
                    waited = ?self.inner.acquire_timeout,
                    "connection pool exhausted"
                );
                return Err(TransportError::PoolTimeout {
                    waited: self.inner.acquire_timeout,
                });
            }
        }
        *available -= 1;
        Ok(PoolPermit {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Permits not currently held by an exchange.
    pub fn available(&self) -> usize {
        *self.inner.available.lock()
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }

    pub fn acquire_timeout(&self) -> Duration {
        self.inner.acquire_timeout
    }
}

impl Drop for PoolPermit {
    fn drop(&mut self) {
        let mut available = self.inner.available.lock();
        *available += 1;
        drop(available);
        self.inner.freed.notify_one();
    }
}
