use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crate::{connection::SecureConnection, driver::Driver};

use super::{connection::PooledConnection, error::PoolError, PoolInner};

/// A reserved slot for a connection that is being created.
///
/// The slot is counted as in flight from the moment it is reserved. If creation fails or the
/// creating task is cancelled, dropping the guard gives the slot back.
pub(crate) struct SlotGuard<D: Driver> {
    pool: Arc<PoolInner<D>>,
    cancelled: bool,
}

impl<D: Driver> SlotGuard<D> {
    /// The caller must already have incremented `in_flight` under the pool lock.
    pub(crate) fn new(pool: Arc<PoolInner<D>>) -> Self {
        Self {
            pool,
            cancelled: false,
        }
    }

    /// Hands the new connection straight to the caller.
    pub(crate) fn checkout(
        mut self,
        mut conn: SecureConnection<D>,
    ) -> Result<PooledConnection<D>, PoolError> {
        self.cancelled = true;
        let pool = self.pool.clone();
        {
            let mut state = pool.state.lock();
            state.in_flight -= 1;
            if !state.closed {
                state.in_use += 1;
                drop(state);
                conn.touch();
                return Ok(PooledConnection::new(conn, pool));
            }
        }

        conn.close();
        pool.notify_if_drained();
        Err(PoolError::Closed)
    }

    /// Puts the new connection on the free list and wakes one waiter.
    pub(crate) fn release_to_free(mut self, mut conn: SecureConnection<D>) {
        self.cancelled = true;
        {
            let mut state = self.pool.state.lock();
            state.in_flight -= 1;
            if !state.closed {
                conn.touch();
                state.free.push_back(conn);
                drop(state);
                self.pool.notify.notify_one();
                return;
            }
        }

        conn.close();
        self.pool.notify_if_drained();
    }
}

impl<D: Driver> Drop for SlotGuard<D> {
    fn drop(&mut self) {
        if !self.cancelled {
            self.pool.state.lock().in_flight -= 1;
            self.pool.notify.notify_one();
            self.pool.notify_if_drained();
        }
    }
}

/// Counts a caller as waiting for as long as it is alive.
pub(crate) struct WaitGuard<'a> {
    waiting: &'a AtomicUsize,
}

impl<'a> WaitGuard<'a> {
    pub(crate) fn new(waiting: &'a AtomicUsize) -> Self {
        waiting.fetch_add(1, Ordering::AcqRel);
        Self { waiting }
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.waiting.fetch_sub(1, Ordering::AcqRel);
    }
}
