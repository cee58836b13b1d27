use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use crate::{connection::SecureConnection, driver::Driver};

use super::PoolInner;

/// A connection lent out by the pool.
///
/// The connection goes back to the free list when this value is dropped, so a release happens
/// on every exit path, including errors and task cancellation.
pub struct PooledConnection<D: Driver> {
    conn: Option<SecureConnection<D>>,
    pool: Arc<PoolInner<D>>,
}

impl<D: Driver> PooledConnection<D> {
    pub(crate) fn new(conn: SecureConnection<D>, pool: Arc<PoolInner<D>>) -> Self {
        Self {
            conn: Some(conn),
            pool,
        }
    }

    /// Returns the connection to the pool. Equivalent to dropping it.
    pub fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }

    /// Closes the connection instead of returning it, freeing its slot.
    pub fn discard(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.discard(conn);
        }
    }
}

impl<D: Driver> Deref for PooledConnection<D> {
    type Target = SecureConnection<D>;

    fn deref(&self) -> &Self::Target {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("connection accessed after release"),
        }
    }
}

impl<D: Driver> DerefMut for PooledConnection<D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.conn {
            Some(conn) => conn,
            None => unreachable!("connection accessed after release"),
        }
    }
}

impl<D: Driver> Drop for PooledConnection<D> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

impl<D: Driver> fmt::Debug for PooledConnection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .finish()
    }
}
