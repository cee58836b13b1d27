use std::{collections::VecDeque, fmt, time::Duration};

use tokio::time::Instant;

use crate::{
    connection::{ConnectionState, SecureConnection},
    driver::Driver,
};

/// Free list and slot accounting, only ever touched under the pool mutex.
pub(crate) struct PoolState<D: Driver> {
    /// Oldest release at the front, most recent at the back.
    pub(crate) free: VecDeque<SecureConnection<D>>,
    pub(crate) in_use: usize,
    pub(crate) in_flight: usize,
    pub(crate) closed: bool,
}

impl<D: Driver> PoolState<D> {
    pub(crate) fn new(max_size: usize) -> Self {
        Self {
            free: VecDeque::with_capacity(max_size),
            in_use: 0,
            in_flight: 0,
            closed: false,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.free.len() + self.in_use + self.in_flight
    }

    /// Walks the free list oldest first and removes connections that are no longer open or
    /// have been idle longer than `recycle`. Survivors keep their relative order.
    pub(crate) fn maintain(
        &mut self,
        now: Instant,
        recycle: Option<Duration>,
    ) -> Vec<(SecureConnection<D>, Eviction)> {
        let mut evicted = Vec::new();
        for _ in 0..self.free.len() {
            let Some(conn) = self.free.pop_front() else {
                break;
            };
            if conn.state() != ConnectionState::Open {
                evicted.push((conn, Eviction::Dead));
            } else if recycle.map_or(false, |recycle| conn.idle_for(now) > recycle) {
                evicted.push((conn, Eviction::Recycled));
            } else {
                self.free.push_back(conn);
            }
        }
        evicted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Eviction {
    Dead,
    Recycled,
}

impl fmt::Display for Eviction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eviction::Dead => f.write_str("transport closed or broken"),
            Eviction::Recycled => f.write_str("idle past recycle deadline"),
        }
    }
}

/// Point-in-time view of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct PoolStatus {
    /// Free, in use and being created.
    pub size: usize,
    pub free: usize,
    pub in_use: usize,
    pub in_flight: usize,
    /// Callers blocked in `acquire`.
    pub waiting: usize,
    pub min_size: usize,
    pub max_size: usize,
    pub closed: bool,
}
