pub mod config;
pub mod connection;
pub mod error;
pub(crate) mod guard;
pub mod state;

use std::{
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use config::PoolConfig;
use connection::PooledConnection;
use error::PoolError;
use guard::{SlotGuard, WaitGuard};
use parking_lot::Mutex;
use state::{Eviction, PoolState, PoolStatus};
use tokio::{sync::Notify, time::Instant};

use crate::{
    connection::{ConnectionState, SecureConnection},
    driver::Driver,
    error::ConnectError,
    options::ConnectionOptions,
};

/// A bounded pool of [`SecureConnection`]s.
///
/// Connections are created lazily up to `max_size`. Every `acquire` first sweeps the free list,
/// closing connections whose transport died or that sat idle past the recycle deadline, then
/// hands out the most recently released survivor. When the pool is full the caller waits until
/// another holder releases.
pub struct Pool<D: Driver> {
    inner: Arc<PoolInner<D>>,
}

impl<D: Driver> Clone for Pool<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Driver> Pool<D> {
    /// Creates the pool and opens `min_size` connections before returning.
    pub async fn connect(
        driver: D,
        options: ConnectionOptions,
        pool_config: PoolConfig,
    ) -> Result<Self, PoolError> {
        pool_config.validate()?;
        let inner = PoolInner::new_arc(driver, options, pool_config);
        if pool_config.min_size > 0 {
            inner.fill_to_minimum(false).await?;
        }
        Ok(Self { inner })
    }

    pub fn builder() -> PoolBuilder<D> {
        PoolBuilder::new()
    }

    pub async fn acquire(&self) -> Result<PooledConnection<D>, PoolError> {
        match self.inner.config.acquire_timeout {
            Some(timeout) => self.acquire_timeout(timeout).await,
            None => self.inner.acquire().await,
        }
    }

    /// Like [`acquire`](Self::acquire) but gives up with [`PoolError::Timeout`] after `timeout`.
    pub async fn acquire_timeout(
        &self,
        timeout: Duration,
    ) -> Result<PooledConnection<D>, PoolError> {
        tokio::time::timeout(timeout, self.inner.acquire()).await?
    }

    /// Opens connections until the pool holds `min_size`. With `force`, also opens one extra
    /// connection when nothing is free and the pool is below `max_size`.
    pub async fn fill_to_minimum(&self, force: bool) -> Result<(), PoolError> {
        self.inner.fill_to_minimum(force).await
    }

    /// Closes every free connection. The pool stays usable.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Closes free connections now and checked-out connections when they are released.
    /// Further `acquire` calls fail with [`PoolError::Closed`].
    pub fn close_all(&self) {
        self.inner.close();
    }

    /// Like [`close_all`](Self::close_all), but checked-out connections also fail their next
    /// operation with [`ExecError::Closed`](crate::ExecError::Closed).
    pub fn terminate(&self) {
        self.inner.terminated.store(true, Ordering::Release);
        self.inner.close();
    }

    /// Resolves once the pool is closed and every connection has been returned and closed.
    pub async fn wait_closed(&self) {
        self.inner.wait_closed().await;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn size(&self) -> usize {
        self.inner.state.lock().size()
    }

    pub fn free_size(&self) -> usize {
        self.inner.state.lock().free.len()
    }

    pub fn in_use(&self) -> usize {
        self.inner.state.lock().in_use
    }

    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight
    }

    pub fn waiting(&self) -> usize {
        self.inner.waiting.load(Ordering::Acquire)
    }

    pub fn min_size(&self) -> usize {
        self.inner.config.min_size
    }

    pub fn max_size(&self) -> usize {
        self.inner.config.max_size
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            size: state.size(),
            free: state.free.len(),
            in_use: state.in_use,
            in_flight: state.in_flight,
            waiting: self.inner.waiting.load(Ordering::Acquire),
            min_size: self.inner.config.min_size,
            max_size: self.inner.config.max_size,
            closed: state.closed,
        }
    }
}

pub struct PoolBuilder<D: Driver> {
    pool_config: PoolConfig,
    options: ConnectionOptions,
    _driver: PhantomData<D>,
}

impl<D: Driver> Default for PoolBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Driver> PoolBuilder<D> {
    pub fn new() -> Self {
        Self {
            pool_config: PoolConfig::default(),
            options: ConnectionOptions::default(),
            _driver: PhantomData,
        }
    }

    pub fn pool_config(mut self, pool_config: PoolConfig) -> Self {
        self.pool_config = pool_config;
        self
    }

    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn build(self, driver: D) -> Result<Pool<D>, PoolError> {
        Pool::connect(driver, self.options, self.pool_config).await
    }
}

/// Creates a pool with the given bounds. A negative `recycle_seconds` disables recycling.
pub async fn create_pool<D: Driver>(
    min_size: usize,
    max_size: usize,
    recycle_seconds: i64,
    options: ConnectionOptions,
    driver: D,
) -> Result<Pool<D>, PoolError> {
    let config = PoolConfig::new(max_size, min_size).with_recycle_seconds(recycle_seconds);
    Pool::connect(driver, options, config).await
}

enum Step<D: Driver> {
    Ready(SecureConnection<D>),
    Create,
    Wait,
}

pub(crate) struct PoolInner<D: Driver> {
    driver: Arc<D>,
    options: Arc<ConnectionOptions>,
    config: PoolConfig,
    pub(crate) state: Mutex<PoolState<D>>,
    pub(crate) notify: Notify,
    drained: Notify,
    terminated: Arc<AtomicBool>,
    waiting: AtomicUsize,
}

impl<D: Driver> PoolInner<D> {
    fn new_arc(driver: D, options: ConnectionOptions, pool_config: PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            driver: Arc::new(driver),
            options: Arc::new(options),
            config: pool_config,
            state: Mutex::new(PoolState::new(pool_config.max_size)),
            notify: Notify::new(),
            drained: Notify::new(),
            terminated: Arc::new(AtomicBool::new(false)),
            waiting: AtomicUsize::new(0),
        })
    }

    async fn acquire(self: &Arc<Self>) -> Result<PooledConnection<D>, PoolError> {
        loop {
            // Registered before the state is inspected so a release in between is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (step, evicted) = {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(PoolError::Closed);
                }
                let evicted = state.maintain(Instant::now(), self.config.recycle);
                let step = if let Some(conn) = state.free.pop_back() {
                    state.in_use += 1;
                    Step::Ready(conn)
                } else if state.size() < self.config.max_size {
                    state.in_flight += 1;
                    Step::Create
                } else {
                    Step::Wait
                };
                (step, evicted)
            };
            close_evicted(evicted);

            match step {
                Step::Ready(mut conn) => {
                    conn.touch();
                    return Ok(PooledConnection::new(conn, self.clone()));
                }
                Step::Create => {
                    let slot = SlotGuard::new(self.clone());
                    let conn = self.create_connection().await?;
                    return slot.checkout(conn);
                }
                Step::Wait => {
                    let _waiting = WaitGuard::new(&self.waiting);
                    notified.await;
                }
            }
        }
    }

    async fn fill_to_minimum(self: &Arc<Self>, force: bool) -> Result<(), PoolError> {
        let evicted = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }
            state.maintain(Instant::now(), self.config.recycle)
        };
        close_evicted(evicted);

        loop {
            let slot = {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(PoolError::Closed);
                }
                if state.size() >= self.config.min_size {
                    break;
                }
                state.in_flight += 1;
                SlotGuard::new(self.clone())
            };
            let conn = self.create_connection().await?;
            slot.release_to_free(conn);
        }

        if force {
            let slot = {
                let mut state = self.state.lock();
                if state.closed || !state.free.is_empty() || state.size() >= self.config.max_size
                {
                    return Ok(());
                }
                state.in_flight += 1;
                SlotGuard::new(self.clone())
            };
            let conn = self.create_connection().await?;
            slot.release_to_free(conn);
        }

        Ok(())
    }

    async fn create_connection(&self) -> Result<SecureConnection<D>, ConnectError> {
        let mut conn = SecureConnection::new(self.driver.clone(), self.options.clone())
            .with_termination(self.terminated.clone());
        match conn.connect().await {
            Ok(()) => Ok(conn),
            Err(e) => {
                tracing::warn!(
                    address = %self.options.address(),
                    error = %e,
                    "failed to open pooled connection"
                );
                Err(e)
            }
        }
    }

    pub(crate) fn release(&self, mut conn: SecureConnection<D>) {
        let mut state = self.state.lock();
        state.in_use = state.in_use.saturating_sub(1);
        if !state.closed && conn.state() == ConnectionState::Open {
            conn.touch();
            tracing::trace!(conn_id = conn.id(), "connection released");
            state.free.push_back(conn);
            drop(state);
            self.notify.notify_one();
            return;
        }
        drop(state);

        tracing::debug!(
            conn_id = conn.id(),
            state = ?conn.state(),
            "closing released connection"
        );
        conn.close();
        self.notify.notify_one();
        self.notify_if_drained();
    }

    pub(crate) fn discard(&self, mut conn: SecureConnection<D>) {
        {
            let mut state = self.state.lock();
            state.in_use = state.in_use.saturating_sub(1);
        }
        tracing::debug!(conn_id = conn.id(), "discarding connection");
        conn.close();
        self.notify.notify_one();
        self.notify_if_drained();
    }

    fn clear(&self) {
        let free: Vec<_> = self.state.lock().free.drain(..).collect();
        for mut conn in free {
            conn.close();
        }
        self.notify.notify_one();
    }

    fn close(&self) {
        let free: Vec<_> = {
            let mut state = self.state.lock();
            if !state.closed {
                state.closed = true;
                tracing::info!(
                    in_use = state.in_use,
                    free = state.free.len(),
                    "closing connection pool"
                );
            }
            state.free.drain(..).collect()
        };
        for mut conn in free {
            conn.close();
        }
        self.notify.notify_waiters();
        self.notify_if_drained();
    }

    async fn wait_closed(&self) {
        loop {
            let drained = self.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();

            {
                let state = self.state.lock();
                if state.closed && state.size() == 0 {
                    return;
                }
            }
            drained.await;
        }
    }

    pub(crate) fn notify_if_drained(&self) {
        let drained = {
            let state = self.state.lock();
            state.closed && state.size() == 0
        };
        if drained {
            self.drained.notify_waiters();
        }
    }
}

fn close_evicted<D: Driver>(evicted: Vec<(SecureConnection<D>, Eviction)>) {
    for (mut conn, reason) in evicted {
        let idle_ms = u64::try_from(conn.idle_for(Instant::now()).as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(
            conn_id = conn.id(),
            idle_ms,
            %reason,
            "evicting free connection"
        );
        conn.close();
    }
}
