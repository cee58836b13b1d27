use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::time::Instant;

use crate::{
    driver::{Driver, Row, RowSet, Session, Value},
    error::{ConnectError, ExecError},
    options::ConnectionOptions,
    protocol::CapabilityFlags,
};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, handshake not performed yet.
    New,
    Open,
    /// The peer hung up or the transport has a pending error.
    Broken,
    Closed,
}

/// A single driver session that never negotiates `CLIENT_MULTI_STATEMENTS`.
///
/// The flag is removed from the locally held capability set before the driver is asked to
/// perform the handshake, so the server only ever accepts one statement per request. A
/// request such as `SELECT 1; SELECT 2` is rejected by the server and surfaces as
/// [`ExecError::Driver`].
pub struct SecureConnection<D: Driver> {
    id: u64,
    driver: Arc<D>,
    options: Arc<ConnectionOptions>,
    client_flags: CapabilityFlags,
    session: Option<D::Session>,
    closed: bool,
    last_usage: Instant,
    terminated: Option<Arc<AtomicBool>>,
}

impl<D: Driver> SecureConnection<D> {
    pub fn new(driver: Arc<D>, options: Arc<ConnectionOptions>) -> Self {
        let client_flags = options.client_flags();
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            driver,
            options,
            client_flags,
            session: None,
            closed: false,
            last_usage: Instant::now(),
            terminated: None,
        }
    }

    /// Closes the connection on its next operation once `flag` is set.
    pub(crate) fn with_termination(mut self, flag: Arc<AtomicBool>) -> Self {
        self.terminated = Some(flag);
        self
    }

    pub async fn connect(&mut self) -> Result<(), ConnectError> {
        if self.session.is_some() {
            return Err(ConnectError::AlreadyConnected);
        }

        self.client_flags = self.client_flags & !CapabilityFlags::CLIENT_MULTI_STATEMENTS;

        let mut session = self
            .driver
            .connect(&self.options, self.client_flags)
            .await
            .map_err(|e| ConnectError::Driver(Box::new(e)))?;

        if session.client_flags().allows_multi_statements() {
            session.close();
            self.closed = true;
            tracing::warn!(
                conn_id = self.id,
                address = %self.options.address(),
                "driver negotiated multi-statements, connection refused"
            );
            return Err(ConnectError::MultiStatementsNegotiated);
        }

        self.session = Some(session);
        self.closed = false;
        self.last_usage = Instant::now();
        tracing::debug!(
            conn_id = self.id,
            address = %self.options.address(),
            flags = ?self.client_flags,
            "connection established"
        );
        Ok(())
    }

    pub async fn execute(
        &mut self,
        statement: &str,
        params: &[Value],
    ) -> Result<RowSet, ExecError> {
        if self.is_terminated() {
            self.close();
            return Err(ExecError::Closed);
        }
        if self.closed {
            return Err(ExecError::Closed);
        }
        let session = self.session.as_mut().ok_or(ExecError::NotConnected)?;
        if self.options.echo() {
            tracing::debug!(conn_id = self.id, statement, params = params.len(), "execute");
        }

        session
            .execute(statement, params)
            .await
            .map_err(|e| ExecError::Driver(Box::new(e)))
    }

    pub fn cursor(&mut self) -> Cursor<'_, D> {
        Cursor {
            conn: self,
            result: None,
            position: 0,
        }
    }

    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
            tracing::debug!(conn_id = self.id, "connection closed");
        }
        self.closed = true;
    }

    pub fn state(&self) -> ConnectionState {
        match &self.session {
            _ if self.closed => ConnectionState::Closed,
            None => ConnectionState::New,
            Some(session) if session.is_broken() => ConnectionState::Broken,
            Some(_) => ConnectionState::Open,
        }
    }

    pub fn is_broken(&self) -> bool {
        self.state() == ConnectionState::Broken
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Flags sent in the handshake response.
    pub fn client_flags(&self) -> CapabilityFlags {
        self.client_flags
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn last_usage(&self) -> Instant {
        self.last_usage
    }

    pub(crate) fn touch(&mut self) {
        self.last_usage = Instant::now();
    }

    pub(crate) fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_usage)
    }

    fn is_terminated(&self) -> bool {
        self.terminated
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Acquire))
    }
}

impl<D: Driver> Drop for SecureConnection<D> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<D: Driver> fmt::Debug for SecureConnection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureConnection")
            .field("id", &self.id)
            .field("address", &self.options.address())
            .field("client_flags", &self.client_flags)
            .field("state", &self.state())
            .finish()
    }
}

/// Creates a [`SecureConnection`] and performs the handshake.
pub async fn safe_connect<D: Driver>(
    driver: Arc<D>,
    options: Arc<ConnectionOptions>,
) -> Result<SecureConnection<D>, ConnectError> {
    let mut conn = SecureConnection::new(driver, options);
    conn.connect().await?;
    Ok(conn)
}

/// Buffered, row-at-a-time access to the result of the last executed statement.
pub struct Cursor<'a, D: Driver> {
    conn: &'a mut SecureConnection<D>,
    result: Option<RowSet>,
    position: usize,
}

impl<'a, D: Driver> Cursor<'a, D> {
    /// Runs `statement` and returns the number of rows it produced or affected.
    pub async fn execute(&mut self, statement: &str, params: &[Value]) -> Result<u64, ExecError> {
        self.result = None;
        self.position = 0;

        let result = self.conn.execute(statement, params).await?;
        let count = if result.columns.is_empty() {
            result.affected_rows
        } else {
            result.rows.len() as u64
        };
        self.result = Some(result);
        Ok(count)
    }

    pub fn fetch_one(&mut self) -> Option<Row> {
        let row = self.result.as_ref()?.rows.get(self.position)?.clone();
        self.position += 1;
        Some(row)
    }

    pub fn fetch_many(&mut self, size: usize) -> Vec<Row> {
        let Some(result) = self.result.as_ref() else {
            return Vec::new();
        };
        let end = result.rows.len().min(self.position.saturating_add(size));
        let rows = result.rows[self.position..end].to_vec();
        self.position = end;
        rows
    }

    pub fn fetch_all(&mut self) -> Vec<Row> {
        self.fetch_many(usize::MAX)
    }

    pub fn columns(&self) -> &[String] {
        self.result
            .as_ref()
            .map(|r| r.columns.as_slice())
            .unwrap_or_default()
    }

    pub fn row_count(&self) -> Option<u64> {
        self.result.as_ref().map(|r| {
            if r.columns.is_empty() {
                r.affected_rows
            } else {
                r.rows.len() as u64
            }
        })
    }

    pub fn last_insert_id(&self) -> Option<u64> {
        self.result.as_ref().and_then(|r| r.last_insert_id)
    }
}
