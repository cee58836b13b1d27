//! In-memory stand-in for a MariaDB server and its driver.

#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use mariadb_safe_pool::{
    CapabilityFlags, ConnectionOptions, Driver, RowSet, ServerError, Session, Value,
};
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MockError {
    #[error("connection refused")]
    Refused,

    #[error("lost connection to server")]
    Io,

    #[error("server error: {0}")]
    Server(#[from] ServerError),
}

#[derive(Debug, Default)]
pub struct SessionHandle {
    broken: AtomicBool,
    closed: AtomicBool,
}

impl SessionHandle {
    pub fn break_transport(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockServer {
    connects: AtomicUsize,
    fail_next: AtomicUsize,
    /// Negotiate multi-statements no matter what the client asks for.
    force_multi_statements: AtomicBool,
    latency: Mutex<Option<Duration>>,
    requested_flags: Mutex<Vec<CapabilityFlags>>,
    sessions: Mutex<Vec<Arc<SessionHandle>>>,
}

impl MockServer {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn force_multi_statements(&self) {
        self.force_multi_statements.store(true, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn requested_flags(&self) -> Vec<CapabilityFlags> {
        self.requested_flags.lock().clone()
    }

    pub fn session(&self, index: usize) -> Arc<SessionHandle> {
        self.sessions.lock()[index].clone()
    }

    pub fn sessions(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions.lock().clone()
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions
            .lock()
            .iter()
            .filter(|s| !s.is_closed())
            .count()
    }
}

#[derive(Clone, Default)]
pub struct MockDriver {
    pub server: Arc<MockServer>,
}

impl MockDriver {
    pub fn new() -> (Self, Arc<MockServer>) {
        let driver = Self::default();
        let server = driver.server.clone();
        (driver, server)
    }
}

impl Driver for MockDriver {
    type Session = MockSession;
    type Error = MockError;

    async fn connect(
        &self,
        _options: &ConnectionOptions,
        client_flags: CapabilityFlags,
    ) -> Result<MockSession, MockError> {
        self.server.requested_flags.lock().push(client_flags);

        let latency = *self.server.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failed = self
            .server
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(MockError::Refused);
        }

        let mut negotiated = client_flags;
        if self.server.force_multi_statements.load(Ordering::SeqCst) {
            negotiated.insert(CapabilityFlags::CLIENT_MULTI_STATEMENTS);
        }

        let handle = Arc::new(SessionHandle::default());
        self.server.sessions.lock().push(handle.clone());
        self.server.connects.fetch_add(1, Ordering::SeqCst);

        Ok(MockSession {
            flags: negotiated,
            handle,
            last_insert_id: 0,
        })
    }
}

pub struct MockSession {
    flags: CapabilityFlags,
    handle: Arc<SessionHandle>,
    last_insert_id: u64,
}

impl Session for MockSession {
    type Error = MockError;

    async fn execute(&mut self, statement: &str, params: &[Value]) -> Result<RowSet, MockError> {
        if self.is_broken() || self.handle.is_closed() {
            return Err(MockError::Io);
        }

        let statements: Vec<&str> = statement
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if statements.len() > 1 && !self.flags.allows_multi_statements() {
            return Err(ServerError::new(
                1064,
                "42000",
                "You have an error in your SQL syntax; check the manual that corresponds to \
                 your MariaDB server version for the right syntax to use near 'SELECT 2'",
            )
            .into());
        }

        let Some(first) = statements.first() else {
            return Err(ServerError::new(1065, "42000", "Query was empty").into());
        };
        if first.starts_with("INSERT ") {
            self.last_insert_id += 1;
            return Ok(RowSet::affected(1, Some(self.last_insert_id)));
        }
        select(first, params)
    }

    fn client_flags(&self) -> CapabilityFlags {
        self.flags
    }

    fn is_broken(&self) -> bool {
        self.handle.broken.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        self.handle.closed.store(true, Ordering::SeqCst);
    }
}

/// Understands `SELECT <literal or ?>[, ...] [AS alias]` and treats anything else as a write
/// touching one row. A comma-separated list yields one row per item.
fn select(statement: &str, params: &[Value]) -> Result<RowSet, MockError> {
    let Some(rest) = statement.strip_prefix("SELECT ") else {
        return Ok(RowSet::affected(1, None));
    };

    let (expr, alias) = match rest.split_once(" AS ") {
        Some((expr, alias)) => (expr.trim(), alias.trim().to_string()),
        None => (rest.trim(), rest.trim().to_string()),
    };

    let rows = expr
        .split(',')
        .map(str::trim)
        .map(|item| {
            let value = if item == "?" {
                params.first().cloned().unwrap_or(Value::Null)
            } else if let Ok(n) = item.parse::<i64>() {
                Value::Int(n)
            } else {
                Value::Text(item.trim_matches('\'').to_string())
            };
            vec![value]
        })
        .collect();

    Ok(RowSet::new(vec![alias], rows))
}
