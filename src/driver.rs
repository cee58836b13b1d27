//! The contract between the pool and the wire-protocol driver.
//!
//! The pool does not speak the MariaDB protocol itself. A driver establishes a session with the
//! capability flags it is handed, runs statements over it and reports whether the transport is
//! still usable.

use std::{fmt, future::Future};

use crate::{options::ConnectionOptions, protocol::CapabilityFlags};

pub trait Driver: 'static + Send + Sync {
    type Session: Session;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opens a transport and performs the handshake, sending exactly `client_flags` in the
    /// handshake response.
    fn connect(
        &self,
        options: &ConnectionOptions,
        client_flags: CapabilityFlags,
    ) -> impl Future<Output = Result<Self::Session, Self::Error>> + Send;
}

pub trait Session: 'static + Send {
    type Error: std::error::Error + Send + Sync + 'static;

    fn execute(
        &mut self,
        statement: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<RowSet, Self::Error>> + Send;

    /// Capability flags in effect for the session after the handshake.
    fn client_flags(&self) -> CapabilityFlags;

    /// True once the peer hung up or the transport holds an unread error.
    fn is_broken(&self) -> bool;

    /// Closes the transport without a goodbye packet. Must not block.
    fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

pub type Row = Vec<Value>;

/// Result of a single statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub affected_rows: u64,
    pub last_insert_id: Option<u64>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            ..Default::default()
        }
    }

    pub fn affected(affected_rows: u64, last_insert_id: Option<u64>) -> Self {
        Self {
            affected_rows,
            last_insert_id,
            ..Default::default()
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// An `ERR` packet returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub code: u16,
    pub sql_state: String,
    pub message: String,
}

impl ServerError {
    pub fn new(code: u16, sql_state: &str, message: &str) -> Self {
        Self {
            code,
            sql_state: sql_state.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) [{}] {}", self.code, self.sql_state, self.message)
    }
}

impl std::error::Error for ServerError {}
