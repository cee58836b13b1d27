use thiserror::Error;
use tokio::time::error::Elapsed;

use crate::error::ConnectError;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("timed out waiting for a free connection")]
    Timeout(#[from] Elapsed),

    #[error("pool is closed")]
    Closed,

    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),
}
