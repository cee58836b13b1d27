use thiserror::Error;

use crate::driver::ServerError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to connect to the database: {0}")]
    Driver(#[source] BoxError),

    #[error("server negotiated multi-statement execution")]
    MultiStatementsNegotiated,

    #[error("connection is already established")]
    AlreadyConnected,
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("statement failed: {0}")]
    Driver(#[source] BoxError),

    #[error("connection is not established")]
    NotConnected,

    #[error("connection is closed")]
    Closed,
}

impl ExecError {
    /// The error packet sent by the server, if this failure came from one.
    pub fn server_error(&self) -> Option<&ServerError> {
        let ExecError::Driver(source) = self else {
            return None;
        };
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(source.as_ref());
        while let Some(err) = current {
            if let Some(server) = err.downcast_ref::<ServerError>() {
                return Some(server);
            }
            current = err.source();
        }
        None
    }
}

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("invalid connection url: {0}")]
    Url(#[from] url::ParseError),

    #[error("unsupported url scheme `{0}`, expected `mysql` or `mariadb`")]
    Scheme(String),

    #[error("connection url has no host")]
    MissingHost,

    #[error("invalid percent-encoding in `{0}`")]
    Encoding(&'static str),
}
