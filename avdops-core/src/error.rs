use std::time::Duration;

use thiserror::Error;

/// Coarse classification of a [`RollupError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The database could not be reached or rejected the credentials.
    Connection,
    /// The store rejected the query or returned rows outside the contract.
    Query,
    /// The environment did not describe a usable configuration.
    Config,
}

#[derive(Error, Debug)]
pub enum RollupError {
    #[error("Connection error ({target}): {source}")]
    Connection {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Connection error ({target}): no handshake after {after:?}")]
    ConnectTimeout { target: String, after: Duration },

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Query error: no result after {after:?}")]
    QueryTimeout { after: Duration },

    #[error("Query error: invalid row: {0}")]
    InvalidRow(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl RollupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } | Self::ConnectTimeout { .. } => ErrorKind::Connection,
            Self::Query(_) | Self::QueryTimeout { .. } | Self::InvalidRow(_) => ErrorKind::Query,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_connection(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }

    pub fn is_query(&self) -> bool {
        self.kind() == ErrorKind::Query
    }
}
