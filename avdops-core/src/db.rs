use std::ops::{Deref, DerefMut};

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection};

use crate::config::DatabaseConfig;
use crate::error::RollupError;

/// Opens one connection per call to the sessions store. No pooling, no retries.
#[derive(Debug, Clone)]
pub struct Connector {
    config: DatabaseConfig,
}

impl Connector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn target(&self) -> String {
        self.config.target()
    }

    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .password(&self.config.password)
            .database(&self.config.database)
            // Bucket logon_time in the server's own time zone.
            .timezone(None::<String>)
    }

    /// Make a single connection attempt, bounded by the connect timeout.
    pub async fn open(&self) -> Result<ScopedConnection, RollupError> {
        let target = self.target();
        let timeout = self.config.connect_timeout();
        tracing::debug!("Connecting to {}", target);

        match tokio::time::timeout(timeout, self.connect_options().connect()).await {
            Ok(Ok(conn)) => {
                tracing::debug!("Connected to {}", target);
                Ok(ScopedConnection { conn, target })
            }
            Ok(Err(source)) => Err(RollupError::Connection { target, source }),
            Err(_) => Err(RollupError::ConnectTimeout { target, after: timeout }),
        }
    }
}

/// A live connection that is closed when released or dropped.
///
/// [`ScopedConnection::release`] performs the protocol-level goodbye; if the
/// handle is dropped instead (early return, `?`, unwinding) the underlying
/// socket is closed by the driver.
#[derive(Debug)]
pub struct ScopedConnection {
    conn: MySqlConnection,
    target: String,
}

impl ScopedConnection {
    pub async fn release(self) {
        match self.conn.close().await {
            Ok(()) => tracing::debug!("Released connection to {}", self.target),
            Err(e) => tracing::warn!("Closing connection to {} failed: {}", self.target, e),
        }
    }
}

impl Deref for ScopedConnection {
    type Target = MySqlConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for ScopedConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}
