pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod rollup;

pub use config::DatabaseConfig;
pub use db::{Connector, ScopedConnection};
pub use error::{ErrorKind, RollupError};
pub use models::RollupRow;
pub use rollup::{peak_concurrency, PEAK_CONCURRENCY_SQL};
