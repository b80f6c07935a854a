//! Hourly session rollup.
//!
//! Groups `sessions.logon_time` into (calendar date, hour) buckets and counts
//! the sessions in each, most recent bucket first.

use std::time::Duration;

use chrono::NaiveDate;
use sqlx::mysql::MySqlRow;
use sqlx::Row;

use crate::db::{Connector, ScopedConnection};
use crate::error::RollupError;
use crate::models::RollupRow;

/// The rollup query. Downstream reports compare against this text, keep it byte-for-byte.
pub const PEAK_CONCURRENCY_SQL: &str = "SELECT DATE(logon_time) AS d, HOUR(logon_time) AS h, COUNT(*) AS concurrent
FROM sessions
GROUP BY d, h
ORDER BY d DESC, h DESC;";

/// Run the rollup on a fresh connection and return every bucket, newest first.
///
/// The connection is released before returning, on success and on failure.
pub async fn peak_concurrency(connector: &Connector) -> Result<Vec<RollupRow>, RollupError> {
    let mut conn = connector.open().await?;
    let result = fetch_peak_concurrency(&mut conn, connector.config().query_timeout()).await;
    conn.release().await;

    let rows = result?;
    tracing::info!("Peak concurrency rollup: {} buckets from {}", rows.len(), connector.target());
    Ok(rows)
}

/// Run the rollup on an already open connection. Issues exactly one query.
pub async fn fetch_peak_concurrency(
    conn: &mut ScopedConnection,
    timeout: Duration,
) -> Result<Vec<RollupRow>, RollupError> {
    // Text protocol: the statement ends in `;`, which server-side prepare rejects.
    let query = sqlx::raw_sql(PEAK_CONCURRENCY_SQL).fetch_all(&mut **conn);
    let raw = match tokio::time::timeout(timeout, query).await {
        Ok(rows) => rows?,
        Err(_) => return Err(RollupError::QueryTimeout { after: timeout }),
    };

    collect_buckets(raw.iter().map(read_columns))
}

/// Raw `(d, h, concurrent)` values of one result row.
type Columns = (Option<NaiveDate>, Option<i64>, i64);

fn read_columns(row: &MySqlRow) -> Result<Columns, RollupError> {
    let date: Option<NaiveDate> = row.try_get("d")?;
    // HOUR() is INT or BIGINT depending on server version.
    let hour: Option<i64> = row.try_get_unchecked("h")?;
    let concurrent: i64 = row.try_get_unchecked("concurrent")?;
    Ok((date, hour, concurrent))
}

/// Turn result rows into buckets, keeping the order the server returned.
fn collect_buckets<I>(columns: I) -> Result<Vec<RollupRow>, RollupError>
where
    I: IntoIterator<Item = Result<Columns, RollupError>>,
{
    let mut rows = Vec::new();
    for cols in columns {
        if let Some(row) = bucket_from_columns(cols?)? {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// `Ok(None)` for the NULL `logon_time` group, which has no calendar bucket.
fn bucket_from_columns(
    (date, hour, concurrent): Columns,
) -> Result<Option<RollupRow>, RollupError> {
    let Some(date) = date else {
        tracing::debug!("Skipping {} sessions with no logon_time", concurrent);
        return Ok(None);
    };
    let hour =
        hour.ok_or_else(|| RollupError::InvalidRow(format!("missing hour for {}", date)))?;

    RollupRow::from_parts(date, hour, concurrent).map(Some)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::net::TcpListener;

    use super::*;
    use crate::config::DatabaseConfig;

    #[test]
    fn test_query_text_is_stable() {
        assert_eq!(
            PEAK_CONCURRENCY_SQL,
            "SELECT DATE(logon_time) AS d, HOUR(logon_time) AS h, COUNT(*) AS concurrent\n\
             FROM sessions\n\
             GROUP BY d, h\n\
             ORDER BY d DESC, h DESC;"
        );
    }

    #[test]
    fn test_query_is_read_only() {
        let upper = PEAK_CONCURRENCY_SQL.to_uppercase();
        for keyword in ["INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE"] {
            assert!(!upper.contains(keyword), "rollup query must not contain {}", keyword);
        }
    }

    fn jan1() -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2024, 1, 1)
    }

    #[test]
    fn test_bucket_from_columns_builds_row() {
        let row = bucket_from_columns((jan1(), Some(9), 2)).unwrap().unwrap();

        assert_eq!(row.date, jan1().unwrap());
        assert_eq!(row.hour, 9);
        assert_eq!(row.concurrent, 2);
    }

    #[test]
    fn test_bucket_from_columns_skips_null_logon_time() {
        assert_eq!(bucket_from_columns((None, None, 4)).unwrap(), None);
    }

    #[test]
    fn test_bucket_from_columns_rejects_bad_values() {
        let cases = [
            (jan1(), Some(24), 1),
            (jan1(), Some(-1), 1),
            (jan1(), Some(3), -1),
            (jan1(), None, 1),
        ];
        for cols in cases {
            let err = bucket_from_columns(cols).unwrap_err();
            assert!(matches!(err, RollupError::InvalidRow(_)), "{:?} gave {}", cols, err);
        }
    }

    #[test]
    fn test_collect_buckets_keeps_server_order_and_counts() {
        // What the server returns for logons at 09:15, 09:40 and 10:05 plus one NULL.
        let rows = collect_buckets(vec![
            Ok((jan1(), Some(10), 1)),
            Ok((jan1(), Some(9), 2)),
            Ok((None, None, 1)),
        ])
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].hour, rows[0].concurrent), (10, 1));
        assert_eq!((rows[1].hour, rows[1].concurrent), (9, 2));
        assert!(rows.windows(2).all(|w| w[0].bucket() > w[1].bucket()));
    }

    #[test]
    fn test_collect_buckets_empty_result() {
        assert!(collect_buckets(Vec::<Result<Columns, RollupError>>::new()).unwrap().is_empty());
    }

    #[test]
    fn test_collect_buckets_stops_on_decode_error() {
        let result = collect_buckets(vec![
            Ok((jan1(), Some(10), 1)),
            Err(RollupError::Query(sqlx::Error::RowNotFound)),
        ]);

        assert!(result.unwrap_err().is_query());
    }

    #[tokio::test]
    async fn test_dropped_handshake_is_attempted_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = accepted.clone();
        let server = tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                drop(socket);
            }
        });

        let connector = Connector::new(DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout_secs: 5,
            ..DatabaseConfig::default()
        });
        let err = peak_concurrency(&connector).await.unwrap_err();

        // Give a retry, if there were one, time to reach the listener.
        tokio::time::sleep(Duration::from_millis(200)).await;
        server.abort();

        assert!(err.is_connection(), "expected connection error, got {}", err);
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_database_fails_with_connection_error() {
        let connector = Connector::new(DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            connect_timeout_secs: 5,
            ..DatabaseConfig::default()
        });

        let err = peak_concurrency(&connector).await.unwrap_err();
        assert!(err.is_connection(), "expected connection error, got {}", err);
    }
}
