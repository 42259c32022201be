//! Access to user databases
//!
//! A [`RemoteConnection`] is opened per request from a stored connection URI,
//! used for schema introspection or ad-hoc SQL, and dropped afterwards.
//! Dialect-specific queries live in the `mysql`, `postgres` and `sqlite`
//! submodules; everything above them sees the same [`Schema`] and
//! [`QueryOutput`] shapes.

mod mysql;
mod postgres;
mod sqlite;
mod value;

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::mysql::MySqlConnection;
use sqlx::postgres::PgConnection;
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;
use text2sql_core::{DbUri, Dialect, UriError};

/// Table name → columns, ordered by table name
pub type Schema = BTreeMap<String, Vec<ColumnInfo>>;

/// One column of an introspected table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    /// `"YES"` or `"NO"`
    pub nullable: String,
    pub default_value: Option<String>,
    /// MySQL-style column key: `PRI`, `UNI`, `MUL`
    pub key: Option<String>,
}

impl ColumnInfo {
    pub fn is_nullable(&self) -> bool {
        self.nullable.eq_ignore_ascii_case("YES")
    }

    pub fn is_primary_key(&self) -> bool {
        self.key.as_deref() == Some("PRI")
    }
}

/// Result of running a SQL string
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryOutput {
    /// Column names of the returned rows (empty when no rows came back)
    pub columns: Vec<String>,
    /// One JSON object per row, keyed by column name
    pub data: Vec<Map<String, Value>>,
    pub rows_affected: u64,
}

/// Errors talking to a user database
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("invalid database URI: {0}")]
    Uri(#[from] UriError),

    #[error("unsupported database type: {0}")]
    Unsupported(Dialect),

    #[error("timed out connecting to database after {0} seconds")]
    Timeout(u64),

    #[error("could not connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("schema introspection failed: {0}")]
    Introspect(#[source] sqlx::Error),

    #[error("{0}")]
    Query(#[source] sqlx::Error),
}

/// A single open connection to a user database
pub enum RemoteConnection {
    Mysql(MySqlConnection),
    Postgres(PgConnection),
    Sqlite(SqliteConnection),
}

impl RemoteConnection {
    /// Connect to a stored URI, giving up after `timeout`.
    pub async fn connect_str(uri: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let uri = DbUri::parse(uri)?;
        Self::connect(&uri, timeout).await
    }

    pub async fn connect(uri: &DbUri, timeout: Duration) -> Result<Self, RemoteError> {
        let dialect = uri.dialect();
        tracing::debug!(uri = %uri, %dialect, "connecting to user database");
        let url = uri.driver_url();

        let connecting = async {
            let conn = match dialect {
                Dialect::Mysql => MySqlConnection::connect(&url).await.map(Self::Mysql),
                Dialect::Postgres => PgConnection::connect(&url).await.map(Self::Postgres),
                Dialect::Sqlite => sqlite::connect(&url).await.map(Self::Sqlite),
                other => return Err(RemoteError::Unsupported(other)),
            };
            conn.map_err(|e| {
                tracing::warn!(uri = %uri, error = %e, "user database connection failed");
                RemoteError::Connect(e)
            })
        };

        match tokio::time::timeout(timeout, connecting).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(timeout.as_secs())),
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Self::Mysql(_) => Dialect::Mysql,
            Self::Postgres(_) => Dialect::Postgres,
            Self::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Describe every table (and view) visible in the connected database.
    pub async fn introspect(&mut self) -> Result<Schema, RemoteError> {
        let columns = match self {
            Self::Mysql(conn) => mysql::introspect(conn).await,
            Self::Postgres(conn) => postgres::introspect(conn).await,
            Self::Sqlite(conn) => sqlite::introspect(conn).await,
        }
        .map_err(RemoteError::Introspect)?;

        Ok(group_by_table(columns))
    }

    /// Run an arbitrary SQL string in a transaction committed on success.
    pub async fn execute(&mut self, sql: &str) -> Result<QueryOutput, RemoteError> {
        match self {
            Self::Mysql(conn) => mysql::execute(conn, sql).await,
            Self::Postgres(conn) => postgres::execute(conn, sql).await,
            Self::Sqlite(conn) => sqlite::execute(conn, sql).await,
        }
        .map_err(RemoteError::Query)
    }

    /// Close the connection cleanly; errors are only logged.
    pub async fn close(self) {
        let result = match self {
            Self::Mysql(conn) => conn.close().await,
            Self::Postgres(conn) => conn.close().await,
            Self::Sqlite(conn) => conn.close().await,
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, "error closing user database connection");
        }
    }
}

/// Rows of (table, column) in ordinal order
type ColumnRow = (String, ColumnInfo);

fn group_by_table(rows: Vec<ColumnRow>) -> Schema {
    let mut schema = Schema::new();
    for (table, column) in rows {
        schema.entry(table).or_default().push(column);
    }
    schema
}

/// Empty strings from catalog queries mean "no value".
fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.is_empty())
}
