//! SQLite files

use std::str::FromStr;

use futures::TryStreamExt;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Connection, Either, Row};

use super::value::{self, try_decode, ResultCollector};
use super::{ColumnInfo, ColumnRow, QueryOutput};

const COLUMNS_SQL: &str = r#"
    SELECT m.name, p.name, p.type, p."notnull", p.dflt_value, p.pk
    FROM sqlite_master m
    JOIN pragma_table_info(m.name) p
    WHERE m.type IN ('table', 'view')
        AND m.name NOT LIKE 'sqlite_%'
    ORDER BY m.name, p.cid
"#;

type CatalogRow = (String, String, String, i64, Option<String>, i64);

/// Open an existing database file. A registered URI pointing at a
/// missing file is a connection error, not a new empty database.
pub(super) async fn connect(url: &str) -> Result<SqliteConnection, sqlx::Error> {
    SqliteConnectOptions::from_str(url)?
        .create_if_missing(false)
        .connect()
        .await
}

pub(super) async fn introspect(conn: &mut SqliteConnection) -> Result<Vec<ColumnRow>, sqlx::Error> {
    let rows: Vec<CatalogRow> = sqlx::query_as(COLUMNS_SQL).fetch_all(&mut *conn).await?;

    Ok(rows
        .into_iter()
        .map(|(table, name, data_type, not_null, default_value, pk)| {
            let nullable = if not_null != 0 { "NO" } else { "YES" };
            (
                table,
                ColumnInfo {
                    column_name: name,
                    data_type,
                    nullable: nullable.to_owned(),
                    default_value,
                    key: (pk > 0).then(|| "PRI".to_owned()),
                },
            )
        })
        .collect())
}

pub(super) async fn execute(
    conn: &mut SqliteConnection,
    sql: &str,
) -> Result<QueryOutput, sqlx::Error> {
    let mut tx = conn.begin().await?;
    let mut collector = ResultCollector::new();

    {
        let mut results = sqlx::raw_sql(sql).fetch_many(&mut *tx);
        while let Some(item) = results.try_next().await? {
            match item {
                Either::Left(done) => collector.statement_done(done.rows_affected()),
                Either::Right(row) => collector.row(&row, decode),
            }
        }
    }

    tx.commit().await?;
    Ok(collector.finish())
}

fn decode(row: &SqliteRow, idx: usize) -> Value {
    try_decode!(row, idx,
        i64 => value::int,
        f64 => value::float,
        String => Value::String,
        Vec<u8> => value::bytes,
    );

    // Declared types like DATETIME or BOOLEAN
    row.try_get_unchecked::<Option<String>, _>(idx)
        .ok()
        .flatten()
        .map(Value::String)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::super::{RemoteConnection, RemoteError};
    use sqlx::Connection;
    use std::time::Duration;
    use tempfile::TempDir;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn employees_db() -> (TempDir, String) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("employees.db").display());

        let mut conn = sqlx::SqliteConnection::connect(&format!("{url}?mode=rwc"))
            .await
            .unwrap();
        sqlx::raw_sql(
            "CREATE TABLE departments (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                location TEXT DEFAULT 'HQ'
             );
             CREATE TABLE employees (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                department_id INTEGER REFERENCES departments(id),
                salary REAL
             );
             INSERT INTO departments VALUES (1, 'IT', 'New York'), (2, 'Sales', NULL);
             INSERT INTO employees VALUES (1, 'John Doe', 1, 75000.5), (2, 'Jane Roe', 2, NULL);",
        )
        .execute(&mut conn)
        .await
        .unwrap();
        conn.close().await.unwrap();

        (dir, url)
    }

    #[tokio::test]
    async fn introspects_tables_and_columns() {
        let (_dir, url) = employees_db().await;
        let mut conn = RemoteConnection::connect_str(&url, TIMEOUT).await.unwrap();

        let schema = conn.introspect().await.unwrap();
        assert_eq!(schema.keys().collect::<Vec<_>>(), vec!["departments", "employees"]);

        let departments = &schema["departments"];
        let names: Vec<_> = departments.iter().map(|c| c.column_name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "location"]);

        assert!(departments[0].is_primary_key());
        assert_eq!(departments[0].data_type, "INTEGER");
        assert_eq!(departments[1].nullable, "NO");
        assert_eq!(departments[1].key, None);
        assert!(departments[2].is_nullable());
        assert_eq!(departments[2].default_value.as_deref(), Some("'HQ'"));

        conn.close().await;
    }

    #[tokio::test]
    async fn select_returns_rows_as_objects() {
        let (_dir, url) = employees_db().await;
        let mut conn = RemoteConnection::connect_str(&url, TIMEOUT).await.unwrap();

        let output = conn
            .execute("SELECT id, name, salary FROM employees ORDER BY id")
            .await
            .unwrap();

        assert_eq!(output.columns, vec!["id", "name", "salary"]);
        assert_eq!(output.data.len(), 2);
        assert_eq!(output.data[0]["id"], 1);
        assert_eq!(output.data[0]["name"], "John Doe");
        assert_eq!(output.data[0]["salary"], 75000.5);
        assert_eq!(output.data[1]["salary"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn writes_are_committed() {
        let (_dir, url) = employees_db().await;

        let mut conn = RemoteConnection::connect_str(&url, TIMEOUT).await.unwrap();
        let output = conn
            .execute("UPDATE employees SET salary = 80000 WHERE id = 1")
            .await
            .unwrap();
        assert_eq!(output.rows_affected, 1);
        assert!(output.data.is_empty());
        conn.close().await;

        let mut conn = RemoteConnection::connect_str(&url, TIMEOUT).await.unwrap();
        let output = conn
            .execute("SELECT salary FROM employees WHERE id = 1")
            .await
            .unwrap();
        assert_eq!(output.data[0]["salary"], 80000.0);
    }

    #[tokio::test]
    async fn empty_result_has_no_rows() {
        let (_dir, url) = employees_db().await;
        let mut conn = RemoteConnection::connect_str(&url, TIMEOUT).await.unwrap();

        let output = conn
            .execute("SELECT * FROM employees WHERE salary > 1000000")
            .await
            .unwrap();
        assert!(output.data.is_empty());
    }

    #[tokio::test]
    async fn bad_sql_is_a_query_error() {
        let (_dir, url) = employees_db().await;
        let mut conn = RemoteConnection::connect_str(&url, TIMEOUT).await.unwrap();

        let err = conn.execute("SELECT * FROM nope").await.unwrap_err();
        assert!(matches!(err, RemoteError::Query(_)));
        assert!(err.to_string().contains("no such table"));
    }

    #[tokio::test]
    async fn missing_file_is_a_connect_error() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("absent.db").display());

        let err = RemoteConnection::connect_str(&url, TIMEOUT).await.err().unwrap();
        assert!(matches!(err, RemoteError::Connect(_)));
        assert!(!dir.path().join("absent.db").exists());
    }

    #[tokio::test]
    async fn duplicate_column_names_get_suffixes() {
        let (_dir, url) = employees_db().await;
        let mut conn = RemoteConnection::connect_str(&url, TIMEOUT).await.unwrap();

        let output = conn
            .execute(
                "SELECT e.name, d.name, 3 AS name_1
                 FROM employees e JOIN departments d ON d.id = e.department_id
                 WHERE e.id = 1",
            )
            .await
            .unwrap();

        assert_eq!(output.columns, vec!["name", "name_1", "name_1_1"]);
        assert_eq!(output.data[0]["name"], "John Doe");
        assert_eq!(output.data[0]["name_1"], "IT");
        assert_eq!(output.data[0]["name_1_1"], 3);
    }

    #[tokio::test]
    async fn last_statement_with_rows_wins() {
        let (_dir, url) = employees_db().await;
        let mut conn = RemoteConnection::connect_str(&url, TIMEOUT).await.unwrap();

        let output = conn.execute("SELECT 1 AS x; SELECT 'q' AS y").await.unwrap();
        assert_eq!(output.columns, vec!["y"]);
        assert_eq!(output.data.len(), 1);
        assert_eq!(output.data[0]["y"], "q");

        let output = conn
            .execute("UPDATE employees SET salary = 1 WHERE id = 2; SELECT id, salary FROM employees WHERE id = 2")
            .await
            .unwrap();
        assert_eq!(output.columns, vec!["id", "salary"]);
        assert_eq!(output.data[0]["salary"], 1.0);
    }

    #[tokio::test]
    async fn views_are_introspected() {
        let (_dir, url) = employees_db().await;
        let mut conn = RemoteConnection::connect_str(&url, TIMEOUT).await.unwrap();
        conn.execute("CREATE VIEW payroll AS SELECT name, salary FROM employees")
            .await
            .unwrap();

        let schema = conn.introspect().await.unwrap();
        let names: Vec<_> = schema["payroll"].iter().map(|c| c.column_name.as_str()).collect();
        assert_eq!(names, vec!["name", "salary"]);
    }
}
