//! PostgreSQL

use futures::TryStreamExt;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Connection, Either, Row};

use super::value::{self, try_decode, ResultCollector};
use super::{non_empty, ColumnInfo, ColumnRow, QueryOutput};

/// information_schema uses domain types; everything is cast to text.
const COLUMNS_SQL: &str = r#"
    SELECT
        c.table_name::text,
        c.column_name::text,
        c.data_type::text,
        c.is_nullable::text,
        c.column_default::text,
        CASE WHEN pk.column_name IS NOT NULL THEN 'PRI' END AS column_key
    FROM information_schema.columns c
    JOIN information_schema.tables t
        ON t.table_schema = c.table_schema AND t.table_name = c.table_name
    LEFT JOIN (
        SELECT kcu.table_name, kcu.column_name
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON kcu.constraint_name = tc.constraint_name
            AND kcu.table_schema = tc.table_schema
        WHERE tc.constraint_type = 'PRIMARY KEY'
            AND tc.table_schema = current_schema()
    ) pk ON pk.table_name = c.table_name AND pk.column_name = c.column_name
    WHERE c.table_schema = current_schema()
        AND t.table_type IN ('BASE TABLE', 'VIEW')
    ORDER BY c.table_name, c.ordinal_position
"#;

type CatalogRow = (String, String, String, String, Option<String>, Option<String>);

pub(super) async fn introspect(conn: &mut PgConnection) -> Result<Vec<ColumnRow>, sqlx::Error> {
    let rows: Vec<CatalogRow> = sqlx::query_as(COLUMNS_SQL).fetch_all(&mut *conn).await?;

    Ok(rows
        .into_iter()
        .map(|(table, name, data_type, nullable, default_value, key)| {
            (
                table,
                ColumnInfo {
                    column_name: name,
                    data_type,
                    nullable,
                    default_value,
                    key: non_empty(key),
                },
            )
        })
        .collect())
}

pub(super) async fn execute(conn: &mut PgConnection, sql: &str) -> Result<QueryOutput, sqlx::Error> {
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

fn decode(row: &PgRow, idx: usize) -> Value {
    try_decode!(row, idx,
        bool => Value::Bool,
        i16 => |v: i16| value::int(i64::from(v)),
        i32 => |v: i32| value::int(i64::from(v)),
        i64 => value::int,
        f32 => |f: f32| value::float(f64::from(f)),
        f64 => value::float,
        Decimal => value::decimal,
        String => Value::String,
        uuid::Uuid => |u: uuid::Uuid| Value::String(u.to_string()),
        chrono::DateTime<chrono::Utc> => |dt: chrono::DateTime<chrono::Utc>| Value::String(dt.to_rfc3339()),
        chrono::NaiveDateTime => |dt: chrono::NaiveDateTime| Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        chrono::NaiveDate => |d: chrono::NaiveDate| Value::String(d.format("%Y-%m-%d").to_string()),
        chrono::NaiveTime => |t: chrono::NaiveTime| Value::String(t.format("%H:%M:%S").to_string()),
        Value => std::convert::identity,
        Vec<u8> => value::bytes,
    );

    // Simple-query results are text; enums, arrays, intervals land here.
    row.try_get_unchecked::<Option<String>, _>(idx)
        .ok()
        .flatten()
        .map(Value::String)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::super::RemoteConnection;
    use std::time::Duration;

    // Run with: POSTGRES_TEST_URL=postgres://... cargo test -p text2sql-server -- --ignored

    #[tokio::test]
    #[ignore = "requires database"]
    async fn introspects_and_queries_postgres() {
        let url = std::env::var("POSTGRES_TEST_URL").expect("POSTGRES_TEST_URL required");
        let mut conn = RemoteConnection::connect_str(&url, Duration::from_secs(5))
            .await
            .expect("connect failed");

        conn.execute(
            "CREATE TABLE IF NOT EXISTS t2s_departments (id INTEGER PRIMARY KEY, name TEXT NOT NULL, location TEXT)",
        )
        .await
        .unwrap();
        conn.execute("INSERT INTO t2s_departments VALUES (1, 'IT', 'New York') ON CONFLICT DO NOTHING")
            .await
            .unwrap();

        let schema = conn.introspect().await.unwrap();
        let columns = &schema["t2s_departments"];
        assert!(columns[0].is_primary_key());
        assert_eq!(columns[1].nullable, "NO");

        let output = conn
            .execute("SELECT id, name FROM t2s_departments ORDER BY id")
            .await
            .unwrap();
        assert_eq!(output.columns, vec!["id", "name"]);
        assert_eq!(output.data[0]["id"], 1);

        conn.execute("DROP TABLE t2s_departments").await.unwrap();
        conn.close().await;
    }
}
