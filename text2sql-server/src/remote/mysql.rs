//! MySQL / MariaDB

use futures::TryStreamExt;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{Connection, Either, Row};

use super::value::{self, try_decode, ResultCollector};
use super::{non_empty, ColumnInfo, ColumnRow, QueryOutput};

/// Catalog strings are cast to CHAR so binary collations decode as text.
const COLUMNS_SQL: &str = r#"
    SELECT
        CAST(c.TABLE_NAME AS CHAR) AS table_name,
        CAST(c.COLUMN_NAME AS CHAR) AS column_name,
        CAST(c.COLUMN_TYPE AS CHAR) AS column_type,
        CAST(c.IS_NULLABLE AS CHAR) AS is_nullable,
        CAST(c.COLUMN_DEFAULT AS CHAR) AS column_default,
        CAST(c.COLUMN_KEY AS CHAR) AS column_key
    FROM INFORMATION_SCHEMA.COLUMNS c
    JOIN INFORMATION_SCHEMA.TABLES t
        ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME
    WHERE c.TABLE_SCHEMA = DATABASE()
    ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION
"#;

type CatalogRow = (String, String, String, String, Option<String>, Option<String>);

/// Columns of every table in the current database, one query.
pub(super) async fn introspect(conn: &mut MySqlConnection) -> Result<Vec<ColumnRow>, sqlx::Error> {
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

pub(super) async fn execute(conn: &mut MySqlConnection, sql: &str) -> Result<QueryOutput, sqlx::Error> {
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

fn decode(row: &MySqlRow, idx: usize) -> Value {
    try_decode!(row, idx,
        u64 => value::uint,
        i64 => value::int,
        bool => Value::Bool,
        f64 => value::float,
        f32 => |f: f32| value::float(f64::from(f)),
        Decimal => value::decimal,
        String => Value::String,
        chrono::NaiveDateTime => |dt: chrono::NaiveDateTime| Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        chrono::DateTime<chrono::Utc> => |dt: chrono::DateTime<chrono::Utc>| Value::String(dt.to_rfc3339()),
        chrono::NaiveDate => |d: chrono::NaiveDate| Value::String(d.format("%Y-%m-%d").to_string()),
        chrono::NaiveTime => |t: chrono::NaiveTime| Value::String(t.format("%H:%M:%S").to_string()),
        Value => std::convert::identity,
        Vec<u8> => value::bytes,
    );

    // Text-protocol fallback for anything else (SET, GEOMETRY, ...)
    row.try_get_unchecked::<Option<String>, _>(idx)
        .ok()
        .flatten()
        .map(Value::String)
        .unwrap_or(Value::Null)
}
