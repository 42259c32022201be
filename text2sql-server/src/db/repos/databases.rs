//! Registered user databases

use chrono::NaiveDateTime;
use sqlx::{FromRow, SqlitePool};
use text2sql_core::DbUri;

use super::{is_unique_violation, DbError};
use crate::models::DatabaseName;

/// Row of `user_databases`
#[derive(Debug, Clone, FromRow)]
pub struct UserDatabase {
    pub id: i64,
    pub db_name: String,
    pub db_uri: String,
    pub created_at: NaiveDateTime,
}

/// Registered database repository
pub struct DatabaseRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DatabaseRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// All registered databases in registration order.
    pub async fn list(&self) -> Result<Vec<UserDatabase>, DbError> {
        let rows = sqlx::query_as::<_, UserDatabase>(
            "SELECT id, db_name, db_uri, created_at FROM user_databases ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get(&self, id: i64) -> Result<UserDatabase, DbError> {
        sqlx::query_as::<_, UserDatabase>(
            "SELECT id, db_name, db_uri, created_at FROM user_databases WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound {
            resource: "database",
            id: id.to_string(),
        })
    }

    /// Connection URI of a registered database.
    pub async fn uri(&self, id: i64) -> Result<String, DbError> {
        sqlx::query_scalar::<_, String>("SELECT db_uri FROM user_databases WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound {
                resource: "database",
                id: id.to_string(),
            })
    }

    /// Register a database. Name and URI are both unique.
    pub async fn create(&self, name: &DatabaseName, uri: &DbUri) -> Result<UserDatabase, DbError> {
        let result = sqlx::query_as::<_, UserDatabase>(
            r#"
            INSERT INTO user_databases (db_name, db_uri) VALUES (?, ?)
            RETURNING id, db_name, db_uri, created_at
            "#,
        )
        .bind(name.as_str())
        .bind(uri.as_str())
        .fetch_one(self.pool)
        .await;

        match result {
            Ok(row) => Ok(row),
            Err(e) if is_unique_violation(&e) => {
                if e.to_string().contains("db_uri") {
                    Err(DbError::Conflict {
                        resource: "database URI",
                        value: uri.redacted(),
                    })
                } else {
                    Err(DbError::Conflict {
                        resource: "database name",
                        value: name.as_str().to_owned(),
                    })
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM user_databases WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                resource: "database",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
