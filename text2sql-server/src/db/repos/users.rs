//! Users and login sessions

use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::{is_unique_violation, DbError};
use crate::models::{PasswordHash, Username};

/// Row of `users`
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn password_hash(&self) -> PasswordHash {
        PasswordHash::from_stored(self.password_hash.clone())
    }
}

/// User repository
pub struct UserRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user. Usernames are unique, compared case-insensitively.
    pub async fn create(&self, username: &Username, hash: &PasswordHash) -> Result<User, DbError> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash) VALUES (?, ?)
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(username.as_str())
        .bind(hash.as_str())
        .fetch_one(self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(DbError::Conflict {
                resource: "username",
                value: username.as_str().to_owned(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Start a session valid for `ttl` and return its bearer token.
    ///
    /// Sessions that have already expired are purged on the way.
    pub async fn create_session(&self, user_id: i64, ttl: Duration) -> Result<String, DbError> {
        let token = Uuid::new_v4().simple().to_string();
        let now = Utc::now().naive_utc();

        let purged = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(self.pool)
            .await?
            .rows_affected();
        if purged > 0 {
            tracing::debug!(purged, "removed expired sessions");
        }

        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(user_id)
            .bind(now + ttl)
            .execute(self.pool)
            .await?;

        Ok(token)
    }

    pub async fn user_for_session(&self, token: &str) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.password_hash, u.created_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = ? AND s.expires_at > ?
            "#,
        )
        .bind(token)
        .bind(Utc::now().naive_utc())
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// End a session. Returns false when the token was unknown.
    pub async fn delete_session(&self, token: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
