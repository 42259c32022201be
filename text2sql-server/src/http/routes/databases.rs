//! Registered database endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use text2sql_core::DbUri;

use super::connect_registered;
use crate::db::repos::{DatabaseRepo, UserDatabase};
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, DbId};
use crate::http::server::AppState;
use crate::models::DatabaseName;
use crate::remote::Schema;

#[derive(Deserialize)]
pub struct CreateDatabaseRequest {
    pub db_name: String,
    pub db_uri: String,
}

#[derive(Serialize)]
pub struct DatabaseResponse {
    pub id: i64,
    pub db_name: String,
    pub db_uri: String,
    pub created_at: String,
}

impl From<UserDatabase> for DatabaseResponse {
    fn from(d: UserDatabase) -> Self {
        Self {
            id: d.id,
            db_name: d.db_name,
            db_uri: d.db_uri,
            created_at: d.created_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub message: &'static str,
    pub id: i64,
}

#[derive(Serialize)]
pub struct SchemaResponse {
    pub schema: Schema,
}

/// GET /databases
async fn list_databases(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DatabaseResponse>>, ApiError> {
    let databases = DatabaseRepo::new(&state.pool).list().await?;
    Ok(Json(databases.into_iter().map(DatabaseResponse::from).collect()))
}

/// POST /databases - register a user database
async fn create_database(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreateDatabaseRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let name = DatabaseName::new(&req.db_name)?;
    let uri = DbUri::parse(&req.db_uri).map_err(|e| ApiError::BadRequest {
        message: e.to_string(),
    })?;

    let database = DatabaseRepo::new(&state.pool).create(&name, &uri).await?;
    tracing::info!(id = database.id, name = %database.db_name, uri = %uri, "database registered");

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Database created successfully",
            id: database.id,
        }),
    ))
}

/// GET /databases/{id}
async fn get_database(
    State(state): State<Arc<AppState>>,
    DbId(id): DbId,
) -> Result<Json<DatabaseResponse>, ApiError> {
    let database = DatabaseRepo::new(&state.pool).get(id).await?;
    Ok(Json(DatabaseResponse::from(database)))
}

/// DELETE /databases/{id}
async fn delete_database(
    State(state): State<Arc<AppState>>,
    DbId(id): DbId,
) -> Result<StatusCode, ApiError> {
    DatabaseRepo::new(&state.pool).delete(id).await?;
    tracing::info!(id, "database removed");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /databases/{id}/schema - live introspection of the user database
async fn get_schema(
    State(state): State<Arc<AppState>>,
    DbId(id): DbId,
) -> Result<Json<SchemaResponse>, ApiError> {
    let mut conn = connect_registered(&state, id).await?;
    let schema = conn.introspect().await;
    conn.close().await;

    Ok(Json(SchemaResponse { schema: schema? }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/databases", get(list_databases).post(create_database))
        .route("/databases/{id}", get(get_database).delete(delete_database))
        .route("/databases/{id}/schema", get(get_schema))
}
