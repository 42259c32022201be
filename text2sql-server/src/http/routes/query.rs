//! Text2SQL and SQL execution against a registered database

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::connect_registered;
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, DbId};
use crate::http::server::AppState;
use crate::llm::{GenerateRequest, LlmError};
use crate::models::ValidationError;

#[derive(Deserialize)]
pub struct GenerateSqlRequest {
    pub text_query: String,
}

#[derive(Serialize)]
pub struct GenerateSqlResponse {
    pub sql_query: String,
}

#[derive(Deserialize)]
pub struct ExecuteSqlRequest {
    pub sql_query: String,
}

#[derive(Serialize)]
pub struct ExecuteSqlResponse {
    pub data: Vec<Map<String, Value>>,
    pub columns: Vec<String>,
    pub rows_affected: u64,
}

/// POST /query/{id}/generate_sql
async fn generate_sql(
    State(state): State<Arc<AppState>>,
    DbId(id): DbId,
    ApiJson(req): ApiJson<GenerateSqlRequest>,
) -> Result<Json<GenerateSqlResponse>, ApiError> {
    let question = req.text_query.trim();
    if question.is_empty() {
        return Err(ValidationError::Empty {
            field: "text_query",
        }
        .into());
    }
    let generator = state.generator.clone().ok_or(LlmError::NotConfigured)?;

    let mut conn = connect_registered(&state, id).await?;
    let dialect = conn.dialect();
    let schema = conn.introspect().await;
    conn.close().await;

    let request = GenerateRequest {
        dialect,
        schema: schema?,
        question: question.to_owned(),
    };
    let sql_query = generator.generate(&request).await?;
    tracing::info!(id, %dialect, "generated SQL");

    Ok(Json(GenerateSqlResponse { sql_query }))
}

/// POST /query/{id}/execute_sql
async fn execute_sql(
    State(state): State<Arc<AppState>>,
    DbId(id): DbId,
    ApiJson(req): ApiJson<ExecuteSqlRequest>,
) -> Result<Json<ExecuteSqlResponse>, ApiError> {
    let sql = req.sql_query.trim();
    if sql.is_empty() {
        return Err(ValidationError::Empty { field: "sql_query" }.into());
    }

    let mut conn = connect_registered(&state, id).await?;
    let result = conn.execute(sql).await;
    conn.close().await;

    let output = result?;
    tracing::info!(id, rows = output.data.len(), rows_affected = output.rows_affected, "executed SQL");

    Ok(Json(ExecuteSqlResponse {
        data: output.data,
        columns: output.columns,
        rows_affected: output.rows_affected,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/query/{id}/generate_sql", post(generate_sql))
        .route("/query/{id}/execute_sql", post(execute_sql))
}
