//! Account registration and session login

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::repos::{User, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, BearerToken, CurrentUser};
use crate::http::server::AppState;
use crate::models::{Password, Username, ValidationError};

const INVALID_CREDENTIALS: &str = "invalid username or password";

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
        }
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub username: String,
    pub token: String,
}

/// POST /auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let username = Username::new(&req.username)?;
    let password = Password::new(&req.password, req.confirm_password.as_deref())?;

    let user = UserRepo::new(&state.pool)
        .create(&username, &password.hash())
        .await?;
    tracing::info!(user_id = user.id, username = %user.username, "user registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// POST /auth/login - verify credentials and open a session
async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ValidationError::Empty { field: "username" }.into());
    }
    if req.password.is_empty() {
        return Err(ValidationError::Empty { field: "password" }.into());
    }

    let repo = UserRepo::new(&state.pool);
    let user = match repo.find_by_username(username).await? {
        Some(user) if user.password_hash().verify(&req.password) => user,
        _ => {
            tracing::info!(username, "failed login");
            return Err(ApiError::Unauthorized {
                message: INVALID_CREDENTIALS,
            });
        }
    };

    let token = repo.create_session(user.id, state.session_ttl).await?;
    tracing::info!(user_id = user.id, "user logged in");

    Ok(Json(LoginResponse {
        username: user.username,
        token,
    }))
}

/// GET /auth/me
async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// POST /auth/logout - end the bearer token's session
async fn logout(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Result<StatusCode, ApiError> {
    if UserRepo::new(&state.pool).delete_session(&token).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::Unauthorized {
            message: "invalid or expired session",
        })
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
}
