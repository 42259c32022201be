//! Route handlers organized by resource

pub mod auth;
pub mod databases;
pub mod health;
pub mod query;

use crate::db::repos::DatabaseRepo;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::remote::RemoteConnection;

/// Open a connection to the registered database `id`.
pub(crate) async fn connect_registered(
    state: &AppState,
    id: i64,
) -> Result<RemoteConnection, ApiError> {
    let uri = DatabaseRepo::new(&state.pool).uri(id).await?;
    Ok(RemoteConnection::connect_str(&uri, state.remote_timeout).await?)
}
