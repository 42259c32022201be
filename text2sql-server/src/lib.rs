//! text2sql-server: HTTP API for Text2SQL
//!
//! Keeps a registry of user databases in a SQLite metadata store, inspects
//! their schemas live, asks a language model to turn questions into SQL and
//! runs SQL against them.

pub mod db;
pub mod http;
pub mod llm;
pub mod models;
pub mod remote;

pub use http::{build_router, run_server, ApiError, AppState, ServerConfig, ServerError};
pub use llm::{GenerateRequest, LlmError, OpenAiGenerator, SqlGenerator};
pub use remote::{ColumnInfo, QueryOutput, RemoteConnection, RemoteError, Schema};
