//! Command implementations for the text2sql console

pub mod auth;
pub mod config;
pub mod db;
pub mod query;
pub mod serve;

pub use auth::run_auth;
pub use config::run_config;
pub use db::run_db;
pub use query::{run_ask, run_execute, run_generate};
pub use serve::run_serve;
