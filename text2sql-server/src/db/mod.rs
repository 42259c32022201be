//! Metadata store - connection pool, migrations and repositories
//!
//! Holds the application's own tables (users, sessions, user_databases).
//! User databases themselves are reached through [`crate::remote`].

pub mod migrations;
pub mod pool;
pub mod repos;

pub use pool::{create_memory_pool, create_pool, create_pool_with_options};
pub use repos::*;
