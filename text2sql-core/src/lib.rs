//! text2sql-core: configuration and connection-URI handling shared by the
//! text2sql server and console.

pub mod config;
pub mod error;
pub mod uri;

pub use config::{load_dotenv, AppConfig};
pub use error::{ConfigError, UriError};
pub use uri::{check_valid_uri, extract_scheme, DbUri, Dialect};
