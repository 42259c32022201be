//! `text2sql serve` - run the HTTP API

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use text2sql_core::AppConfig;
use text2sql_server::db::{create_pool_with_options, migrations};
use text2sql_server::{run_server, OpenAiGenerator, ServerConfig, SqlGenerator};

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (default from config: 127.0.0.1:8000)
    #[arg(long, short = 'b', env = "TEXT2SQL_BIND")]
    pub bind: Option<String>,

    /// Metadata store URL (sqlite://...)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Allowed CORS origin (repeatable; none means any origin)
    #[arg(long = "cors-origin", value_name = "ORIGIN")]
    pub cors_origins: Vec<String>,
}

pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(url) = args.database_url {
        config.database.url = url;
    }
    if !args.cors_origins.is_empty() {
        config.server.cors_origins = args.cors_origins;
    }

    let server_config = ServerConfig::from_app_config(&config).context("Invalid server settings")?;

    let pool = create_pool_with_options(&config.database.url, config.database.max_connections)
        .await
        .with_context(|| format!("Failed to open metadata store {}", config.database.url))?;
    migrations::run(&pool)
        .await
        .context("Failed to migrate metadata store")?;
    tracing::info!(url = %config.database.url, "metadata store ready");

    let generator = OpenAiGenerator::from_config(&config.llm)
        .context("Failed to set up language model client")?
        .map(|g| {
            tracing::info!(model = %g.model(), "language model configured");
            Arc::new(g) as Arc<dyn SqlGenerator>
        });

    run_server(pool, generator, server_config)
        .await
        .context("Server error")?;

    Ok(())
}
