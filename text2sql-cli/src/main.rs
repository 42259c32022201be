//! text2sql - console for the Text2SQL server
//!
//! - `serve`: run the HTTP API with its SQLite metadata store
//! - `db`: register, list, remove and inspect user databases
//! - `generate` / `execute` / `ask`: turn questions into SQL and run it
//! - `auth`: accounts and login sessions

use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell as CompletionShell};

mod client;
mod commands;
mod tracing_setup;
mod ui;

use client::ApiClient;

#[derive(Parser, Debug)]
#[command(
    name = "text2sql",
    author,
    version,
    about = "Ask your SQL databases questions in plain language",
    long_about = "Register MySQL, PostgreSQL or SQLite databases with a text2sql server, \
                  inspect their schemas, turn questions into SQL with a language model \
                  and run the result."
)]
struct Cli {
    /// text2sql server URL (default: http://127.0.0.1:8000)
    #[arg(long, env = "TEXT2SQL_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Suppress progress spinners
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Manage registered databases (list, add, remove, schema)
    Db(commands::db::DbArgs),
    /// Generate SQL for a question without running it
    Generate(commands::query::GenerateArgs),
    /// Run SQL against a registered database
    Execute(commands::query::ExecuteArgs),
    /// Generate SQL for a question and run it
    Ask(commands::query::AskArgs),
    /// Accounts and sessions (register, login, whoami, logout)
    Auth(commands::auth::AuthArgs),
    /// Inspect configuration (show, path)
    Config(commands::config::ConfigArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

fn run_completions(args: CompletionsArgs) {
    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

#[tokio::main]
async fn main() -> Result<()> {
    text2sql_core::load_dotenv();
    let cli = Cli::parse();

    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug }).ok();
    ui::init_quiet_mode(cli.quiet);

    let endpoint = cli.endpoint.as_deref();
    match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await?,
        Commands::Db(args) => commands::run_db(&ApiClient::new(endpoint)?, args).await?,
        Commands::Generate(args) => {
            commands::run_generate(&ApiClient::new(endpoint)?, args).await?
        }
        Commands::Execute(args) => commands::run_execute(&ApiClient::new(endpoint)?, args).await?,
        Commands::Ask(args) => commands::run_ask(&ApiClient::new(endpoint)?, args).await?,
        Commands::Auth(args) => commands::run_auth(&ApiClient::new(endpoint)?, args).await?,
        Commands::Config(args) => commands::run_config(args)?,
        Commands::Completions(args) => run_completions(args),
    }

    Ok(())
}
