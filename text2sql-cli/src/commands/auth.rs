//! `text2sql auth` - accounts and login sessions

use std::io::{BufRead, IsTerminal, Write};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;

use crate::client::{
    clear_session, expect_success, handle_response, load_session, save_session, ApiClient,
};

#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Create an account
    Register(CredentialArgs),
    /// Log in and store the session token
    Login(CredentialArgs),
    /// Show the logged-in user
    Whoami,
    /// End the current session
    Logout,
}

#[derive(Parser, Debug)]
pub struct CredentialArgs {
    /// Account name
    pub username: String,

    /// Password (prompted when omitted)
    #[arg(long, env = "TEXT2SQL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Deserialize)]
struct UserResponse {
    id: i64,
    username: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    username: String,
    token: String,
}

pub async fn run_auth(client: &ApiClient, args: AuthArgs) -> Result<()> {
    match args.command {
        AuthCommands::Register(args) => run_register(client, args).await,
        AuthCommands::Login(args) => run_login(client, args).await,
        AuthCommands::Whoami => run_whoami(client).await,
        AuthCommands::Logout => run_logout(client).await,
    }
}

fn prompt(label: &str) -> Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprint!("{}: ", label);
        std::io::stderr().flush().ok();
    }
    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .with_context(|| format!("Failed to read {}", label.to_lowercase()))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

async fn run_register(client: &ApiClient, args: CredentialArgs) -> Result<()> {
    let (password, confirm) = match args.password {
        Some(password) => (password.clone(), password),
        None => (prompt("Password")?, prompt("Confirm password")?),
    };
    if password != confirm {
        bail!("Passwords do not match");
    }

    let body = json!({
        "username": args.username,
        "password": password,
        "confirm_password": confirm,
    });
    let response = client.send(client.post("/auth/register", &body)).await?;
    let user: UserResponse = handle_response(response).await?;

    println!(
        "Registered {} (id {}). Log in with `text2sql auth login {}`.",
        user.username, user.id, user.username
    );
    Ok(())
}

async fn run_login(client: &ApiClient, args: CredentialArgs) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => prompt("Password")?,
    };

    let body = json!({ "username": args.username, "password": password });
    let response = client.send(client.post("/auth/login", &body)).await?;
    let login: LoginResponse = handle_response(response).await?;

    save_session(&login.token)?;
    println!("Logged in as {}", login.username);
    Ok(())
}

async fn run_whoami(client: &ApiClient) -> Result<()> {
    let token = load_session()?;
    let response = client
        .send(client.get("/auth/me").bearer_auth(&token))
        .await?;
    let user: UserResponse = handle_response(response).await?;

    println!("{} (id {})", user.username, user.id);
    Ok(())
}

async fn run_logout(client: &ApiClient) -> Result<()> {
    let token = load_session()?;
    let response = client
        .send(client.post("/auth/logout", &json!({})).bearer_auth(&token))
        .await?;

    // The local token is useless either way
    let result = expect_success(response).await;
    clear_session()?;
    result?;

    println!("Logged out");
    Ok(())
}
