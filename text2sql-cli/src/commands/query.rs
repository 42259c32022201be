//! `text2sql generate | execute | ask` - the query console

use std::io::{IsTerminal, Read};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::client::{handle_response, ApiClient, OutputFormat};
use crate::ui;

#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Database id (see `text2sql db list`)
    pub db_id: i64,

    /// Question in plain language
    pub question: String,
}

#[derive(Parser, Debug)]
pub struct ExecuteArgs {
    /// Database id (see `text2sql db list`)
    pub db_id: i64,

    /// SQL to run (read from stdin when omitted)
    pub sql: Option<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "human")]
    pub output: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct AskArgs {
    /// Database id (see `text2sql db list`)
    pub db_id: i64,

    /// Question in plain language
    pub question: String,

    /// Only generate the SQL, don't run it
    #[arg(long)]
    pub dry_run: bool,

    /// Output format
    #[arg(long, short, value_enum, default_value = "human")]
    pub output: OutputFormat,
}

#[derive(Deserialize)]
struct GenerateResponse {
    sql_query: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ExecuteResponse {
    data: Vec<Map<String, Value>>,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    rows_affected: u64,
}

async fn generate_sql(client: &ApiClient, db_id: i64, question: &str) -> Result<String> {
    let pb = ui::spinner("Generating SQL...");
    let response = client
        .send(client.post(
            &format!("/query/{}/generate_sql", db_id),
            &json!({ "text_query": question }),
        ))
        .await;
    ui::finish(pb);

    let generated: GenerateResponse = handle_response(response?).await?;
    Ok(generated.sql_query)
}

async fn execute_sql(client: &ApiClient, db_id: i64, sql: &str) -> Result<ExecuteResponse> {
    let pb = ui::spinner("Running query...");
    let response = client
        .send(client.post(
            &format!("/query/{}/execute_sql", db_id),
            &json!({ "sql_query": sql }),
        ))
        .await;
    ui::finish(pb);

    handle_response(response?).await
}

fn format_result(result: &ExecuteResponse) -> String {
    if result.data.is_empty() {
        if result.rows_affected > 0 {
            return format!("{} row(s) affected.", result.rows_affected);
        }
        return "No data returned.".to_owned();
    }

    // Older servers send no column list; fall back to the first row's keys
    let columns: Vec<String> = if result.columns.is_empty() {
        result.data[0].keys().cloned().collect()
    } else {
        result.columns.clone()
    };
    let rows = result.data.len();
    format!(
        "{}\n({} row{})",
        ui::render_table(&columns, &result.data),
        rows,
        if rows == 1 { "" } else { "s" }
    )
}

fn read_sql(sql: Option<String>) -> Result<String> {
    let sql = match sql {
        Some(sql) => sql,
        None => {
            if std::io::stdin().is_terminal() {
                bail!("No SQL given. Pass it as an argument or pipe it on stdin");
            }
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read SQL from stdin")?;
            buf
        }
    };

    let sql = sql.trim().to_owned();
    if sql.is_empty() {
        bail!("SQL is empty");
    }
    Ok(sql)
}

pub async fn run_generate(client: &ApiClient, args: GenerateArgs) -> Result<()> {
    let sql = generate_sql(client, args.db_id, &args.question).await?;
    println!("{}", sql);
    Ok(())
}

pub async fn run_execute(client: &ApiClient, args: ExecuteArgs) -> Result<()> {
    let sql = read_sql(args.sql)?;
    let result = execute_sql(client, args.db_id, &sql).await?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Human => println!("{}", format_result(&result)),
    }
    Ok(())
}

/// Generate SQL for the question, then run it.
pub async fn run_ask(client: &ApiClient, args: AskArgs) -> Result<()> {
    let sql = generate_sql(client, args.db_id, &args.question).await?;

    if args.dry_run {
        match args.output {
            OutputFormat::Json => println!("{}", json!({ "sql_query": sql })),
            OutputFormat::Human => println!("{}", sql),
        }
        return Ok(());
    }

    let result = execute_sql(client, args.db_id, &sql).await?;
    match args.output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "sql_query": sql, "result": result }))?
        ),
        OutputFormat::Human => {
            println!("Generated SQL:\n  {}\n", sql.replace('\n', "\n  "));
            println!("{}", format_result(&result));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(value: Value) -> ExecuteResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_result_message() {
        let result = response(json!({"data": [], "columns": [], "rows_affected": 0}));
        assert_eq!(format_result(&result), "No data returned.");
    }

    #[test]
    fn write_result_message() {
        let result = response(json!({"data": [], "columns": [], "rows_affected": 3}));
        assert_eq!(format_result(&result), "3 row(s) affected.");
    }

    #[test]
    fn rows_render_as_table() {
        let result = response(json!({
            "data": [{"name": "John Doe"}],
            "columns": ["name"],
            "rows_affected": 0
        }));
        let text = format_result(&result);
        assert!(text.contains("John Doe"));
        assert!(text.ends_with("(1 row)"));
    }

    #[test]
    fn columns_fall_back_to_row_keys() {
        let result = response(json!({"data": [{"a": 1, "b": 2}, {"a": 3, "b": 4}]}));
        let text = format_result(&result);
        assert!(text.starts_with("a | b"));
        assert!(text.ends_with("(2 rows)"));
    }

    #[test]
    fn explicit_sql_is_trimmed() {
        assert_eq!(read_sql(Some("  SELECT 1;\n".into())).unwrap(), "SELECT 1;");
        assert!(read_sql(Some("   ".into())).is_err());
    }
}
