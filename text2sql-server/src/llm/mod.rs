//! Text2SQL: natural-language questions to SQL via a hosted language model

mod openai;

pub use openai::OpenAiGenerator;

use async_trait::async_trait;
use text2sql_core::Dialect;

use crate::remote::Schema;

/// Everything the model needs to write a query
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub dialect: Dialect,
    pub schema: Schema,
    pub question: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("no language model is configured (set OPENAI_API_KEY)")]
    NotConfigured,

    #[error("language model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("language model API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("language model returned no SQL")]
    EmptyResponse,
}

/// Turns a question about a database into SQL.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError>;
}

/// Compact, one line per table: `employees(id INT PK NOT NULL, name VARCHAR(64))`
pub fn render_schema(schema: &Schema) -> String {
    schema
        .iter()
        .map(|(table, columns)| {
            let columns: Vec<String> = columns
                .iter()
                .map(|c| {
                    let mut col = format!("{} {}", c.column_name, c.data_type);
                    if c.is_primary_key() {
                        col.push_str(" PK");
                    }
                    if !c.is_nullable() {
                        col.push_str(" NOT NULL");
                    }
                    col
                })
                .collect();
            format!("{}({})", table, columns.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Language tags models put after an opening fence
const FENCE_TAGS: &[&str] = &[
    "sql", "mysql", "mariadb", "postgres", "postgresql", "pgsql", "psql", "sqlite", "sqlite3",
    "plsql", "tsql",
];

/// Extract the SQL from a reply wrapped in a Markdown code fence.
///
/// Anything after the first closing fence is commentary and is dropped.
/// Replies without a fence are only trimmed.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed.to_owned();
    };

    let inner = match inner.find("```") {
        Some(end) => &inner[..end],
        None => inner,
    };
    strip_fence_tag(inner).trim().to_owned()
}

/// `sql\nSELECT ...` and `sql SELECT ...` both lose the tag.
fn strip_fence_tag(body: &str) -> &str {
    let end = body.find(char::is_whitespace).unwrap_or(body.len());
    let (word, rest) = body.split_at(end);
    if FENCE_TAGS.iter().any(|tag| tag.eq_ignore_ascii_case(word)) {
        rest
    } else {
        body
    }
}
