use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use text2sql_core::config::LlmSection;

use super::{render_schema, strip_code_fences, GenerateRequest, LlmError, SqlGenerator};

const SYSTEM_PROMPT: &str = "You are an SQL expert. Your task is to convert the given text query \
     into an SQL query. NOTE - Only write the SQL query.";

/// Chat-completions client for any OpenAI-compatible endpoint
pub struct OpenAiGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiGenerator {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::NotConfigured);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            model: model.into(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &LlmSection) -> Result<Option<Self>, LlmError> {
        match config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => Self::new(
                key,
                config.model.as_str(),
                &config.base_url,
                Duration::from_secs(config.timeout_secs),
            )
            .map(Some),
            None => Ok(None),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn user_prompt(request: &GenerateRequest) -> String {
    format!(
        "DATABASE SCHEME: {}\nSCHEMA: {}\n{}\nSQL QUERY:",
        request.dialect,
        render_schema(&request.schema),
        request.question.trim()
    )
}

#[async_trait]
impl SqlGenerator for OpenAiGenerator {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let prompt = user_prompt(request);
        tracing::debug!(model = %self.model, dialect = %request.dialect, "requesting SQL from language model");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages: [
                    ChatMessage {
                        role: "developer",
                        content: SYSTEM_PROMPT,
                    },
                    ChatMessage {
                        role: "user",
                        content: &prompt,
                    },
                ],
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            tracing::warn!(status = status.as_u16(), %message, "language model API error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)?;

        let sql = strip_code_fences(&content);
        if sql.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{ColumnInfo, Schema};
    use text2sql_core::Dialect;

    #[test]
    fn prompt_layout() {
        let mut schema = Schema::new();
        schema.insert(
            "employees".into(),
            vec![ColumnInfo {
                column_name: "id".into(),
                data_type: "int".into(),
                nullable: "NO".into(),
                default_value: None,
                key: Some("PRI".into()),
            }],
        );
        let request = GenerateRequest {
            dialect: Dialect::Mysql,
            schema,
            question: " How many employees are there? ".into(),
        };

        assert_eq!(
            user_prompt(&request),
            "DATABASE SCHEME: mysql\nSCHEMA: employees(id int PK NOT NULL)\n\
             How many employees are there?\nSQL QUERY:"
        );
    }

    #[test]
    fn missing_key_means_no_generator() {
        let config = LlmSection::default();
        assert!(OpenAiGenerator::from_config(&config).unwrap().is_none());

        let config = LlmSection {
            api_key: Some("   ".into()),
            ..LlmSection::default()
        };
        assert!(OpenAiGenerator::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn endpoint_from_base_url() {
        let config = LlmSection {
            api_key: Some("sk-test".into()),
            base_url: "http://localhost:11434/v1/".into(),
            ..LlmSection::default()
        };
        let generator = OpenAiGenerator::from_config(&config).unwrap().unwrap();
        assert_eq!(generator.endpoint, "http://localhost:11434/v1/chat/completions");
        assert_eq!(generator.model(), "gpt-4o-mini");
    }

    #[test]
    fn parses_completion_body() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"SELECT 1;"}}]}"#,
        )
        .unwrap();
        assert_eq!(body.choices[0].message.content.as_deref(), Some("SELECT 1;"));
    }

    mod against_http {
        use std::sync::{Arc, Mutex};

        use axum::http::header::AUTHORIZATION;
        use axum::http::{HeaderMap, StatusCode};
        use axum::routing::post;
        use axum::{Json, Router};
        use serde_json::{json, Value};

        use super::*;

        type Seen = Arc<Mutex<Option<(String, Value)>>>;

        /// Chat-completions stand-in answering every call with `reply`.
        async fn fake_api(status: StatusCode, reply: Value) -> (String, Seen) {
            let seen: Seen = Arc::new(Mutex::new(None));
            let captured = seen.clone();
            let app = Router::new().route(
                "/v1/chat/completions",
                post(move |headers: HeaderMap, Json(request): Json<Value>| {
                    let captured = captured.clone();
                    let reply = reply.clone();
                    async move {
                        let auth = headers
                            .get(AUTHORIZATION)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_owned();
                        *captured.lock().unwrap() = Some((auth, request));
                        (status, Json(reply))
                    }
                }),
            );

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            (format!("http://{addr}/v1"), seen)
        }

        fn generator(base_url: &str) -> OpenAiGenerator {
            OpenAiGenerator::new("sk-test", "gpt-4o-mini", base_url, Duration::from_secs(5)).unwrap()
        }

        fn request() -> GenerateRequest {
            GenerateRequest {
                dialect: Dialect::Sqlite,
                schema: Schema::new(),
                question: "How many employees are there?".into(),
            }
        }

        #[tokio::test]
        async fn returns_unfenced_sql() {
            let (base_url, seen) = fake_api(
                StatusCode::OK,
                json!({"choices": [{"message": {"role": "assistant",
                    "content": "```sql\nSELECT COUNT(*) FROM employees;\n```"}}]}),
            )
            .await;

            let sql = generator(&base_url).generate(&request()).await.unwrap();
            assert_eq!(sql, "SELECT COUNT(*) FROM employees;");

            let (auth, body) = seen.lock().unwrap().clone().unwrap();
            assert_eq!(auth, "Bearer sk-test");
            assert_eq!(body["model"], "gpt-4o-mini");
            assert_eq!(body["messages"][0]["role"], "developer");
            assert_eq!(body["messages"][1]["role"], "user");
            assert!(body["messages"][1]["content"]
                .as_str()
                .unwrap()
                .ends_with("How many employees are there?\nSQL QUERY:"));
        }

        #[tokio::test]
        async fn api_error_message_is_surfaced() {
            let (base_url, _) = fake_api(
                StatusCode::UNAUTHORIZED,
                json!({"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}),
            )
            .await;

            let err = generator(&base_url).generate(&request()).await.unwrap_err();
            match err {
                LlmError::Api { status, message } => {
                    assert_eq!(status, 401);
                    assert_eq!(message, "Incorrect API key provided");
                }
                other => panic!("expected Api error, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn no_choices_is_empty_response() {
            let (base_url, _) = fake_api(StatusCode::OK, json!({"choices": []})).await;
            let err = generator(&base_url).generate(&request()).await.unwrap_err();
            assert!(matches!(err, LlmError::EmptyResponse));
        }

        #[tokio::test]
        async fn empty_fence_is_empty_response() {
            let (base_url, _) = fake_api(
                StatusCode::OK,
                json!({"choices": [{"message": {"content": "```sql\n```"}}]}),
            )
            .await;
            let err = generator(&base_url).generate(&request()).await.unwrap_err();
            assert!(matches!(err, LlmError::EmptyResponse));
        }
    }
}
