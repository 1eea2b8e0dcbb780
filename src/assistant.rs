//! Natural-language to SQL translation through an OpenAI-compatible
//! chat-completions endpoint.

use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::{
    config::AssistantConfig,
    error::{ChatError, Result},
};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that generates SQL queries.";

/// Turns a request about one table into a single SQL statement.
pub trait SqlGenerator {
    fn generate_sql(&self, table: &str, columns: &[String], request: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct OpenAiGenerator {
    client: Client,
    config: AssistantConfig,
}

impl OpenAiGenerator {
    pub fn new(config: AssistantConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|err| ChatError::Generation(format!("Failed to create HTTP client: {err}")))?;
        Ok(Self::with_client(client, config))
    }

    fn with_client(client: Client, config: AssistantConfig) -> Self {
        Self { client, config }
    }

    fn complete(&self, prompt: String) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!("Requesting completion from {url} using model {}", self.config.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|err| ChatError::Generation(format!("Completion request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Generation(format!(
                "Completion endpoint returned HTTP {status}"
            )));
        }
        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|err| ChatError::Generation(format!("Malformed completion response: {err}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ChatError::Generation("Completion contained no choices".to_string()))
    }
}

impl SqlGenerator for OpenAiGenerator {
    fn generate_sql(&self, table: &str, columns: &[String], request: &str) -> Result<String> {
        let content = self.complete(build_prompt(table, columns, request))?;
        let sql = strip_code_fences(&content);
        if sql.is_empty() {
            return Err(ChatError::Generation(
                "Completion did not contain a SQL statement".to_string(),
            ));
        }
        Ok(sql)
    }
}

pub fn build_prompt(table: &str, columns: &[String], request: &str) -> String {
    format!(
        "Table: {table}\nSchema: {}\nUser Query: {request}\nGenerate the corresponding SQL query:",
        columns.join(", ")
    )
}

/// Trims the completion and, when it opens with a code fence, drops every
/// fence line.
pub fn strip_code_fences(content: &str) -> String {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    trimmed
        .lines()
        .filter(|line| !line.trim().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufRead, BufReader, Read, Write},
        net::TcpListener,
        thread,
    };

    use super::*;

    fn config(base_url: String) -> AssistantConfig {
        AssistantConfig {
            api_key: "sk-test".to_string(),
            base_url,
            model: "gpt-4o".to_string(),
            max_tokens: 150,
            temperature: 0.7,
        }
    }

    /// Answers a single request with `status` and a JSON `body`, returning the
    /// base URL to point the generator at.
    fn serve_once(status: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream);
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).expect("read header") == 0 || line == "\r\n" {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().expect("content length");
                    }
                }
            }
            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).expect("read body");
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            reader
                .into_inner()
                .write_all(response.as_bytes())
                .expect("write response");
        });
        format!("http://{addr}")
    }

    fn completion(content: &str) -> String {
        serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })
        .to_string()
    }

    fn generate(base_url: String) -> Result<String> {
        let client = Client::builder().no_proxy().build().expect("client");
        let generator = OpenAiGenerator::with_client(client, config(base_url));
        generator.generate_sql("employees", &["id".to_string()], "count rows")
    }

    fn generation_message(result: Result<String>) -> String {
        match result {
            Err(ChatError::Generation(message)) => message,
            other => panic!("expected a generation error, got {other:?}"),
        }
    }

    #[test]
    fn fenced_completion_becomes_bare_sql() {
        let url = serve_once("200 OK", completion("```sql\nSELECT COUNT(*) FROM employees;\n```"));
        assert_eq!(generate(url).expect("sql"), "SELECT COUNT(*) FROM employees;");
    }

    #[test]
    fn unreachable_endpoint_is_a_generation_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let message = generation_message(generate(format!("http://{addr}")));
        assert!(message.contains("Completion request failed"));
    }

    #[test]
    fn error_status_is_a_generation_error() {
        let url = serve_once(
            "500 Internal Server Error",
            r#"{"error":{"message":"boom"}}"#.to_string(),
        );
        let message = generation_message(generate(url));
        assert!(message.contains("HTTP 500"));
    }

    #[test]
    fn missing_choices_are_a_generation_error() {
        let url = serve_once("200 OK", r#"{"choices":[]}"#.to_string());
        let message = generation_message(generate(url));
        assert!(message.contains("no choices"));
    }

    #[test]
    fn blank_completion_is_a_generation_error() {
        let url = serve_once("200 OK", completion("  \n```\n```"));
        let message = generation_message(generate(url));
        assert!(message.contains("did not contain a SQL statement"));
    }

    #[test]
    fn fences_are_removed_with_language_tags() {
        let content = "```sql\nSELECT name\nFROM employees;\n```\n";
        assert_eq!(strip_code_fences(content), "SELECT name\nFROM employees;");
    }

    #[test]
    fn unfenced_content_is_only_trimmed() {
        assert_eq!(strip_code_fences("  SELECT 1;\n"), "SELECT 1;");
    }

    #[test]
    fn prompt_lists_table_columns() {
        let prompt = build_prompt(
            "employees",
            &["id".to_string(), "name".to_string()],
            "who earns most",
        );
        assert_eq!(
            prompt,
            "Table: employees\nSchema: id, name\nUser Query: who earns most\nGenerate the corresponding SQL query:"
        );
    }

    #[test]
    fn response_payload_deserializes() {
        let payload = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"SELECT 1"},"finish_reason":"stop"}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(payload).expect("parse");
        assert_eq!(parsed.choices[0].message.content, "SELECT 1");
    }
}
