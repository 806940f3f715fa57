//! Agent loop for tool-based layout planning.
//!
//! The model talks to Ollama's `/api/chat` endpoint with the data tools
//! attached. Each chat request is one decision round; the loop ends when the
//! model submits a layout, either through the `submit_layout` tool or as JSON
//! in a plain reply. Running out of rounds is a hard failure.

use crate::agent::planner::DecisionEngine;
use crate::agent::tools::{get_tool_definitions, ToolCall, ToolExecutor};
use crate::error::{SynthesisError, SynthesisResult};
use crate::layout::registry::{Component, ComponentFamily};
use crate::layout::{extract_decision, LayoutDecision};
use crate::models::ReportRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Max tool results to keep in context (sliding window)
    pub max_context_messages: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.1,
            timeout_seconds: 120,
            max_context_messages: 12,
        }
    }
}

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Decision engine backed by an Ollama model.
pub struct LayoutAgent {
    config: AgentConfig,
    http_client: reqwest::Client,
    messages: Vec<ChatMessage>,
}

impl LayoutAgent {
    pub fn new(config: AgentConfig) -> SynthesisResult<Self> {
        info!("Initializing layout agent with model {}", config.model_name);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SynthesisError::Decision(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            messages: Vec::new(),
        })
    }

    /// Prune old tool messages to keep context small (sliding window).
    fn prune_old_messages(&mut self) {
        // Keep: system prompt + initial user request + last N messages
        let keep_start = 2;
        let max_keep = self.config.max_context_messages + keep_start;

        if self.messages.len() > max_keep {
            let remove_count = self.messages.len() - max_keep;
            self.messages.drain(keep_start..keep_start + remove_count);
            debug!("Pruned {} old messages to save context", remove_count);
        }
    }

    /// Send a chat request with tools to Ollama.
    async fn chat_with_tools(&mut self) -> SynthesisResult<ChatMessage> {
        let url = format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'));

        let tools = get_tool_definitions()
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SynthesisError::Decision(format!("Failed to encode tools: {}", e)))?;

        let request = OllamaChatRequest {
            model: self.config.model_name.clone(),
            messages: self.messages.clone(),
            tools,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        debug!("Sending chat request with {} messages", self.messages.len());

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SynthesisError::Timeout(Duration::from_secs(self.config.timeout_seconds))
                } else if e.is_connect() {
                    SynthesisError::Decision(format!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.config.ollama_url
                    ))
                } else {
                    SynthesisError::Decision(format!("Failed to send request: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Decision(format!(
                "Ollama API error {}: {}",
                status, body
            )));
        }

        let chat_response: OllamaChatResponse = response.json().await.map_err(|e| {
            SynthesisError::Decision(format!("Failed to parse Ollama response: {}", e))
        })?;

        let mut message = chat_response.message;
        message.role = "assistant".to_string();
        self.messages.push(message.clone());

        Ok(message)
    }
}

#[async_trait]
impl DecisionEngine for LayoutAgent {
    fn name(&self) -> &str {
        "agent"
    }

    async fn decide(
        &mut self,
        request: &ReportRequest,
        tools: &mut ToolExecutor,
    ) -> SynthesisResult<LayoutDecision> {
        info!("Starting layout planning (tool-calling mode)");

        self.messages.clear();
        self.messages.push(ChatMessage::new("system", system_prompt()));
        self.messages.push(ChatMessage::new("user", user_prompt(request)));

        loop {
            let round = tools.begin_round()?;
            let response = self.chat_with_tools().await?;

            let tool_calls = response.tool_calls.unwrap_or_default();
            if tool_calls.is_empty() {
                match extract_decision(&response.content) {
                    Ok(decision) => {
                        info!("Layout received as text in round {}", round);
                        return Ok(decision);
                    }
                    Err(e) => {
                        warn!("Round {} reply carried no usable layout: {}", round, e);
                        self.messages.push(ChatMessage::new(
                            "user",
                            format!(
                                "Your reply did not contain a valid layout ({}). \
                                 Call submit_layout with the layout JSON.",
                                e
                            ),
                        ));
                        continue;
                    }
                }
            }

            for tool_call in &tool_calls {
                let result = tools.execute(tool_call).await?;
                self.messages.push(ChatMessage::new("tool", result.content()));
            }

            if let Some(decision) = tools.take_submitted() {
                info!("Layout submitted in round {}", round);
                return Ok(decision);
            }

            self.prune_old_messages();
        }
    }
}

/// System prompt describing the component registry and output contract.
pub fn system_prompt() -> String {
    let mut prompt = String::from(SYSTEM_PROMPT_HEAD);

    prompt.push_str("\n## Components\n\n");
    for family in [ComponentFamily::Header, ComponentFamily::Main] {
        prompt.push_str(&format!("{} sections:\n", family));
        for component in Component::in_family(family) {
            let required = component.required_props();
            if required.is_empty() {
                prompt.push_str(&format!("- {}\n", component));
            } else {
                prompt.push_str(&format!(
                    "- {} (required props: {})\n",
                    component,
                    required.join(", ")
                ));
            }
        }
        prompt.push('\n');
    }

    prompt.push_str(SYSTEM_PROMPT_TAIL);
    prompt
}

fn user_prompt(request: &ReportRequest) -> String {
    let mut prompt = format!("Request: {}\n\n", request.user_request);
    if request.data_paths.is_empty() {
        prompt.push_str("No data paths were supplied. Use TEXT content only.\n");
    } else {
        prompt.push_str("Data paths:\n");
        for path in &request.data_paths {
            prompt.push_str(&format!("- {}\n", path));
        }
    }
    prompt
}

const SYSTEM_PROMPT_HEAD: &str = r#"You design report layouts. Given a reporting request and a list of data paths, you choose report components and bind each one to literal text or to a data path.

## Available Tools

- `read_data(path)` - Fields, types and first rows of a dataset
- `analyze_data(path, group_by)` - Row count, numeric fields, per-group totals
- `calculate_kpi(path, field, operation, group_by)` - sum / average / max / min
- `validate_path(path)` - Check that a data path exists
- `submit_layout(layout)` - Submit the finished layout

Only the data paths listed in the request may be used.
"#;

const SYSTEM_PROMPT_TAIL: &str = r#"## Layout Format

{"title": "...", "sections": {"header": [SECTION], "main": [SECTION]}}
SECTION = {"component": NAME, "title": "...", "description": "...", "contents": [ITEM]}
ITEM = {"source": "TEXT" or "S3", "component": NAME, "value": "...", "props": {...}}

## Rules

1. The header must contain a MainHeader section with the report title as TEXT.
2. At most 10 main sections. The first ones matter most.
3. Each item's component equals its section's component.
4. Use S3 with the data path as value when the component renders the raw dataset (DataTable, BarChart).
5. Use TEXT for computed numbers and prose (Card, TextField, MarkdownField).
6. BarChart props: {"xField": "<category field>", "yFields": ["<numeric field>", ...]}.
7. Card props: {"title": "...", "content": "<value>", "description": "...", "footer": "..."}.

Inspect the data with the tools first, then call submit_layout.
"#;
