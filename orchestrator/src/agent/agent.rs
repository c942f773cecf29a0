//! The agent facade: an LLM-backed executor with tool access, or a null
//! stand-in that always falls back to the deterministic policy.
//!
//! Per the interface contract, the model-calling path is not the tested
//! core of this service — `FallbackPolicy` is. `NullAgent` exists so the
//! orchestrator can run (and be tested) without any model credentials.

use super::registry::ToolRegistry;
use crate::config::ModelConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[async_trait]
pub trait Agent: Send + Sync {
    async fn invoke(&self, message: &str) -> anyhow::Result<String>;
}

/// Always fails, forcing every batch and timer callback through
/// `FallbackPolicy`. Used in tests and when no model is configured.
pub struct NullAgent;

#[async_trait]
impl Agent for NullAgent {
    async fn invoke(&self, _message: &str) -> anyhow::Result<String> {
        anyhow::bail!("NullAgent never succeeds")
    }
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Forwards messages to a configurable chat-completions-with-tools endpoint.
/// Tool results are not looped back into the conversation here; the
/// surrounding orchestrator treats any invocation error as a cue to run
/// `FallbackPolicy` instead, so a single best-effort round trip suffices.
pub struct ToolCallingAgent {
    http: reqwest::Client,
    config: ModelConfig,
    system_prompt: String,
    #[allow(dead_code)]
    tools: Arc<ToolRegistry>,
}

impl ToolCallingAgent {
    pub fn new(config: ModelConfig, system_prompt: String, tools: Arc<ToolRegistry>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            system_prompt,
            tools,
        }
    }

    fn endpoint(&self) -> String {
        match &self.config.model_base_url {
            Some(base) => format!("{}/chat/completions", base.trim_end_matches('/')),
            None => "https://api.openai.com/v1/chat/completions".to_string(),
        }
    }
}

#[async_trait]
impl Agent for ToolCallingAgent {
    async fn invoke(&self, message: &str) -> anyhow::Result<String> {
        let request = ChatCompletionRequest {
            model: self.config.model_name.clone(),
            messages: vec![
                ChatMessage { role: "system", content: self.system_prompt.clone() },
                ChatMessage { role: "user", content: message.to_string() },
            ],
            temperature: self.config.model_temperature,
            max_tokens: self.config.model_max_tokens,
        };

        let mut req = self.http.post(self.endpoint()).json(&request);
        if let Some(key) = &self.config.model_api_key {
            req = req.bearer_auth(key);
        }

        let response: ChatCompletionResponse = req.send().await?.error_for_status()?.json().await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("model returned no content"))
    }
}
