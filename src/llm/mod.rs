// src/llm/mod.rs
//! Generative service: provider abstraction + concrete providers.
//!
//! The service is a free-text collaborator. Structured (JSON) calls go through
//! [`structured::request_json`], which owns the retry/repair policy.

pub mod mock;
pub mod structured;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::AiConfig;

pub use mock::MockService;
pub use structured::{request_json, strip_code_fence, RetryPolicy};

/// One round-trip to the service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    pub prompt: String,
    /// Provider default when `None`.
    pub temperature: Option<f32>,
    /// Sampling seed; varies output across re-rank attempts.
    pub seed: Option<u64>,
}

impl ServiceRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
            seed: None,
        }
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Typed failure of a service call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("generative service is disabled")]
    Disabled,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned HTTP {0}")]
    Status(u16),
    #[error("output is not valid JSON: {0}")]
    Unparseable(String),
    #[error("output has the wrong shape: {0}")]
    Invalid(String),
}

pub type ServiceFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ServiceError>> + Send + 'a>>;

/// Trait object used by the profile builder, ranker and drafter.
pub trait GenerativeService: Send + Sync {
    /// Send a prompt, return the raw text answer.
    fn generate<'a>(&'a self, req: &'a ServiceRequest) -> ServiceFuture<'a>;
    /// Provider name for diagnostics/logs.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynService = Arc<dyn GenerativeService>;

/// Factory: build a service according to config and environment.
///
/// * `AI_TEST_MODE=disabled` forces the disabled service.
/// * `enabled == false` → disabled service.
/// * Else the configured provider; unknown providers are disabled.
pub fn build_service_from_config(config: &AiConfig) -> DynService {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "disabled")
        .unwrap_or(false)
    {
        return Arc::new(DisabledService);
    }

    if !config.enabled {
        return Arc::new(DisabledService);
    }

    match config.provider.as_str() {
        "openai" => match OpenAiService::new(config) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                tracing::warn!(error = %e, "openai client build failed; service disabled");
                Arc::new(DisabledService)
            }
        },
        "gemini" => match GeminiService::new(config) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                tracing::warn!(error = %e, "gemini client build failed; service disabled");
                Arc::new(DisabledService)
            }
        },
        other => {
            tracing::warn!(provider = other, "unknown provider; service disabled");
            Arc::new(DisabledService)
        }
    }
}

fn http_client(config: &AiConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("grant-match/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
}

fn transport(e: reqwest::Error) -> ServiceError {
    ServiceError::Transport(e.to_string())
}

// ------------------------------------------------------------
// OpenAI (Chat Completions API)
// ------------------------------------------------------------

pub struct OpenAiService {
    http: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiService {
    pub fn new(config: &AiConfig) -> reqwest::Result<Self> {
        Ok(Self {
            http: http_client(config)?,
            api_key: config.api_key.clone(),
            model: config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
            temperature: config.temperature,
        })
    }
}

impl GenerativeService for OpenAiService {
    fn generate<'a>(&'a self, req: &'a ServiceRequest) -> ServiceFuture<'a> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(ServiceError::Disabled);
            }

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                #[serde(skip_serializing_if = "Option::is_none")]
                seed: Option<u64>,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                #[serde(default)]
                content: Option<String>,
            }

            let body = Req {
                model: &self.model,
                messages: vec![Msg {
                    role: "user",
                    content: &req.prompt,
                }],
                temperature: req.temperature.unwrap_or(self.temperature),
                seed: req.seed,
            };

            let resp = self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(transport)?;

            if !resp.status().is_success() {
                return Err(ServiceError::Status(resp.status().as_u16()));
            }
            let parsed: Resp = resp.json().await.map_err(transport)?;
            Ok(parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default()
                .trim()
                .to_string())
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Gemini (generateContent REST API)
// ------------------------------------------------------------

pub struct GeminiService {
    http: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GeminiService {
    pub fn new(config: &AiConfig) -> reqwest::Result<Self> {
        Ok(Self {
            http: http_client(config)?,
            api_key: config.api_key.clone(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            temperature: config.temperature,
        })
    }
}

impl GenerativeService for GeminiService {
    fn generate<'a>(&'a self, req: &'a ServiceRequest) -> ServiceFuture<'a> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(ServiceError::Disabled);
            }

            let mut generation = serde_json::json!({
                "temperature": req.temperature.unwrap_or(self.temperature),
            });
            if let Some(seed) = req.seed {
                generation["seed"] = serde_json::json!(seed);
            }
            let body = serde_json::json!({
                "contents": [{ "parts": [{ "text": req.prompt }] }],
                "generationConfig": generation,
            });

            let url = format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                self.model
            );
            let resp = self
                .http
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(transport)?;

            if !resp.status().is_success() {
                return Err(ServiceError::Status(resp.status().as_u16()));
            }
            let v: serde_json::Value = resp.json().await.map_err(transport)?;
            let text = v["candidates"][0]["content"]["parts"]
                .as_array()
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(|p| p["text"].as_str())
                        .collect::<Vec<_>>()
                        .join("")
                })
                .unwrap_or_default();
            Ok(text.trim().to_string())
        })
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

// ------------------------------------------------------------
// Disabled
// ------------------------------------------------------------

/// Always fails with [`ServiceError::Disabled`]; callers take their local fallback.
pub struct DisabledService;

impl GenerativeService for DisabledService {
    fn generate<'a>(&'a self, _req: &'a ServiceRequest) -> ServiceFuture<'a> {
        Box::pin(async { Err(ServiceError::Disabled) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}
