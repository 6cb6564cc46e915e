// src/llm/structured.rs
//! Structured (JSON) requests over a free-text service.
//!
//! Policy, in order:
//! 1. Ask for strict JSON only.
//! 2. Retry transport failures up to `max_attempts`.
//! 3. Parse; else strip a fenced block / surrounding prose and parse again.
//! 4. Unparseable or rejected by the validator → one repair round-trip at temperature 0.
//! 5. Still failing → typed [`ServiceError`].

use std::time::Duration;

use metrics::counter;
use serde_json::Value;
use tracing::{debug, warn};

use super::{GenerativeService, ServiceError, ServiceRequest};
use crate::config::AiConfig;
use crate::text::anon_hash;

const JSON_ONLY: &str = "Return ONLY valid JSON. Do not include markdown fences or any commentary.";

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            pause: Duration::from_millis(800),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &AiConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            ..Self::default()
        }
    }

    /// No pauses; used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            pause: Duration::ZERO,
        }
    }
}

/// Remove a leading ```` ``` ````/```` ```json ```` line and a trailing ```` ``` ````.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // drop the info string ("json", "JSON", ...) up to the first newline
        s = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Slice from the first `{`/`[` to the last matching closer, if both exist.
fn outermost_json(s: &str) -> Option<&str> {
    let start = s.find(['{', '['])?;
    let closer = if s[start..].starts_with('{') { '}' } else { ']' };
    let end = s.rfind(closer)?;
    (end > start).then(|| &s[start..=end])
}

/// Parse model output as JSON, tolerating fences and surrounding prose.
pub fn parse_lenient(raw: &str) -> Result<Value, ServiceError> {
    let first_err = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(v) => return Ok(v),
        Err(e) => e,
    };
    let stripped = strip_code_fence(raw);
    if let Ok(v) = serde_json::from_str::<Value>(stripped) {
        return Ok(v);
    }
    if let Some(inner) = outermost_json(stripped) {
        if let Ok(v) = serde_json::from_str::<Value>(inner) {
            return Ok(v);
        }
    }
    Err(ServiceError::Unparseable(first_err.to_string()))
}

fn decode<T, F>(raw: &str, validate: &F) -> Result<T, ServiceError>
where
    F: Fn(Value) -> Result<T, String>,
{
    let v = parse_lenient(raw)?;
    validate(v).map_err(ServiceError::Invalid)
}

async fn generate_with_retries(
    service: &dyn GenerativeService,
    req: &ServiceRequest,
    policy: &RetryPolicy,
) -> Result<String, ServiceError> {
    let mut last = ServiceError::Transport("no attempt made".into());
    for attempt in 1..=policy.max_attempts.max(1) {
        match service.generate(req).await {
            Ok(text) => return Ok(text),
            Err(ServiceError::Disabled) => return Err(ServiceError::Disabled),
            Err(e) => {
                warn!(provider = service.provider_name(), attempt, error = %e, "service call failed");
                last = e;
                if attempt < policy.max_attempts && !policy.pause.is_zero() {
                    tokio::time::sleep(policy.pause).await;
                }
            }
        }
    }
    Err(last)
}

fn repair_prompt(previous: &str, problem: &ServiceError) -> String {
    format!(
        "Your previous output could not be used ({problem}).\n\
         Rewrite it as valid JSON with the same content. Do not add any keys.\n\
         {JSON_ONLY}\n\nPrevious output:\n{previous}"
    )
}

/// Run one structured request. `validate` turns the parsed value into `T` or explains
/// why the shape is unusable; a rejection triggers the repair round like a parse failure.
pub async fn request_json<T, F>(
    service: &dyn GenerativeService,
    req: ServiceRequest,
    policy: &RetryPolicy,
    validate: F,
) -> Result<T, ServiceError>
where
    F: Fn(Value) -> Result<T, String>,
{
    let prompt_id = anon_hash(&req.prompt);
    let json_req = ServiceRequest {
        prompt: format!("{}\n\n{JSON_ONLY}", req.prompt.trim()),
        ..req
    };

    let raw = generate_with_retries(service, &json_req, policy).await.inspect_err(|e| {
        counter!("service_failures_total").increment(1);
        warn!(%prompt_id, error = %e, "structured request failed before parsing");
    })?;

    let problem = match decode(&raw, &validate) {
        Ok(v) => {
            debug!(%prompt_id, provider = service.provider_name(), "structured output accepted");
            return Ok(v);
        }
        Err(e) => e,
    };

    debug!(%prompt_id, error = %problem, "structured output rejected; attempting repair");
    counter!("service_repairs_total").increment(1);

    let mut repair = ServiceRequest::new(repair_prompt(&raw, &problem)).temperature(0.0);
    repair.seed = json_req.seed;

    let repaired = generate_with_retries(service, &repair, &RetryPolicy::immediate(1))
        .await
        .and_then(|text| decode(&text, &validate));

    match repaired {
        Ok(v) => {
            debug!(%prompt_id, "repaired output accepted");
            Ok(v)
        }
        Err(e) => {
            counter!("service_failures_total").increment(1);
            warn!(%prompt_id, error = %e, "structured output unusable after repair");
            Err(e)
        }
    }
}
