//! A single OpenAI-chat-completions-compatible HTTP call.
//!
//! One generic adapter covers the large majority of self-hosted and
//! commercial endpoints (OpenAI, Azure OpenAI, OpenRouter, vLLM, Ollama's
//! compat surface) without a per-vendor adapter, matching the "opaque
//! text-in / structured-JSON-out oracle" contract the agent needs.

use std::time::Duration;

use forge_domain::{Error, Result};
use serde_json::{json, Value};

use crate::auth::ResolvedCredential;
use crate::util::from_reqwest;

const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct OpenAiCompatClient {
    http: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("reqwest client builds");
        OpenAiCompatClient { http }
    }

    /// Sends `prompt` as a single user message in JSON response-format mode
    /// and returns the assistant content's parsed JSON body.
    pub async fn chat_json(&self, cred: &ResolvedCredential, prompt: &str) -> Result<Value> {
        let url = format!("{}/chat/completions", cred.base_url.trim_end_matches('/'));
        let body = json!({
            "model": cred.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
            "messages": [{"role": "user", "content": prompt}],
            "response_format": {"type": "json_object"},
            "temperature": 0.2,
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&cred.key)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::OracleUnavailable("rate limited (429)".into()));
        }
        if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::BadOracleResponse(format!("provider returned {status}: {text}")));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::OracleUnavailable(format!("provider returned {status}: {text}")));
        }

        let payload: Value = resp.json().await.map_err(from_reqwest)?;
        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::BadOracleResponse("response missing choices[0].message.content".into()))?;

        serde_json::from_str(content).map_err(|e| Error::BadOracleResponse(format!("content is not valid JSON: {e}")))
    }
}

impl Default for OpenAiCompatClient {
    fn default() -> Self {
        Self::new()
    }
}
