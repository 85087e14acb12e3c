//! The LLM oracle adapter: `decide(prompt, schema) -> JsonObject`, with key
//! rotation, exponential backoff, per-credential rate limiting and
//! schema-validated re-prompting.

pub mod auth;
pub mod client;
pub mod ratelimit;
pub mod schema;
pub(crate) mod util;

use std::time::Duration;

use forge_domain::config::OracleConfig;
use forge_domain::{Error, Result};
use rand::Rng;
use serde_json::Value;

use auth::AuthRotator;
use client::OpenAiCompatClient;
use ratelimit::RateLimiter;

const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(8);

/// Wraps the configured credential ring behind the `decide` contract used by
/// the reasoning agent.
pub struct OracleAdapter {
    rotator: AuthRotator,
    rate_limiter: RateLimiter,
    client: OpenAiCompatClient,
    max_attempts_per_credential: u32,
}

impl OracleAdapter {
    pub fn from_config(cfg: &OracleConfig) -> Result<Self> {
        let rotator = AuthRotator::from_credentials(&cfg.credentials)?;
        let rate_limiter = RateLimiter::new(rotator.len(), cfg.rate_per_minute);
        Ok(OracleAdapter {
            rotator,
            rate_limiter,
            client: OpenAiCompatClient::new(),
            max_attempts_per_credential: cfg.max_attempts_per_credential,
        })
    }

    /// Produces the next agent decision. Validates the response against
    /// `schema`; on a mismatch, re-prompts once with a hint before giving up
    /// with [`Error::BadOracleResponse`].
    pub async fn decide(&self, prompt: &str, schema: &Value) -> Result<Value> {
        let value = self.request_with_retry(prompt).await?;
        if schema::validate(&value, schema).is_ok() {
            return Ok(value);
        }

        let hinted = format!(
            "{prompt}\n\nYour previous response did not match the required shape. \
             Return only valid JSON matching this schema: {schema}"
        );
        let retried = self.request_with_retry(&hinted).await?;
        match schema::validate(&retried, schema) {
            Ok(()) => Ok(retried),
            Err(reason) => Err(Error::BadOracleResponse(reason)),
        }
    }

    async fn request_with_retry(&self, prompt: &str) -> Result<Value> {
        let ring_len = self.rotator.len().max(1) as u32;
        let mut last_err = Error::OracleUnavailable("no credentials attempted".into());

        for credential_attempt in 0..ring_len {
            let cred = self.rotator.next_key();
            for attempt in 0..self.max_attempts_per_credential {
                self.rate_limiter.acquire(cred.index).await;
                match self.client.chat_json(&cred, prompt).await {
                    Ok(value) => return Ok(value),
                    Err(e) if e.is_transient() => {
                        last_err = e;
                        self.rotator.mark_failed(cred.index);
                        let delay = backoff_delay(attempt);
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => return Err(e),
                }
            }
            let _ = credential_attempt;
        }

        Err(last_err)
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    let capped = exp.min(BACKOFF_CAP);
    let jitter_frac = rand::thread_rng().gen_range(-0.2..=0.2);
    let jittered_secs = capped.as_secs_f64() * (1.0 + jitter_frac);
    Duration::from_secs_f64(jittered_secs.max(0.0)).min(BACKOFF_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delay_is_capped() {
        for attempt in 0..10 {
            let d = backoff_delay(attempt);
            assert!(d <= BACKOFF_CAP + Duration::from_millis(1), "attempt {attempt} gave {d:?}");
        }
    }

    #[test]
    fn backoff_delay_grows_with_attempt_before_cap() {
        let d0 = backoff_delay(0);
        let d1 = backoff_delay(1);
        assert!(d1 >= d0 || d1 >= BACKOFF_CAP - Duration::from_millis(200));
    }
}
