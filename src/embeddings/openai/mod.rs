
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::SyncError;
use crate::config::Config;
use crate::embeddings::retry::{AttemptError, RetryPolicy, execute_with_retry};

const EMBEDDINGS_PATH: &str = "/v1/embeddings";

/// Client for an OpenAI-compatible `/v1/embeddings` endpoint.
///
/// Calls are synchronous (ureq); callers that need concurrency fan out with
/// `spawn_blocking`. The configured rate-limit delay is applied after every
/// call, per client handle, so concurrency level x delay bounds the
/// aggregate request rate.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    endpoint: Url,
    model: String,
    dimension: u32,
    api_key: String,
    agent: ureq::Agent,
    retry_policy: RetryPolicy,
    rate_limit_delay: Duration,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
    encoding_format: &'a str,
    dimensions: u32,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    #[expect(dead_code, reason = "deserialized for completeness")]
    total_tokens: u32,
}

/// One generated embedding plus the provider-reported prompt token count.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub token_count: u32,
}

impl OpenAiClient {
    /// Build a client from validated configuration. The dimension has
    /// already been range-checked by `Config::validate`, so any provider
    /// disagreement later is a hard `DimensionMismatch`.
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = config
            .embeddings
            .endpoint_url()
            .context("Failed to parse embeddings endpoint URL")?;
        let api_key = config
            .api_key()
            .context("Embedding provider API key is not available")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.embeddings.timeout_secs)))
            .build()
            .into();

        Ok(Self {
            endpoint,
            model: config.embeddings.model.clone(),
            dimension: config.embeddings.dimension,
            api_key,
            agent,
            retry_policy: RetryPolicy::default()
                .with_max_attempts(config.sync.retry_attempts),
            rate_limit_delay: Duration::from_millis(config.sync.rate_limit_delay_ms),
        })
    }

    #[inline]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    #[inline]
    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = delay;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Generate an embedding for one text input.
    ///
    /// Empty or whitespace-only text is rejected before any network call;
    /// meaningless vectors must never reach a collection. Transient provider
    /// failures are retried per the policy; the final failure surfaces as
    /// `EmbeddingProvider`. A response vector whose length differs from the
    /// requested dimension is a `DimensionMismatch`, fatal to the run.
    #[inline]
    pub fn embed(&self, text: &str) -> crate::Result<Embedding> {
        if text.trim().is_empty() {
            return Err(SyncError::EmptyContent(
                "empty or whitespace-only input".to_string(),
            ));
        }

        debug!("generating embedding for text of {} chars", text.len());

        let response = self
            .request_with_retry(text)
            .map_err(|e| SyncError::EmbeddingProvider(format!("{e:#}")))?;

        // One input, so exactly one data entry is expected
        let data = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::EmbeddingProvider("empty data in response".to_string()))?;

        if data.embedding.len() != self.dimension as usize {
            return Err(SyncError::DimensionMismatch {
                expected: self.dimension as usize,
                actual: data.embedding.len(),
            });
        }

        // Enforced even on success so the aggregate call rate stays under
        // the provider limit
        if !self.rate_limit_delay.is_zero() {
            std::thread::sleep(self.rate_limit_delay);
        }

        Ok(Embedding {
            vector: data.embedding,
            token_count: response.usage.prompt_tokens,
        })
    }

    fn request_with_retry(&self, text: &str) -> Result<EmbedResponse> {
        let url = self
            .endpoint
            .join(EMBEDDINGS_PATH)
            .context("Failed to build embeddings URL")?;

        let request = EmbedRequest {
            model: &self.model,
            input: text,
            encoding_format: "float",
            dimensions: self.dimension,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embedding request")?;

        let body = execute_with_retry(
            &self.retry_policy,
            |_attempt| self.send_request(&url, &request_json),
            std::thread::sleep,
        )?;

        serde_json::from_str(&body).context("Failed to parse embedding response")
    }

    fn send_request(&self, url: &Url, request_json: &str) -> Result<String, AttemptError> {
        let result = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send(request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string());

        match result {
            Ok(body) => Ok(body),
            Err(ureq::Error::StatusCode(status)) => {
                if status == 429 || status >= 500 {
                    warn!("retryable provider error: HTTP {}", status);
                    Err(AttemptError::Transient(anyhow::anyhow!("HTTP {}", status)))
                } else {
                    warn!("client error from provider: HTTP {}", status);
                    Err(AttemptError::Permanent(anyhow::anyhow!("HTTP {}", status)))
                }
            }
            Err(
                error @ (ureq::Error::ConnectionFailed
                | ureq::Error::HostNotFound
                | ureq::Error::Timeout(_)
                | ureq::Error::Io(_)),
            ) => {
                warn!("transport error: {}", error);
                Err(AttemptError::Transient(error.into()))
            }
            Err(error) => Err(AttemptError::Permanent(error.into())),
        }
    }
}
