//! Hosted inference backend.
//!
//! Talks to a Hugging Face style inference endpoint: one URL per model,
//! `{"inputs", "parameters", "options"}` in, `[{"generated_text"}]` out.

use super::{GeneratedSequence, GenerationParams, ProviderError, TextGenerator};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use service_core::observability::trace_headers;
use std::time::Duration;

/// Inference backend configuration.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub base_url: String,
    pub model_id: String,
    pub api_token: Option<SecretString>,
    pub request_timeout: Duration,
}

/// Backend that calls a remote inference endpoint for a single model.
pub struct InferenceGenerator {
    config: InferenceConfig,
    client: Client,
}

impl InferenceGenerator {
    pub fn new(config: InferenceConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Endpoint for the configured model.
    fn model_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model_id
        )
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters<'a>,
    options: InferenceOptions,
}

#[derive(Serialize)]
struct InferenceParameters<'a> {
    #[serde(flatten)]
    sampling: &'a GenerationParams,
    /// Causal models echo the prompt unless told otherwise.
    return_full_text: bool,
}

#[derive(Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
    use_cache: bool,
}

/// Some deployments answer with a bare object instead of a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Sequences(Vec<GeneratedSequence>),
    Single(GeneratedSequence),
}

impl From<InferenceResponse> for Vec<GeneratedSequence> {
    fn from(response: InferenceResponse) -> Self {
        match response {
            InferenceResponse::Sequences(sequences) => sequences,
            InferenceResponse::Single(sequence) => vec![sequence],
        }
    }
}

#[async_trait]
impl TextGenerator for InferenceGenerator {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Vec<GeneratedSequence>, ProviderError> {
        let request = InferenceRequest {
            inputs: prompt,
            parameters: InferenceParameters {
                sampling: params,
                return_full_text: false,
            },
            options: InferenceOptions {
                wait_for_model: true,
                use_cache: false,
            },
        };

        tracing::debug!(
            model = %self.config.model_id,
            prompt_len = prompt.len(),
            "Sending request to inference endpoint"
        );

        let mut builder = self
            .client
            .post(self.model_url())
            .headers(trace_headers())
            .json(&request);
        if let Some(token) = &self.config.api_token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
                StatusCode::SERVICE_UNAVAILABLE => ProviderError::ModelUnavailable(error_text),
                _ => ProviderError::ApiError(format!(
                    "Inference API error {}: {}",
                    status, error_text
                )),
            });
        }

        let body: InferenceResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        Ok(body.into())
    }

    fn provider(&self) -> &'static str {
        "inference"
    }
}
