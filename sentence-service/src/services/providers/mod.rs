//! Text-generation backend abstractions and implementations.
//!
//! Backends are opaque: they take a prompt plus sampling parameters and hand
//! back one or more generated sequences. Everything about model loading and
//! inference lives on the other side of [`TextGenerator`].

pub mod inference;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use inference::{InferenceConfig, InferenceGenerator};
pub use mock::MockTextGenerator;

/// Error type for backend operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::ModelUnavailable(_) => "model_unavailable",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::MalformedResponse(_) => "malformed_response",
            ProviderError::NetworkError(_) => "network_error",
        }
    }
}

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParams {
    /// Upper bound on generated tokens.
    pub max_new_tokens: u32,

    /// Sequences requested per call; only the first is consumed.
    pub num_return_sequences: u32,

    /// Stochastic sampling. Output differs run to run when enabled.
    pub do_sample: bool,

    pub temperature: f32,

    /// Nucleus sampling mass.
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 20,
            num_return_sequences: 1,
            do_sample: true,
            temperature: 0.9,
            top_p: 0.95,
        }
    }
}

/// One generated sequence as returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneratedSequence {
    pub generated_text: String,
}

impl GeneratedSequence {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            generated_text: text.into(),
        }
    }
}

/// Trait for text-generation backends.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run the model on `prompt`.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Vec<GeneratedSequence>, ProviderError>;

    /// Backend kind, for logs and metrics.
    fn provider(&self) -> &'static str;
}
