use crate::services::providers::GenerationParams;
use crate::services::FanOutStrategy;
use secrecy::SecretString;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MODELS: &str = "google/flan-t5-small,distilgpt2";
const DEFAULT_INFERENCE_BASE_URL: &str = "https://api-inference.huggingface.co/models";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct SentenceConfig {
    pub common: core_config::Config,
    pub models: ModelsConfig,
    pub selection: SelectionConfig,
    pub inference: InferenceSettings,
}

/// Ordered model registry and shared sampling parameters.
#[derive(Debug, Clone, Default)]
pub struct ModelsConfig {
    /// Model ids in registration order. Earlier ids win ties.
    pub model_ids: Vec<String>,
    pub backend: BackendKind,
    pub generation: GenerationParams,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    Inference,
    Mock,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inference" => Ok(BackendKind::Inference),
            "mock" => Ok(BackendKind::Mock),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FanOutMode {
    #[default]
    Sequential,
    Concurrent,
}

impl FromStr for FanOutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(FanOutMode::Sequential),
            "concurrent" => Ok(FanOutMode::Concurrent),
            other => Err(format!("unknown fan-out mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectionConfig {
    pub mode: FanOutMode,
    /// Aggregate bound for the concurrent mode.
    pub timeout: Duration,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            mode: FanOutMode::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl SelectionConfig {
    pub fn strategy(&self) -> FanOutStrategy {
        match self.mode {
            FanOutMode::Sequential => FanOutStrategy::Sequential,
            FanOutMode::Concurrent => FanOutStrategy::Concurrent {
                timeout: self.timeout,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceSettings {
    pub base_url: String,
    pub api_token: Option<SecretString>,
    /// Per-call HTTP timeout.
    pub request_timeout: Duration,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INFERENCE_BASE_URL.to_string(),
            api_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl SentenceConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the service settings from `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_ids = parse_model_ids(
            &lookup("SENTENCE_MODELS").unwrap_or_else(|| DEFAULT_MODELS.to_string()),
        )?;

        let defaults = GenerationParams::default();
        let generation = GenerationParams {
            max_new_tokens: parse_env(
                &lookup,
                "GENERATION_MAX_NEW_TOKENS",
                defaults.max_new_tokens,
            )?,
            temperature: parse_env(&lookup, "GENERATION_TEMPERATURE", defaults.temperature)?,
            top_p: parse_env(&lookup, "GENERATION_TOP_P", defaults.top_p)?,
            ..defaults
        };

        if generation.temperature <= 0.0 {
            return Err(config_error("GENERATION_TEMPERATURE must be positive"));
        }
        if !(generation.top_p > 0.0 && generation.top_p <= 1.0) {
            return Err(config_error("GENERATION_TOP_P must be in (0, 1]"));
        }

        let timeout_secs = parse_env(&lookup, "SENTENCE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let request_timeout_secs = parse_env(
            &lookup,
            "INFERENCE_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;

        let backend = parse_env(&lookup, "SENTENCE_BACKEND", BackendKind::default())?;
        let api_token = lookup("INFERENCE_API_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .map(SecretString::new);

        let is_prod = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string()) == "prod";
        if is_prod && backend == BackendKind::Inference && api_token.is_none() {
            return Err(config_error(
                "INFERENCE_API_TOKEN is required in production but not set",
            ));
        }

        Ok(SentenceConfig {
            common,
            models: ModelsConfig {
                model_ids,
                backend,
                generation,
            },
            selection: SelectionConfig {
                mode: parse_env(&lookup, "SENTENCE_FAN_OUT", FanOutMode::default())?,
                timeout: Duration::from_secs(timeout_secs),
            },
            inference: InferenceSettings {
                base_url: lookup("INFERENCE_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_INFERENCE_BASE_URL.to_string()),
                api_token,
                request_timeout: Duration::from_secs(request_timeout_secs),
            },
        })
    }
}

fn config_error(message: impl Into<String>) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(message.into()))
}

fn parse_model_ids(raw: &str) -> Result<Vec<String>, AppError> {
    let ids: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    if ids.is_empty() {
        return Err(config_error("SENTENCE_MODELS must name at least one model"));
    }
    Ok(ids)
}

fn parse_env<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| config_error(format!("{} has invalid value '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<SentenceConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SentenceConfig::from_lookup(core_config::Config { port: 8000 }, |key| {
            vars.get(key).cloned()
        })
    }

    #[test]
    fn defaults_register_two_models_sequentially() {
        let config = load(&[]).unwrap();
        assert_eq!(
            config.models.model_ids,
            vec!["google/flan-t5-small", "distilgpt2"]
        );
        assert_eq!(config.models.backend, BackendKind::Inference);
        assert_eq!(config.selection.strategy(), FanOutStrategy::Sequential);
        assert_eq!(config.models.generation, GenerationParams::default());
        assert!(config.inference.api_token.is_none());
    }

    #[test]
    fn model_order_is_preserved() {
        let config = load(&[("SENTENCE_MODELS", " m2 , m1,,m3 ")]).unwrap();
        assert_eq!(config.models.model_ids, vec!["m2", "m1", "m3"]);
    }

    #[test]
    fn empty_model_list_is_rejected() {
        let err = load(&[("SENTENCE_MODELS", " , ")]).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn concurrent_mode_carries_timeout() {
        let config = load(&[
            ("SENTENCE_FAN_OUT", "Concurrent"),
            ("SENTENCE_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(
            config.selection.strategy(),
            FanOutStrategy::Concurrent {
                timeout: Duration::from_secs(5)
            }
        );
    }

    #[test]
    fn invalid_numbers_are_config_errors() {
        assert!(load(&[("SENTENCE_TIMEOUT_SECS", "soon")]).is_err());
        assert!(load(&[("GENERATION_TOP_P", "1.5")]).is_err());
        assert!(load(&[("GENERATION_TEMPERATURE", "0")]).is_err());
        assert!(load(&[("SENTENCE_BACKEND", "gpu")]).is_err());
    }

    #[test]
    fn production_requires_inference_token() {
        let err = load(&[("ENVIRONMENT", "prod")]).unwrap_err();
        assert!(err.to_string().contains("INFERENCE_API_TOKEN"));

        assert!(load(&[("ENVIRONMENT", "prod"), ("INFERENCE_API_TOKEN", "hf_x")]).is_ok());
        assert!(load(&[("ENVIRONMENT", "prod"), ("SENTENCE_BACKEND", "mock")]).is_ok());
    }

    #[test]
    fn blank_token_is_ignored() {
        let config = load(&[("INFERENCE_API_TOKEN", "  ")]).unwrap();
        assert!(config.inference.api_token.is_none());
    }
}
