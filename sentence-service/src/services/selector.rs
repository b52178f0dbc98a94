//! Sentence selection across registered models.
//!
//! The selector owns the ordered model registry. Each request fans the word
//! out to the invokers, keeps the candidate from the lowest-registered model
//! that produced one, and otherwise answers with a templated fallback.

use crate::services::invoker::{
    truncate_tokens, InvocationOutcome, ModelInvoker, MAX_SENTENCE_TOKENS,
};
use crate::services::metrics;
use std::time::Duration;
use thiserror::Error;
use tokio::task::{AbortHandle, JoinError, JoinHandle};

/// How invokers are scheduled for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOutStrategy {
    /// One model at a time in registration order, stopping at the first sentence.
    Sequential,
    /// All models at once under a single aggregate time bound.
    Concurrent { timeout: Duration },
}

/// Errors surfaced to the HTTP caller instead of a sentence.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Some models took too long to respond.")]
    Timeout(Duration),

    #[error("An error occurred: {0}")]
    Orchestration(String),
}

impl SelectionError {
    pub fn label(&self) -> &'static str {
        match self {
            SelectionError::Timeout(_) => "timeout",
            SelectionError::Orchestration(_) => "error",
        }
    }
}

/// Where the returned sentence came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Generated { model_id: String, sentence: String },
    Fallback { sentence: String },
}

impl Selection {
    pub fn sentence(&self) -> &str {
        match self {
            Selection::Generated { sentence, .. } | Selection::Fallback { sentence } => sentence,
        }
    }

    pub fn into_sentence(self) -> String {
        match self {
            Selection::Generated { sentence, .. } | Selection::Fallback { sentence } => sentence,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Selection::Generated { .. } => "generated",
            Selection::Fallback { .. } => "fallback",
        }
    }
}

/// Templated sentence used when no model produced a candidate.
///
/// The word leads the template, so it survives truncation for words of up to
/// [`MAX_SENTENCE_TOKENS`] tokens.
pub fn fallback_sentence(word: &str) -> String {
    truncate_tokens(
        &format!("{} is used in this sentence.", word.trim()),
        MAX_SENTENCE_TOKENS,
    )
}

fn spawn_invocation(invoker: &ModelInvoker, word: &str) -> JoinHandle<InvocationOutcome> {
    let invoker = invoker.clone();
    let word = word.to_owned();
    tokio::spawn(async move { invoker.invoke(&word).await })
}

/// A panicking backend counts as a failed invocation. Only cancellation is an error.
fn settle(
    model_id: &str,
    joined: Result<InvocationOutcome, JoinError>,
) -> Result<InvocationOutcome, SelectionError> {
    match joined {
        Ok(outcome) => Ok(outcome),
        Err(e) if e.is_panic() => {
            tracing::warn!(model = %model_id, error = %e, "Model invocation panicked");
            metrics::record_provider_error(model_id, "panic");
            Ok(InvocationOutcome::Failed(e.to_string()))
        }
        Err(e) => Err(SelectionError::Orchestration(e.to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct SentenceSelector {
    invokers: Vec<ModelInvoker>,
    strategy: FanOutStrategy,
}

impl SentenceSelector {
    pub fn new(invokers: Vec<ModelInvoker>, strategy: FanOutStrategy) -> Self {
        Self { invokers, strategy }
    }

    pub fn strategy(&self) -> FanOutStrategy {
        self.strategy
    }

    /// Registered model ids in registration order.
    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.invokers.iter().map(ModelInvoker::model_id)
    }

    /// Invoke the registry for `word`.
    ///
    /// Outcomes come back in registration order. The list stops at the first
    /// sentence, so it may be shorter than the registry.
    pub async fn fan_out(&self, word: &str) -> Result<Vec<InvocationOutcome>, SelectionError> {
        match self.strategy {
            FanOutStrategy::Sequential => self.fan_out_sequential(word).await,
            FanOutStrategy::Concurrent { timeout } => {
                self.fan_out_concurrent(word, timeout).await
            }
        }
    }

    async fn fan_out_sequential(
        &self,
        word: &str,
    ) -> Result<Vec<InvocationOutcome>, SelectionError> {
        let mut outcomes = Vec::with_capacity(self.invokers.len());
        for invoker in &self.invokers {
            let joined = spawn_invocation(invoker, word).await;
            let outcome = settle(invoker.model_id(), joined)?;
            let done = outcome.is_sentence();
            outcomes.push(outcome);
            if done {
                break;
            }
        }
        Ok(outcomes)
    }

    async fn fan_out_concurrent(
        &self,
        word: &str,
        timeout: Duration,
    ) -> Result<Vec<InvocationOutcome>, SelectionError> {
        let handles: Vec<JoinHandle<InvocationOutcome>> = self
            .invokers
            .iter()
            .map(|invoker| spawn_invocation(invoker, word))
            .collect();
        let abort_handles: Vec<AbortHandle> =
            handles.iter().map(JoinHandle::abort_handle).collect();

        // Await in registration order: a later model finishing first never
        // overtakes an earlier one.
        let invokers = &self.invokers;
        let collect = async move {
            let mut outcomes = Vec::with_capacity(handles.len());
            for (invoker, handle) in invokers.iter().zip(handles) {
                let outcome = settle(invoker.model_id(), handle.await)?;
                let done = outcome.is_sentence();
                outcomes.push(outcome);
                if done {
                    break;
                }
            }
            Ok(outcomes)
        };

        let result = tokio::time::timeout(timeout, collect).await;

        // Whatever is still running is no longer wanted.
        for handle in &abort_handles {
            handle.abort();
        }

        match result {
            Ok(outcomes) => outcomes,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    models = self.invokers.len(),
                    "Aggregate model timeout elapsed"
                );
                Err(SelectionError::Timeout(timeout))
            }
        }
    }

    /// Pick the sentence for `word`: first candidate in registration order, or the fallback.
    pub async fn select(&self, word: &str) -> Result<Selection, SelectionError> {
        let result = self.fan_out(word).await.map(|outcomes| {
            outcomes
                .into_iter()
                .zip(self.invokers.iter())
                .find_map(|(outcome, invoker)| match outcome {
                    InvocationOutcome::Sentence(sentence) => Some(Selection::Generated {
                        model_id: invoker.model_id().to_string(),
                        sentence,
                    }),
                    _ => None,
                })
                .unwrap_or_else(|| Selection::Fallback {
                    sentence: fallback_sentence(word),
                })
        });

        match &result {
            Ok(selection) => {
                let model = match selection {
                    Selection::Generated { model_id, .. } => model_id.as_str(),
                    Selection::Fallback { .. } => "-",
                };
                tracing::info!(
                    source = selection.source(),
                    model,
                    word_len = word.len(),
                    "Sentence selected"
                );
                metrics::record_selection(selection.source());
            }
            Err(e) => {
                tracing::error!(error = %e, word_len = word.len(), "Sentence selection failed");
                metrics::record_selection(e.label());
            }
        }

        result
    }
}
