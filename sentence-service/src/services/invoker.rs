//! Model invoker.
//!
//! Wraps one registered backend: builds the prompt for a word, calls the
//! backend, and post-processes the raw text into a candidate sentence.
//! Backend errors end here as [`InvocationOutcome::Failed`]; they are logged
//! and never reach the HTTP caller.

use crate::services::metrics;
use crate::services::providers::{GenerationParams, TextGenerator};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Outputs with fewer tokens than this are treated as incomplete.
pub const MIN_SENTENCE_TOKENS: usize = 3;

/// Candidates are cut down to this many whitespace-separated tokens.
pub const MAX_SENTENCE_TOKENS: usize = 6;

/// Why a backend answer was not usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The backend returned no sequences.
    NoOutput,
    /// Fewer than [`MIN_SENTENCE_TOKENS`] tokens.
    TooShort,
    /// The word is absent after truncation.
    WordMissing,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::NoOutput => "no_output",
            Rejection::TooShort => "too_short",
            Rejection::WordMissing => "word_missing",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of invoking one model for one word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// A validated candidate sentence.
    Sentence(String),
    Rejected(Rejection),
    /// The backend call itself failed. Already logged.
    Failed(String),
}

impl InvocationOutcome {
    pub fn sentence(&self) -> Option<&str> {
        match self {
            InvocationOutcome::Sentence(sentence) => Some(sentence),
            _ => None,
        }
    }

    pub fn is_sentence(&self) -> bool {
        matches!(self, InvocationOutcome::Sentence(_))
    }

    /// Metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            InvocationOutcome::Sentence(_) => "sentence",
            InvocationOutcome::Rejected(rejection) => rejection.as_str(),
            InvocationOutcome::Failed(_) => "failed",
        }
    }
}

/// Build the instruction prompt for `word`.
pub fn build_prompt(word: &str) -> String {
    format!(
        "Word: '{word}'. Write a grammatically correct, meaningful sentence that uses this \
         word in natural, everyday conversation. For example: 'I like to {word} in the morning.'"
    )
}

/// Keep the first `max_tokens` whitespace-separated tokens, joined by single spaces.
pub fn truncate_tokens(text: &str, max_tokens: usize) -> String {
    text.split_whitespace()
        .take(max_tokens)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case-insensitive substring match. A blank word never matches.
///
/// Substring semantics mean "run" also matches "running" or "brunch".
pub fn contains_word(sentence: &str, word: &str) -> bool {
    let needle = word.trim();
    if needle.is_empty() {
        return false;
    }
    sentence.to_lowercase().contains(&needle.to_lowercase())
}

/// Turn raw backend text into a candidate sentence for `word`.
pub fn post_process(raw: &str, word: &str) -> Result<String, Rejection> {
    let trimmed = raw.trim();

    if trimmed.split_whitespace().count() < MIN_SENTENCE_TOKENS {
        return Err(Rejection::TooShort);
    }

    let sentence = truncate_tokens(trimmed, MAX_SENTENCE_TOKENS);

    if contains_word(&sentence, word) {
        Ok(sentence)
    } else {
        Err(Rejection::WordMissing)
    }
}

/// One registered model: identifier, backend handle, and sampling parameters.
#[derive(Clone)]
pub struct ModelInvoker {
    model_id: String,
    generator: Arc<dyn TextGenerator>,
    params: GenerationParams,
}

impl ModelInvoker {
    pub fn new(
        model_id: impl Into<String>,
        generator: Arc<dyn TextGenerator>,
        params: GenerationParams,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            generator,
            params,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub async fn invoke(&self, word: &str) -> InvocationOutcome {
        let prompt = build_prompt(word);
        let started = Instant::now();

        let outcome = match self.generator.generate(&prompt, &self.params).await {
            Ok(sequences) => match sequences.first() {
                Some(first) => match post_process(&first.generated_text, word) {
                    Ok(sentence) => InvocationOutcome::Sentence(sentence),
                    Err(rejection) => InvocationOutcome::Rejected(rejection),
                },
                None => InvocationOutcome::Rejected(Rejection::NoOutput),
            },
            Err(e) => {
                tracing::warn!(
                    model = %self.model_id,
                    provider = self.generator.provider(),
                    error_kind = e.kind(),
                    error = %e,
                    "Model invocation failed"
                );
                metrics::record_provider_error(&self.model_id, e.kind());
                InvocationOutcome::Failed(e.to_string())
            }
        };

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_model_invocation(&self.model_id, outcome.label(), elapsed);
        tracing::debug!(
            model = %self.model_id,
            outcome = outcome.label(),
            elapsed_secs = elapsed,
            "Model invocation finished"
        );

        outcome
    }
}

impl fmt::Debug for ModelInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInvoker")
            .field("model_id", &self.model_id)
            .field("provider", &self.generator.provider())
            .field("params", &self.params)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::MockTextGenerator;

    fn invoker(generator: MockTextGenerator) -> ModelInvoker {
        ModelInvoker::new("m1", Arc::new(generator), GenerationParams::default())
    }

    #[test]
    fn prompt_embeds_word() {
        let prompt = build_prompt("run");
        assert!(prompt.starts_with("Word: 'run'."));
        assert!(prompt.contains("I like to run in the morning."));
    }

    #[test]
    fn truncation_collapses_whitespace() {
        assert_eq!(
            truncate_tokens("  a  b\tc\nd e f g h ", MAX_SENTENCE_TOKENS),
            "a b c d e f"
        );
        assert_eq!(truncate_tokens("", MAX_SENTENCE_TOKENS), "");
    }

    #[test]
    fn short_output_is_rejected_regardless_of_word() {
        assert_eq!(post_process("  run fast ", "run"), Err(Rejection::TooShort));
        assert_eq!(post_process("", ""), Err(Rejection::TooShort));
    }

    #[test]
    fn three_tokens_is_enough() {
        assert_eq!(post_process("I run daily", "run"), Ok("I run daily".to_string()));
    }

    #[test]
    fn word_lost_in_truncation_is_rejected() {
        let raw = "Every single day at dawn I run";
        assert_eq!(post_process(raw, "run"), Err(Rejection::WordMissing));
    }

    #[test]
    fn word_as_sixth_token_is_kept() {
        let raw = "Every day at dawn I run home";
        assert_eq!(
            post_process(raw, "run"),
            Ok("Every day at dawn I run".to_string())
        );
    }

    #[test]
    fn long_output_is_cut_to_six_tokens() {
        let raw = "I run every morning before work and school";
        assert_eq!(
            post_process(raw, "run"),
            Ok("I run every morning before work".to_string())
        );
    }

    #[test]
    fn match_is_case_insensitive() {
        assert!(contains_word("Running Is Fun today", "RUN"));
        assert!(contains_word("Ich mag ÄPFEL sehr", "äpfel"));
    }

    #[test]
    fn substring_match_accepts_longer_words() {
        // Known false positive: "run" inside "brunch".
        assert_eq!(
            post_process("We had brunch together today", "run"),
            Ok("We had brunch together today".to_string())
        );
    }

    #[test]
    fn blank_word_never_matches() {
        assert!(!contains_word("I like mornings a lot", ""));
        assert!(!contains_word("I like mornings a lot", "   "));
    }

    #[tokio::test]
    async fn valid_reply_becomes_sentence() {
        let outcome = invoker(MockTextGenerator::reply("  I run every morning  "))
            .invoke("run")
            .await;
        assert_eq!(
            outcome,
            InvocationOutcome::Sentence("I run every morning".to_string())
        );
    }

    #[tokio::test]
    async fn backend_error_becomes_failed() {
        let outcome = invoker(MockTextGenerator::failing("model crashed"))
            .invoke("run")
            .await;
        assert!(matches!(outcome, InvocationOutcome::Failed(_)));
        assert_eq!(outcome.sentence(), None);
    }

    #[tokio::test]
    async fn no_sequences_is_no_output() {
        let outcome = invoker(MockTextGenerator::empty()).invoke("run").await;
        assert_eq!(outcome, InvocationOutcome::Rejected(Rejection::NoOutput));
    }

    #[tokio::test]
    async fn echo_backend_keeps_word_in_first_tokens() {
        let outcome = invoker(MockTextGenerator::echo()).invoke("xyzzy").await;
        let sentence = outcome.sentence().unwrap();
        assert!(sentence.contains("xyzzy"));
        assert!(sentence.split_whitespace().count() <= MAX_SENTENCE_TOKENS);
    }

    #[tokio::test]
    async fn punctuation_and_unicode_words_do_not_panic() {
        for word in ["", "!!!", "naïve café", "日本語", "'; DROP TABLE"] {
            let _ = invoker(MockTextGenerator::echo()).invoke(word).await;
        }
    }
}
