//! Mock backend for testing and offline development.

use super::{GeneratedSequence, GenerationParams, ProviderError, TextGenerator};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum MockBehavior {
    /// Echo the prompt back behind a fixed prefix.
    Echo,
    Reply(String),
    /// Succeed with zero sequences.
    Empty,
    Fail(String),
    Panic,
}

/// Scripted text generator.
pub struct MockTextGenerator {
    behavior: MockBehavior,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockTextGenerator {
    fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn echo() -> Self {
        Self::with_behavior(MockBehavior::Echo)
    }

    pub fn reply(text: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::Reply(text.into()))
    }

    pub fn empty() -> Self {
        Self::with_behavior(MockBehavior::Empty)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::Fail(message.into()))
    }

    /// Panics inside `generate`; exercises the orchestration failure path.
    pub fn panicking() -> Self {
        Self::with_behavior(MockBehavior::Panic)
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `generate` calls seen so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<Vec<GeneratedSequence>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            MockBehavior::Echo => Ok(vec![GeneratedSequence::new(format!(
                "Mock response for: {}",
                prompt
            ))]),
            MockBehavior::Reply(text) => Ok(vec![GeneratedSequence::new(text.clone())]),
            MockBehavior::Empty => Ok(Vec::new()),
            MockBehavior::Fail(message) => Err(ProviderError::ApiError(message.clone())),
            MockBehavior::Panic => panic!("mock generator panicked"),
        }
    }

    fn provider(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_prefixes_prompt() {
        let mock = MockTextGenerator::echo();
        let out = mock
            .generate("say hi", &GenerationParams::default())
            .await
            .unwrap();
        assert_eq!(out[0].generated_text, "Mock response for: say hi");
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn failing_counts_the_call() {
        let mock = MockTextGenerator::failing("boom");
        let err = mock
            .generate("p", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ApiError(m) if m == "boom"));
        assert_eq!(mock.calls(), 1);
    }
}
