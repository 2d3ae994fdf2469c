// Embeddings module
// OpenAI-compatible provider client plus the shared retry policy

pub mod openai;
pub mod retry;

pub use openai::{Embedding, OpenAiClient};
pub use retry::{AttemptError, RetryPolicy, execute_with_retry};

/// Rough token estimate at ~4 characters per token, minimum 1 for non-empty
/// text. Used for per-field statistics; billing totals come from the
/// provider's usage response.
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        (text.len() / 4).max(1)
    }
}
