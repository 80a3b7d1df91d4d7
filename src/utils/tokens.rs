use tiktoken_rs::{CoreBPE, cl100k_base};

/// Fast token estimation using heuristic (~4 chars per token for code)
pub fn estimate_tokens(text: &str) -> usize {
    let char_estimate = text.len() / 4;
    let word_estimate = text.split_whitespace().count();
    char_estimate.max(word_estimate)
}

/// Counts tokens with the `cl100k_base` encoding, falling back to the
/// estimate when the encoding cannot be loaded.
pub struct TokenCounter {
    bpe: Option<CoreBPE>,
}

impl TokenCounter {
    pub fn new() -> Self {
        match cl100k_base() {
            Ok(bpe) => Self { bpe: Some(bpe) },
            Err(e) => {
                tracing::warn!("tokenizer unavailable, estimating instead: {}", e);
                Self::estimating()
            }
        }
    }

    /// A counter that never loads the tokenizer.
    pub fn estimating() -> Self {
        Self { bpe: None }
    }

    pub fn count(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => estimate_tokens(text),
        }
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}
