use crate::constants::batching;

/// Token estimator for sizing classification batches
///
/// The model's own tokenizer is not available without a network round-trip,
/// so token cost is approximated as a fixed multiple of the character count.
#[derive(Debug, Clone, Copy)]
pub struct TokenEstimator {
    tokens_per_char: f64,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(batching::TOKENS_PER_CHAR)
    }
}

impl TokenEstimator {
    /// Create an estimator with a custom tokens-per-character ratio
    ///
    /// Negative or non-finite ratios are treated as zero.
    pub fn new(tokens_per_char: f64) -> Self {
        let tokens_per_char = if tokens_per_char.is_finite() && tokens_per_char > 0.0 {
            tokens_per_char
        } else {
            0.0
        };
        Self { tokens_per_char }
    }

    pub fn tokens_per_char(&self) -> f64 {
        self.tokens_per_char
    }

    /// Estimate the token cost of one response
    ///
    /// Counts Unicode scalar values rather than bytes: Arabic text is two
    /// bytes per character in UTF-8 and would otherwise be overcounted.
    pub fn estimate(&self, text: &str) -> f64 {
        text.chars().count() as f64 * self.tokens_per_char
    }

    /// Estimate a response that may be missing (missing counts as empty)
    pub fn estimate_optional(&self, text: Option<&str>) -> f64 {
        text.map(|t| self.estimate(t)).unwrap_or(0.0)
    }

    /// Total estimated tokens for a window of responses
    pub fn estimate_window(&self, texts: &[String]) -> f64 {
        texts.iter().map(|t| self.estimate(t)).sum()
    }

    /// Mean estimated tokens per response (0.0 for an empty slice)
    pub fn average(&self, texts: &[String]) -> f64 {
        if texts.is_empty() {
            return 0.0;
        }
        self.estimate_window(texts) / texts.len() as f64
    }
}
