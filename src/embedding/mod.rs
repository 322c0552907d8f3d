//! Embedding generation and reranking via the Voyage API.
//!
//! The client batches inputs dynamically using a local token estimate,
//! gates every network call through the shared [`crate::limiter::RateLimiter`],
//! and retries transient failures with exponential backoff. Token
//! estimation is an approximation used only for batching and rate-limit
//! accounting; it does not need to match provider tokenization.

pub mod voyage;

pub use voyage::VoyageClient;

use crate::text::is_cjk;

/// Estimated chars per token for CJK text.
pub const CJK_CHARS_PER_TOKEN: f64 = 1.5;

/// Estimated chars per token for everything else.
pub const OTHER_CHARS_PER_TOKEN: f64 = 2.5;

/// Token budget per embedding batch: half the provider's 120k ceiling,
/// leaving slack for estimate drift.
pub const BATCH_TOKEN_BUDGET: u64 = 60_000;

/// Maximum retry attempts for transient upstream failures.
pub const MAX_ATTEMPTS: u32 = 3;

/// Estimates the token count of a text.
///
/// CJK characters are counted at [`CJK_CHARS_PER_TOKEN`] chars/token,
/// all other characters at [`OTHER_CHARS_PER_TOKEN`].
///
/// # Examples
///
/// ```
/// use docdex::embedding::estimate_tokens;
///
/// assert_eq!(estimate_tokens("hello"), 2); // 5 / 2.5
/// assert_eq!(estimate_tokens("条件格式"), 3); // ceil(4 / 1.5)
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn estimate_tokens(text: &str) -> u64 {
    let mut cjk = 0usize;
    let mut other = 0usize;
    for c in text.chars() {
        if is_cjk(c) {
            cjk += 1;
        } else {
            other += 1;
        }
    }
    ((cjk as f64 / CJK_CHARS_PER_TOKEN) + (other as f64 / OTHER_CHARS_PER_TOKEN)).ceil() as u64
}

/// Splits `texts` into contiguous batches.
///
/// A batch closes when the accumulated estimate would exceed
/// `token_budget` or when it reaches `max_inputs`. A single input whose
/// estimate exceeds the budget is sent alone.
#[must_use]
pub fn plan_batches(
    texts: &[String],
    max_inputs: usize,
    token_budget: u64,
) -> Vec<std::ops::Range<usize>> {
    let mut batches = Vec::new();
    let mut start = 0usize;
    let mut batch_tokens = 0u64;

    for (i, text) in texts.iter().enumerate() {
        let tokens = estimate_tokens(text);
        let len = i - start;
        if len > 0 && (batch_tokens + tokens > token_budget || len >= max_inputs) {
            batches.push(start..i);
            start = i;
            batch_tokens = 0;
        }
        batch_tokens += tokens;
    }
    if start < texts.len() {
        batches.push(start..texts.len());
    }
    batches
}
