//! Token usage estimation for engines that don't report native counts.

/// Rough token estimate for engines whose wire protocol reports no
/// usage counters (TGI's `generated_text`, DeepSpeed, TensorRT-LLM).
///
/// `ceil(words * 4 / 3)` approximates the common subword-tokenizer
/// ratio closely enough for accounting purposes; it is never presented
/// as an exact count.
#[must_use]
pub fn estimate_tokens(text: &str) -> u32 {
    let words = text.split_whitespace().count();
    u32::try_from(words.saturating_mul(4).div_ceil(3)).unwrap_or(u32::MAX)
}
