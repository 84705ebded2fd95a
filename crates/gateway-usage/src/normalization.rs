//! Token normalization — context window tracking across turns.
//!
//! Every adapter reports usage in the canonical
//! `input_tokens`/`cache_read_input_tokens`/`cache_creation_input_tokens`/
//! `output_tokens` shape (see `gateway_core::messages::TokenUsage`), so this
//! module no longer needs to branch on vendor — it just tracks the
//! context-window baseline across turns and computes the per-turn delta.

use crate::types::{ComputedTokens, TokenMeta, TokenRecord, TokenSource};

/// Normalize raw token data into a [`TokenRecord`].
///
/// Takes the raw data, the previous context window baseline (from the
/// prior turn), and metadata. Returns an immutable record with computed
/// context window size and per-turn delta.
pub fn normalize_tokens(source: TokenSource, previous_baseline: u64, meta: TokenMeta) -> TokenRecord {
    let context_window_tokens =
        source.raw_input_tokens + source.raw_cache_read_tokens + source.raw_cache_creation_tokens;
    let new_input_tokens = compute_new_input_tokens(context_window_tokens, previous_baseline);

    let computed = ComputedTokens {
        context_window_tokens,
        new_input_tokens,
        previous_context_baseline: previous_baseline,
    };

    let mut meta = meta;
    meta.normalized_at = chrono::Utc::now().to_rfc3339();

    TokenRecord { source, computed, meta }
}

/// Compute per-turn delta (new tokens added this turn).
fn compute_new_input_tokens(context_window_tokens: u64, previous_baseline: u64) -> u64 {
    if previous_baseline == 0 {
        return context_window_tokens;
    }
    if context_window_tokens < previous_baseline {
        // Context shrank (compaction, truncation, cache eviction).
        return 0;
    }
    context_window_tokens - previous_baseline
}
