//! Token accounting types shared by [`crate::normalization`].

use gateway_core::messages::ProviderType;
use serde::{Deserialize, Serialize};

/// Raw token counts as reported by one adapter for one turn.
///
/// Every adapter normalizes its vendor's usage payload into this shape
/// before handing it to the Router, so the fields here already match the
/// canonical `input_tokens`/`cache_read_input_tokens`/
/// `cache_creation_input_tokens`/`output_tokens` split regardless of vendor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenSource {
    pub provider: ProviderType,
    pub timestamp: String,
    pub raw_input_tokens: u64,
    pub raw_output_tokens: u64,
    pub raw_cache_read_tokens: u64,
    pub raw_cache_creation_tokens: u64,
}

/// Bookkeeping metadata attached to a normalized record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenMeta {
    pub turn: u64,
    pub session_id: String,
    pub extracted_at: String,
    pub normalized_at: String,
}

/// Derived context-window figures for one turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComputedTokens {
    /// Total tokens resident in context this turn (input + cache read + cache write).
    pub context_window_tokens: u64,
    /// New tokens added since the previous turn's baseline (0 if the window shrank).
    pub new_input_tokens: u64,
    /// The previous turn's `context_window_tokens`, for delta calculation.
    pub previous_context_baseline: u64,
}

/// One normalized, immutable token accounting record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub source: TokenSource,
    pub computed: ComputedTokens,
    pub meta: TokenMeta,
}
