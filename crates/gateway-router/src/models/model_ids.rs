//! # Model ID Constants
//!
//! Client-facing model aliases and the per-vendor wire IDs they resolve to.
//! Centralized here so the alias table in [`crate::router`] reads as a flat
//! list of `(alias, anthropic_wire_id, vertex_wire_id)` rows instead of
//! string literals scattered through the resolution logic.

// ─────────────────────────────────────────────────────────────────────────────
// Client-facing aliases
// ─────────────────────────────────────────────────────────────────────────────

/// Claude Sonnet 4.5 alias, as accepted in request bodies.
pub const ALIAS_SONNET_4_5: &str = "claude-sonnet-4.5";
/// Claude Opus 4.5 alias.
pub const ALIAS_OPUS_4_5: &str = "claude-opus-4-5";
/// Claude Haiku 4.5 alias.
pub const ALIAS_HAIKU_4_5: &str = "claude-haiku-4-5";
/// Gemini 2.5 Pro alias.
pub const ALIAS_GEMINI_2_5_PRO: &str = "gemini-2.5-pro";
/// Gemini 2.5 Flash alias.
pub const ALIAS_GEMINI_2_5_FLASH: &str = "gemini-2.5-flash";
/// Generic GPT-4 alias routed to Warp.
pub const ALIAS_GPT_4: &str = "gpt-4";

// ─────────────────────────────────────────────────────────────────────────────
// Anthropic-direct wire IDs
// ─────────────────────────────────────────────────────────────────────────────

/// Wire ID for Opus 4.5 against `api.anthropic.com`.
pub const ANTHROPIC_OPUS_4_5: &str = "claude-opus-4-5-20251101";
/// Wire ID for Sonnet 4.5 against `api.anthropic.com`.
pub const ANTHROPIC_SONNET_4_5: &str = "claude-sonnet-4-5-20250929";
/// Wire ID for Haiku 4.5 against `api.anthropic.com`.
pub const ANTHROPIC_HAIKU_4_5: &str = "claude-haiku-4-5-20251001";
/// Default Anthropic-direct model when the request's alias is unrecognized.
pub const ANTHROPIC_DEFAULT: &str = ANTHROPIC_SONNET_4_5;

// ─────────────────────────────────────────────────────────────────────────────
// Vertex (Claude-on-Vertex / Gemini) wire IDs
// ─────────────────────────────────────────────────────────────────────────────

/// Wire ID for Opus 4.5 on Vertex (`publishers/anthropic/models/...`).
pub const VERTEX_OPUS_4_5: &str = "claude-opus-4-5@20251101";
/// Wire ID for Gemini 2.5 Pro on Vertex.
pub const VERTEX_GEMINI_2_5_PRO: &str = "gemini-2.5-pro";
/// Wire ID for Gemini 2.5 Flash on Vertex.
pub const VERTEX_GEMINI_2_5_FLASH: &str = "gemini-2.5-flash";
/// Default Vertex model when no alias matches and the request isn't Gemini-shaped.
pub const VERTEX_DEFAULT: &str = VERTEX_OPUS_4_5;
/// Default Gemini model on Vertex when the request's alias is unrecognized.
pub const VERTEX_GEMINI_DEFAULT: &str = VERTEX_GEMINI_2_5_FLASH;

// ─────────────────────────────────────────────────────────────────────────────
// Warp wire IDs
// ─────────────────────────────────────────────────────────────────────────────

/// Wire ID Warp uses for its GPT-4-family default.
pub const WARP_GPT_4_1: &str = "gpt-4.1";
/// Default Warp model when nothing in the alias or fuzzy match applies.
pub const WARP_DEFAULT: &str = WARP_GPT_4_1;
