//! # gateway-usage
//!
//! Token accounting for the gateway: normalizes per-vendor usage reports
//! into a uniform [`types::TokenRecord`] and tracks the context-window
//! baseline across a session's turns.
//!
//! Billing and per-model pricing are explicitly out of scope — this crate
//! only tracks token counts, not cost.

#![deny(unsafe_code)]

pub mod normalization;
pub mod types;

pub use normalization::normalize_tokens;
pub use types::{ComputedTokens, TokenMeta, TokenRecord, TokenSource};
