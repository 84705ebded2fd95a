//! # Models
//!
//! Client-facing model alias constants and per-vendor wire IDs. Resolution
//! logic (which vendor, which wire ID) lives in [`crate::router`]; this
//! module is just the constant table it reads from.

pub mod model_ids;

pub use model_ids::*;
