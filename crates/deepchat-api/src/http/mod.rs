//! HTTP layer for DeepChat.
//!
//! Axum router with one chat endpoint per bot, per-client session state,
//! and JSON error bodies.

pub mod error;
pub mod handlers;
pub mod router;
pub mod session;
