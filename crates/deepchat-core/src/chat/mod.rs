//! Chat exchange orchestration.
//!
//! `ChatService` ties the bot binding registry (which engine answers) to the
//! conversation resolver (where the exchange is recorded).

pub mod service;

pub use service::{ChatService, ExchangeOutcome};
