//! Shared domain types for DeepChat.
//!
//! This crate contains the types used across the DeepChat workspace: the four
//! persisted entity kinds (User, Chatbot, Conversation, Turn), per-client
//! session state, the chat reply payload, configuration, and the error
//! taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod entity;
pub mod error;
pub mod session;
