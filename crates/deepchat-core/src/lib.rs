//! Business logic and port traits for DeepChat.
//!
//! This crate defines the entity store port (implemented in-memory here and
//! over SQLite in `deepchat-infra`), the conversation resolver that turns one
//! chat exchange into an entity graph mutation, and the bot binding registry
//! that decides which inference engine serves a request. It depends only on
//! `deepchat-types` -- never on `deepchat-infra` or any database/IO crate.

pub mod chat;
pub mod conversation;
pub mod engine;
pub mod store;
