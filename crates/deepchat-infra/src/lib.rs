//! Infrastructure layer for DeepChat.
//!
//! Contains implementations of the ports defined in `deepchat-core`: the
//! SQLite entity store, the frozen model loader with its HTTP engine, and the
//! configuration loader for the data directory.

pub mod config;
pub mod engine;
pub mod sqlite;
pub mod store;
