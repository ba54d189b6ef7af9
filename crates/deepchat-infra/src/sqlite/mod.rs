//! SQLite storage layer.
//!
//! Entity store backed by SQLite with WAL mode and split read/write
//! connection pools.

pub mod entity;
pub mod pool;
