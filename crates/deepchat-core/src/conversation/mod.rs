//! Recording chat exchanges into the conversation graph.
//!
//! The `ConversationResolver` maps one exchange (session state, chatbot name,
//! message pair) onto get-or-create of User, Chatbot and Conversation plus an
//! append-only Turn, committed as a single unit.

pub mod resolver;

pub use resolver::{new_session_marker, ConversationResolver};
