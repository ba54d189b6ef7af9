//! CLI command definitions for the `deepchat` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chat;
pub mod history;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Chat with frozen models and inspect recorded conversations.
#[derive(Parser)]
#[command(name = "deepchat", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to `config.toml` in the data directory).
    #[arg(long, global = true, env = "DEEPCHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Detailed output (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP chat server.
    Serve {
        /// Address to listen on (overrides `bind_addr`).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Send one message to a bot and record the exchange.
    Chat {
        /// Data name of the bot (e.g. cornell).
        data_name: String,

        /// Message to send.
        message: String,

        /// User name to record the exchange under.
        #[arg(long)]
        user: Option<String>,

        /// Continue the conversation started at this marker.
        #[arg(long = "session-start")]
        session_start: Option<String>,
    },

    /// List recorded entities (users, chatbots, conversations).
    #[command(alias = "ls")]
    List {
        /// Entity kind.
        kind: String,
    },

    /// Show the turns of one conversation.
    Show {
        /// Conversation id.
        conversation_id: String,
    },
}
