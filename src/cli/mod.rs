//! CLI module for terminal-relay
//!
//! - `serve`: run the relay server
//! - `chat`: interactive chat window against a running relay

pub mod chat;
pub mod serve;

use clap::{Parser, Subcommand};

/// Streaming chat relay for OpenAI and Anthropic
#[derive(Parser)]
#[command(name = "terminal-relay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the relay server
    Serve,

    /// Chat with a running relay from this terminal
    Chat(chat::ChatArgs),
}
