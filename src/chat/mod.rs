//! Interactive chat with the AnaFlow service.
//!
//! This module provides the session controller that drives chat turns, plus the pieces of the
//! `anaflow-chat` REPL built on top of it:
//!
//! - [`session`]: turn bookkeeping, cancellation and interrupt feedback
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: slash command parsing
//! - [`render`]: terminal output for turn events

mod commands;
mod config;
mod render;
mod session;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, default_settings_dir, new_thread_id};
pub use render::PlainTextObserver;
pub use session::{NoopObserver, SendOptions, SessionController, TurnId, TurnObserver, TurnOutcome};
