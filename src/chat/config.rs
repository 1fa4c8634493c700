//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved configuration the
//! chat binary runs with.

use std::env;

use arrrg_derive::CommandLine;
use utf8path::Path;
use uuid::Uuid;

/// Directory, relative to the home directory, that holds the settings file.
const SETTINGS_DIR_NAME: &str = ".anaflow";

/// Command-line arguments for the anaflow-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the AnaFlow service.
    #[arrrg(optional, "Service base URL (default: $ANAFLOW_API_URL)", "URL")]
    pub base_url: Option<String>,

    /// Directory that holds the settings file.
    #[arrrg(optional, "Settings directory (default: ~/.anaflow)", "DIR")]
    pub settings_dir: Option<String>,

    /// Conversation to continue.
    #[arrrg(optional, "Thread id to continue (default: a new thread)", "ID")]
    pub thread_id: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Service base URL.  `None` defers to the client's environment lookup.
    pub base_url: Option<String>,

    /// Where settings are stored.
    pub settings_dir: Path<'static>,

    /// The conversation thread.
    pub thread_id: String,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Base URL: resolved by the client
    /// - Settings: `~/.anaflow`
    /// - Thread: a fresh time-ordered id
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            base_url: None,
            settings_dir: default_settings_dir(),
            thread_id: new_thread_id(),
            use_color: true,
        }
    }

    /// Sets the service base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the settings directory.
    pub fn with_settings_dir(mut self, dir: Path<'_>) -> Self {
        self.settings_dir = dir.into_owned();
        self
    }

    /// Sets the thread id.
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = thread_id.into();
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        ChatConfig {
            base_url: args.base_url,
            settings_dir: args
                .settings_dir
                .map(|dir| Path::from(dir.as_str()).into_owned())
                .unwrap_or_else(default_settings_dir),
            thread_id: args
                .thread_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(new_thread_id),
            use_color: !args.no_color,
        }
    }
}

/// `$HOME/.anaflow`, or `.anaflow` in the working directory without a home.
pub fn default_settings_dir() -> Path<'static> {
    match env::var("HOME") {
        Ok(home) if !home.is_empty() => Path::from(home.as_str())
            .join(SETTINGS_DIR_NAME)
            .into_owned(),
        _ => Path::from(SETTINGS_DIR_NAME).into_owned(),
    }
}

/// A new, time-ordered thread id.
pub fn new_thread_id() -> String {
    Uuid::now_v7().to_string()
}
