// Public modules
pub mod chat;
pub mod client;
pub mod config_loader;
pub mod context;
pub mod error;
pub mod observability;
pub mod settings;
pub mod sse;
pub mod stream;
pub mod types;
pub mod utils;

// Re-exports
pub use chat::{SendOptions, SessionController, TurnId, TurnObserver, TurnOutcome};
pub use client::AnaFlow;
pub use config_loader::{ConfigLoader, ConfigSource};
pub use context::AppContext;
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use settings::{
    FileStorage, MemoryStorage, SettingsStorage, SettingsStore, SharedSettings, TurnDefaults,
};
pub use sse::{SseFrame, process_sse};
pub use stream::{ChatBackend, ChatStream};
pub use types::*;
