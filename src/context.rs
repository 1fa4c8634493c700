//! Process-wide state, constructed explicitly.

use std::sync::Arc;

use crate::config_loader::{ConfigLoader, ConfigSource};
use crate::error::Result;
use crate::settings::{SettingsStorage, SettingsStore, SharedSettings};
use crate::types::RuntimeConfig;

/// The settings store and the runtime configuration of one application.
///
/// Settings are loaded when the context is created; the runtime configuration is loaded by
/// [`AppContext::init`].
#[derive(Debug)]
pub struct AppContext {
    settings: SharedSettings,
    config: ConfigLoader,
}

impl AppContext {
    /// Creates a context whose settings live in `storage`.
    pub fn new(storage: Arc<dyn SettingsStorage>) -> Self {
        Self::with_settings(SettingsStore::load(storage))
    }

    /// Creates a context around an already loaded store.
    pub fn with_settings(settings: SettingsStore) -> Self {
        Self {
            settings: settings.shared(),
            config: ConfigLoader::new(),
        }
    }

    /// Load the runtime configuration from `source`.  Later calls return the first result.
    pub async fn init(&self, source: &dyn ConfigSource) -> &RuntimeConfig {
        self.config.load(source).await
    }

    /// Whether [`AppContext::init`] has completed.
    pub fn is_initialized(&self) -> bool {
        self.config.is_initialized()
    }

    /// The shared settings store.
    pub fn settings(&self) -> SharedSettings {
        Arc::clone(&self.settings)
    }

    pub fn config_loader(&self) -> &ConfigLoader {
        &self.config
    }

    /// The runtime configuration; fails with `NotLoaded` before [`AppContext::init`].
    pub fn config(&self) -> Result<&RuntimeConfig> {
        self.config.get()
    }
}
