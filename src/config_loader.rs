//! Runtime configuration, loaded once.
//!
//! The loader fetches [`RuntimeConfig`] from a [`ConfigSource`] the first time
//! [`ConfigLoader::load`] runs and serves every later read from its cache.  A failed fetch is not
//! an error for the caller: the loader warns and stores [`RuntimeConfig::fallback`].

use tokio::sync::OnceCell;

use crate::error::{Error, Result};
use crate::observability::{CONFIG_FALLBACKS, CONFIG_FETCHES};
use crate::types::RuntimeConfig;

/// Where runtime configuration comes from.
#[async_trait::async_trait]
pub trait ConfigSource: Send + Sync {
    /// Fetch the configuration.
    async fn fetch_config(&self) -> Result<RuntimeConfig>;
}

/// Init-once holder for the runtime configuration.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: OnceCell<RuntimeConfig>,
}

impl ConfigLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the configuration from `source` unless it is already loaded.
    ///
    /// Concurrent callers share one fetch.  Never fails.
    pub async fn load(&self, source: &dyn ConfigSource) -> &RuntimeConfig {
        self.config
            .get_or_init(|| async {
                CONFIG_FETCHES.click();
                match source.fetch_config().await {
                    Ok(config) => config,
                    Err(err) => {
                        CONFIG_FALLBACKS.click();
                        tracing::warn!(
                            error = %err,
                            "failed to load config from API, using default configuration"
                        );
                        RuntimeConfig::fallback()
                    }
                }
            })
            .await
    }

    /// The loaded configuration.
    ///
    /// Returns [`Error::NotLoaded`] until [`ConfigLoader::load`] has completed.
    pub fn get(&self) -> Result<&RuntimeConfig> {
        self.config
            .get()
            .ok_or_else(|| Error::not_loaded("runtime config"))
    }

    /// Whether the configuration has been loaded.
    pub fn is_initialized(&self) -> bool {
        self.config.initialized()
    }
}
