//! Persisted user settings.
//!
//! [`SettingsStore`] holds the turn defaults and the MCP server registry.  On load it reconciles
//! the stored snapshot with the compiled-in defaults (see [`reconcile_snapshot`]), and every
//! mutation writes the whole state back through its [`SettingsStorage`].  Storage failures are
//! logged and counted; the in-memory state stays authoritative.
//!
//! A stored snapshot is never overwritten with less than it held unless a copy of it was first
//! written under [`SETTINGS_BACKUP_KEY`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::observability::{SETTINGS_LOAD_ERRORS, SETTINGS_SAVES, SETTINGS_SAVE_ERRORS};
use crate::types::{
    GeneralSettings, McpServerMetadata, McpServerSettings, McpSettings, PlanningLimits, ReportStyle,
    SettingsState, TurnFlags,
};
use crate::utils::time::now_millis;

pub mod defaults;
pub mod merge;
pub mod storage;

pub use defaults::{
    SETTINGS_BACKUP_KEY, SETTINGS_KEY, TOOL_AGENTS, default_mcp_servers, default_settings,
};
pub use merge::{Reconciled, merge_snapshot, reconcile_snapshot};
pub use storage::{FileStorage, MemoryStorage, SettingsStorage};

/// A settings store shared between the session controller and a front end.
pub type SharedSettings = Arc<Mutex<SettingsStore>>;

/// The settings a new turn starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnDefaults {
    /// The general settings at the time of the request.
    pub general: GeneralSettings,
    /// The enabled MCP servers, or `None` when no server is enabled.
    pub mcp_settings: Option<McpSettings>,
}

impl TurnDefaults {
    /// Planner limits for the request.
    pub fn planning_limits(&self) -> PlanningLimits {
        PlanningLimits {
            max_plan_iterations: self.general.max_plan_iterations,
            max_step_num: self.general.max_step_num,
            max_search_results: Some(self.general.max_search_results),
        }
    }

    /// Behavioral switches for the request.
    pub fn flags(&self) -> TurnFlags {
        TurnFlags {
            auto_accepted_plan: self.general.auto_accepted_plan,
            enable_deep_thinking: self.general.enable_deep_thinking,
            enable_background_investigation: self.general.enable_background_investigation,
        }
    }
}

/// User settings backed by a [`SettingsStorage`].
pub struct SettingsStore {
    storage: Arc<dyn SettingsStorage>,
    state: SettingsState,
    defaults: SettingsState,
}

impl SettingsStore {
    /// Load settings from `storage`, reconciled with [`default_settings`].
    ///
    /// Never fails.  Values the stored snapshot lacks or that cannot be read take their defaults;
    /// when anything was lost the raw snapshot is copied to [`SETTINGS_BACKUP_KEY`] before the
    /// merged state is written back.  If storage cannot be read, or the backup cannot be written,
    /// the stored snapshot is left untouched.
    pub fn load(storage: Arc<dyn SettingsStorage>) -> Self {
        Self::load_with_defaults(storage, default_settings(now_millis()))
    }

    /// Load settings from `storage`, reconciled with `defaults`.
    pub fn load_with_defaults(storage: Arc<dyn SettingsStorage>, defaults: SettingsState) -> Self {
        let (state, persist) = match storage.read(SETTINGS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw)
                .map_err(Error::from)
                .and_then(|snapshot| reconcile_snapshot(snapshot, &defaults))
            {
                Ok(Reconciled { state, discarded: 0 }) => (state, Persist::Overwrite),
                Ok(Reconciled { state, discarded }) => {
                    SETTINGS_LOAD_ERRORS.click();
                    tracing::warn!(discarded, "some stored settings could not be read");
                    (state, Persist::AfterBackup(raw))
                }
                Err(err) => {
                    SETTINGS_LOAD_ERRORS.click();
                    tracing::warn!(error = %err, "stored settings are corrupt, using defaults");
                    (defaults.clone(), Persist::AfterBackup(raw))
                }
            },
            Ok(None) => (defaults.clone(), Persist::Overwrite),
            Err(err) => {
                SETTINGS_LOAD_ERRORS.click();
                tracing::warn!(error = %err, "failed to read stored settings, using defaults");
                (defaults.clone(), Persist::Keep)
            }
        };
        let store = Self {
            storage,
            state,
            defaults,
        };
        match persist {
            Persist::Overwrite => store.save(),
            Persist::AfterBackup(raw) => match store.storage.write(SETTINGS_BACKUP_KEY, &raw) {
                Ok(()) => {
                    tracing::info!(key = SETTINGS_BACKUP_KEY, "backed up stored settings");
                    store.save();
                }
                Err(err) => {
                    SETTINGS_SAVE_ERRORS.click();
                    tracing::warn!(
                        error = %err,
                        "failed to back up stored settings, leaving them in place"
                    );
                }
            },
            Persist::Keep => {}
        }
        store
    }

    /// Wrap the store for sharing.
    pub fn shared(self) -> SharedSettings {
        Arc::new(Mutex::new(self))
    }

    /// Write the current state to storage.
    pub fn save(&self) {
        let result = serde_json::to_string_pretty(&self.state)
            .map_err(Error::from)
            .and_then(|json| self.storage.write(SETTINGS_KEY, &json));
        match result {
            Ok(()) => SETTINGS_SAVES.click(),
            Err(err) => {
                SETTINGS_SAVE_ERRORS.click();
                tracing::warn!(error = %err, "failed to save settings");
            }
        }
    }

    pub fn state(&self) -> &SettingsState {
        &self.state
    }

    pub fn general(&self) -> &GeneralSettings {
        &self.state.general
    }

    pub fn servers(&self) -> &[McpServerMetadata] {
        &self.state.mcp.servers
    }

    pub fn server(&self, name: &str) -> Option<&McpServerMetadata> {
        self.state.mcp.servers.iter().find(|server| server.name == name)
    }

    /// Whether `name` is one of the built-in servers, which can be toggled but not removed.
    pub fn is_default_server(&self, name: &str) -> bool {
        self.defaults.mcp.servers.iter().any(|server| server.name == name)
    }

    fn update_general(&mut self, update: impl FnOnce(&mut GeneralSettings)) {
        update(&mut self.state.general);
        self.save();
    }

    pub fn set_report_style(&mut self, report_style: ReportStyle) {
        self.update_general(|general| general.report_style = report_style);
    }

    pub fn set_enable_deep_thinking(&mut self, enabled: bool) {
        self.update_general(|general| general.enable_deep_thinking = enabled);
    }

    pub fn set_enable_background_investigation(&mut self, enabled: bool) {
        self.update_general(|general| general.enable_background_investigation = enabled);
    }

    pub fn set_auto_accepted_plan(&mut self, enabled: bool) {
        self.update_general(|general| general.auto_accepted_plan = enabled);
    }

    pub fn set_max_plan_iterations(&mut self, value: u32) {
        self.update_general(|general| general.max_plan_iterations = value);
    }

    pub fn set_max_step_num(&mut self, value: u32) {
        self.update_general(|general| general.max_step_num = value);
    }

    pub fn set_max_search_results(&mut self, value: u32) {
        self.update_general(|general| general.max_search_results = value);
    }

    /// Replace the whole state.
    pub fn replace(&mut self, state: SettingsState) {
        self.state = state;
        self.save();
    }

    /// Append a server to the registry.
    ///
    /// Fails with [`Error::Validation`] if a server with the same name exists.
    pub fn add_mcp_server(&mut self, server: McpServerMetadata) -> Result<()> {
        if self.server(&server.name).is_some() {
            return Err(Error::validation(
                format!("MCP server {:?} already exists", server.name),
                Some("name".to_string()),
            ));
        }
        self.state.mcp.servers.push(server);
        self.save();
        Ok(())
    }

    /// Remove a user-added server and return it.
    pub fn remove_mcp_server(&mut self, name: &str) -> Result<McpServerMetadata> {
        if self.is_default_server(name) {
            return Err(Error::validation(
                format!("MCP server {name:?} is built in and can only be disabled"),
                Some("name".to_string()),
            ));
        }
        let Some(index) = self.state.mcp.servers.iter().position(|s| s.name == name) else {
            return Err(Error::validation(
                format!("no MCP server named {name:?}"),
                Some("name".to_string()),
            ));
        };
        let removed = self.state.mcp.servers.remove(index);
        self.save();
        Ok(removed)
    }

    /// Enable or disable a server, stamping `updatedAt`.
    pub fn set_mcp_server_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        let Some(server) = self.state.mcp.servers.iter_mut().find(|s| s.name == name) else {
            return Err(Error::not_found(
                format!("no MCP server named {name:?}"),
                Some("mcp_server".to_string()),
                Some(name.to_string()),
            ));
        };
        server.enabled = enabled;
        server.updated_at = now_millis();
        self.save();
        Ok(())
    }

    /// The settings a new turn starts from.
    pub fn turn_defaults(&self) -> TurnDefaults {
        let servers: BTreeMap<String, McpServerSettings> = self
            .state
            .mcp
            .servers
            .iter()
            .filter(|server| server.enabled)
            .map(|server| {
                let settings = McpServerSettings {
                    name: server.name.clone(),
                    connection: server.connection.clone(),
                    env: server.env.clone(),
                    enabled_tools: server.tool_names(),
                    add_to_agents: TOOL_AGENTS.iter().map(|agent| agent.to_string()).collect(),
                };
                (server.name.clone(), settings)
            })
            .collect();
        TurnDefaults {
            general: self.state.general.clone(),
            mcp_settings: if servers.is_empty() {
                None
            } else {
                Some(McpSettings { servers })
            },
        }
    }
}

/// What loading may do with the stored snapshot.
enum Persist {
    Overwrite,
    AfterBackup(String),
    Keep,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::McpConnection;
    use serde_json::json;
    use std::io;
    use time::OffsetDateTime;

    fn defaults() -> SettingsState {
        default_settings(OffsetDateTime::UNIX_EPOCH)
    }

    fn load(storage: &Arc<MemoryStorage>) -> SettingsStore {
        SettingsStore::load_with_defaults(storage.clone(), defaults())
    }

    fn stored(storage: &MemoryStorage) -> Value {
        let raw = storage.read(SETTINGS_KEY).unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn first_load_persists_defaults() {
        let storage = Arc::new(MemoryStorage::new());
        let store = load(&storage);
        assert_eq!(store.state(), &defaults());
        assert_eq!(stored(&storage), serde_json::to_value(defaults()).unwrap());
    }

    #[test]
    fn load_backfills_and_persists() {
        let storage = Arc::new(MemoryStorage::with_value(
            SETTINGS_KEY,
            json!({"general": {"maxStepNum": 7, "reportStyle": "social_media"}}).to_string(),
        ));
        let store = load(&storage);
        assert_eq!(store.general().max_step_num, 7);
        assert_eq!(store.general().max_search_results, 3);
        assert_eq!(store.general().report_style, ReportStyle::SocialMedia);
        assert_eq!(stored(&storage)["general"]["maxSearchResults"], 3);
        assert_eq!(stored(&storage)["mcp"]["servers"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn corrupt_snapshot_is_backed_up_then_replaced() {
        let storage = Arc::new(MemoryStorage::with_value(SETTINGS_KEY, "{not json"));
        let store = load(&storage);
        assert_eq!(store.state(), &defaults());
        assert_eq!(stored(&storage), serde_json::to_value(defaults()).unwrap());
        assert_eq!(
            storage.read(SETTINGS_BACKUP_KEY).unwrap().as_deref(),
            Some("{not json")
        );
    }

    #[test]
    fn newer_snapshot_keeps_what_it_can() {
        let mut web_search = serde_json::to_value(&defaults().mcp.servers[0]).unwrap();
        web_search["enabled"] = json!(false);
        let raw = json!({
            "general": {"maxStepNum": 9, "reportStyle": "strategic_investment"},
            "mcp": {"servers": [
                web_search,
                {
                    "name": "Mine",
                    "transport": "stdio",
                    "command": "uvx",
                    "enabled": true,
                    "createdAt": 5,
                    "updatedAt": 5
                },
                {
                    "name": "New",
                    "transport": "streamable_http",
                    "url": "https://mcp.example.com/mcp",
                    "enabled": true,
                    "createdAt": 6,
                    "updatedAt": 6
                }
            ]}
        })
        .to_string();
        let storage = Arc::new(MemoryStorage::with_value(SETTINGS_KEY, raw.clone()));
        let store = load(&storage);

        assert_eq!(store.general().max_step_num, 9);
        assert_eq!(store.general().report_style, ReportStyle::Academic);
        assert!(!store.server("Web Search").unwrap().enabled);
        assert!(store.server("Mine").unwrap().enabled);
        assert!(store.server("New").is_none());

        assert_eq!(stored(&storage)["general"]["maxStepNum"], 9);
        assert_eq!(storage.read(SETTINGS_BACKUP_KEY).unwrap(), Some(raw));
    }

    #[test]
    fn clean_load_writes_no_backup() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = load(&storage);
        store.set_max_step_num(4);
        drop(store);
        load(&storage);
        assert_eq!(storage.read(SETTINGS_BACKUP_KEY).unwrap(), None);
    }

    /// Storage whose reads or backup writes fail.
    struct Flaky {
        inner: MemoryStorage,
        fail_reads: bool,
    }

    impl SettingsStorage for Flaky {
        fn read(&self, key: &str) -> Result<Option<String>> {
            if self.fail_reads {
                return Err(Error::io("disk unavailable", io::Error::other("unavailable")));
            }
            self.inner.read(key)
        }

        fn write(&self, key: &str, value: &str) -> Result<()> {
            if key == SETTINGS_BACKUP_KEY {
                return Err(Error::io("disk full", io::Error::other("full")));
            }
            self.inner.write(key, value)
        }
    }

    #[test]
    fn unreadable_storage_is_not_overwritten() {
        let storage = Arc::new(Flaky {
            inner: MemoryStorage::with_value(SETTINGS_KEY, "{\"general\": {}}"),
            fail_reads: true,
        });
        let store = SettingsStore::load_with_defaults(storage.clone(), defaults());
        assert_eq!(store.state(), &defaults());
        assert_eq!(
            storage.inner.read(SETTINGS_KEY).unwrap().as_deref(),
            Some("{\"general\": {}}")
        );
    }

    #[test]
    fn failed_backup_leaves_snapshot_in_place() {
        let storage = Arc::new(Flaky {
            inner: MemoryStorage::with_value(SETTINGS_KEY, "[]"),
            fail_reads: false,
        });
        let store = SettingsStore::load_with_defaults(storage.clone(), defaults());
        assert_eq!(store.state(), &defaults());
        assert_eq!(storage.inner.read(SETTINGS_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn disabled_web_search_survives_reload() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = load(&storage);
        store.set_mcp_server_enabled("Web Search", false).unwrap();
        drop(store);

        let store = load(&storage);
        let matching: Vec<_> = store
            .servers()
            .iter()
            .filter(|s| s.name == "Web Search")
            .collect();
        assert_eq!(matching.len(), 1);
        assert!(!matching[0].enabled);
    }

    #[test]
    fn mutators_persist() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = load(&storage);
        store.set_report_style(ReportStyle::PopularScience);
        store.set_enable_deep_thinking(true);
        store.set_enable_background_investigation(true);
        store.set_auto_accepted_plan(true);
        store.set_max_plan_iterations(2);
        store.set_max_step_num(6);
        store.set_max_search_results(10);

        let general = &stored(&storage)["general"];
        assert_eq!(general["reportStyle"], "popular_science");
        assert_eq!(general["enableDeepThinking"], true);
        assert_eq!(general["enableBackgroundInvestigation"], true);
        assert_eq!(general["autoAcceptedPlan"], true);
        assert_eq!(general["maxPlanIterations"], 2);
        assert_eq!(general["maxStepNum"], 6);
        assert_eq!(general["maxSearchResults"], 10);
    }

    #[test]
    fn toggling_stamps_update_time() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = load(&storage);
        store.set_mcp_server_enabled("Browser Automation", true).unwrap();
        let server = store.server("Browser Automation").unwrap();
        assert!(server.enabled);
        assert_eq!(server.name, "Browser Automation");
        assert!(server.updated_at > server.created_at);

        let err = store.set_mcp_server_enabled("Nope", true).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn add_and_remove_servers() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = load(&storage);
        let custom =
            McpServerMetadata::remote("Custom", "https://mcp.example.com/sse", now_millis());
        store.add_mcp_server(custom.clone()).unwrap();
        assert!(store.add_mcp_server(custom.clone()).unwrap_err().is_validation());
        assert_eq!(store.servers().len(), 4);

        assert!(store.remove_mcp_server("Filesystem").unwrap_err().is_validation());
        assert!(store.remove_mcp_server("Missing").unwrap_err().is_validation());
        assert_eq!(store.remove_mcp_server("Custom").unwrap(), custom);
        assert_eq!(stored(&storage)["mcp"]["servers"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn turn_defaults_include_enabled_servers_only() {
        let storage = Arc::new(MemoryStorage::new());
        let store = load(&storage);
        let turn = store.turn_defaults();
        let mcp = turn.mcp_settings.as_ref().unwrap();
        assert_eq!(
            mcp.servers.keys().collect::<Vec<_>>(),
            vec!["Filesystem", "Web Search"]
        );
        let web_search = &mcp.servers["Web Search"];
        assert_eq!(web_search.enabled_tools, vec!["tavily_search_results_json"]);
        assert_eq!(web_search.add_to_agents, vec!["researcher"]);
        assert!(matches!(web_search.connection, McpConnection::Stdio { .. }));
        assert_eq!(mcp.servers["Filesystem"].enabled_tools.len(), 6);
        assert_eq!(turn.planning_limits().max_search_results, Some(3));
        assert_eq!(turn.flags(), TurnFlags::default());
    }

    #[test]
    fn turn_defaults_omit_mcp_when_nothing_enabled() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = load(&storage);
        store.set_mcp_server_enabled("Web Search", false).unwrap();
        store.set_mcp_server_enabled("Filesystem", false).unwrap();
        assert_eq!(store.turn_defaults().mcp_settings, None);
    }

    #[test]
    fn file_backed_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8path::Path::try_from(tmp.path().to_path_buf()).unwrap();
        let storage: Arc<dyn SettingsStorage> = Arc::new(FileStorage::new(dir));
        let mut store = SettingsStore::load_with_defaults(storage.clone(), defaults());
        store.set_max_step_num(8);
        drop(store);
        let store = SettingsStore::load_with_defaults(storage, defaults());
        assert_eq!(store.general().max_step_num, 8);
    }
}
