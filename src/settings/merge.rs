//! Reconciling a persisted snapshot with the compiled-in defaults.
//!
//! The snapshot may have been written by an older or newer version of this crate, so it is
//! checked one setting and one server at a time.  A value this version cannot read costs only
//! that value.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::types::{GeneralSettings, McpRegistry, McpServerMetadata, SettingsState};

/// The result of [`reconcile_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// The merged state.
    pub state: SettingsState,
    /// How many stored values could not be read and were replaced or dropped.
    pub discarded: usize,
}

/// Merge a persisted snapshot with `defaults`.
///
/// See [`reconcile_snapshot`]; this drops the count of discarded values.
pub fn merge_snapshot(snapshot: Value, defaults: &SettingsState) -> Result<SettingsState> {
    reconcile_snapshot(snapshot, defaults).map(|reconciled| reconciled.state)
}

/// Merge a persisted snapshot with `defaults`.
///
/// * Each `general` key that is missing, `null` or unreadable takes its default value; readable
///   keys are kept as stored.
/// * A missing `mcp` block becomes an empty registry.
/// * Each stored server is read on its own; unreadable ones are dropped.
/// * Servers repeating an earlier name are dropped.
/// * Default servers whose names are absent from the snapshot are prepended, in default order.
///   Stored servers keep their position and values, including a disabled default server.
///
/// Fails only when the snapshot is not a JSON object.  Merging an already merged snapshot with
/// the same defaults returns it unchanged.
pub fn reconcile_snapshot(snapshot: Value, defaults: &SettingsState) -> Result<Reconciled> {
    let Value::Object(mut snapshot) = snapshot else {
        return Err(Error::validation("settings snapshot is not a JSON object", None));
    };
    let mut discarded = 0;

    let general = match snapshot.remove("general") {
        None | Some(Value::Null) => defaults.general.clone(),
        Some(Value::Object(stored)) => {
            let (general, rejected) = merge_general(stored, &defaults.general)?;
            discarded += rejected;
            general
        }
        Some(other) => {
            tracing::warn!(general = %other, "ignoring malformed general settings");
            discarded += 1;
            defaults.general.clone()
        }
    };

    let stored = match snapshot.remove("mcp") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(mut mcp)) => match mcp.remove("servers") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(servers)) => servers,
            Some(other) => {
                tracing::warn!(servers = %other, "ignoring malformed MCP server list");
                discarded += 1;
                Vec::new()
            }
        },
        Some(other) => {
            tracing::warn!(mcp = %other, "ignoring malformed MCP settings");
            discarded += 1;
            Vec::new()
        }
    };

    let mut seen = HashSet::new();
    let mut stored_unique = Vec::with_capacity(stored.len());
    for raw in stored {
        let name = raw.get("name").and_then(Value::as_str).map(str::to_string);
        let server = match serde_json::from_value::<McpServerMetadata>(raw) {
            Ok(server) => server,
            Err(err) => {
                tracing::warn!(
                    server = name.as_deref().unwrap_or("<unnamed>"),
                    error = %err,
                    "dropping unreadable MCP server from settings"
                );
                discarded += 1;
                continue;
            }
        };
        if !seen.insert(server.name.clone()) {
            tracing::warn!(server = %server.name, "dropping duplicate MCP server from settings");
            discarded += 1;
            continue;
        }
        stored_unique.push(server);
    }

    let mut servers = Vec::with_capacity(defaults.mcp.servers.len() + stored_unique.len());
    servers.extend(
        defaults
            .mcp
            .servers
            .iter()
            .filter(|server| !seen.contains(&server.name))
            .cloned(),
    );
    servers.extend(stored_unique);

    Ok(Reconciled {
        state: SettingsState {
            general,
            mcp: McpRegistry { servers },
        },
        discarded,
    })
}

/// Overlay each readable stored key onto the defaults, returning the result and the number of
/// stored keys that had to be replaced.
fn merge_general(
    stored: Map<String, Value>,
    defaults: &GeneralSettings,
) -> Result<(GeneralSettings, usize)> {
    let Value::Object(mut merged) = serde_json::to_value(defaults)? else {
        return Err(Error::validation("default settings are not an object", None));
    };
    let mut rejected = 0;
    for (key, value) in stored {
        if value.is_null() || !merged.contains_key(&key) {
            continue;
        }
        let mut candidate = merged.clone();
        candidate.insert(key.clone(), value.clone());
        match serde_json::from_value::<GeneralSettings>(Value::Object(candidate)) {
            Ok(_) => {
                merged.insert(key, value);
            }
            Err(err) => {
                tracing::warn!(setting = %key, error = %err, "ignoring unreadable setting");
                rejected += 1;
            }
        }
    }
    Ok((serde_json::from_value(Value::Object(merged))?, rejected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::defaults::default_settings;
    use crate::types::ReportStyle;
    use serde_json::json;
    use time::OffsetDateTime;

    fn defaults() -> SettingsState {
        default_settings(OffsetDateTime::UNIX_EPOCH)
    }

    fn names(state: &SettingsState) -> Vec<&str> {
        state.mcp.servers.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn empty_snapshot_is_defaults() {
        let merged = merge_snapshot(json!({}), &defaults()).unwrap();
        assert_eq!(merged, defaults());
    }

    #[test]
    fn backfills_missing_general_keys() {
        let snapshot = json!({
            "general": {
                "autoAcceptedPlan": true,
                "enableDeepThinking": false,
                "enableBackgroundInvestigation": false,
                "maxPlanIterations": 2,
                "maxStepNum": 5,
                "reportStyle": "news"
            },
            "mcp": {"servers": []}
        });
        let merged = merge_snapshot(snapshot, &defaults()).unwrap();
        assert_eq!(merged.general.max_search_results, 3);
        assert_eq!(merged.general.max_step_num, 5);
        assert_eq!(merged.general.max_plan_iterations, 2);
        assert!(merged.general.auto_accepted_plan);
        assert_eq!(merged.general.report_style, ReportStyle::News);
    }

    #[test]
    fn keeps_disabled_default_server() {
        let defaults = defaults();
        let mut web_search = serde_json::to_value(&defaults.mcp.servers[0]).unwrap();
        web_search["enabled"] = json!(false);
        let snapshot = json!({"general": {}, "mcp": {"servers": [web_search]}});
        let merged = merge_snapshot(snapshot, &defaults).unwrap();
        assert_eq!(names(&merged), vec!["Filesystem", "Browser Automation", "Web Search"]);
        let web_search = merged
            .mcp
            .servers
            .iter()
            .find(|s| s.name == "Web Search")
            .unwrap();
        assert!(!web_search.enabled);
    }

    #[test]
    fn prepends_defaults_before_user_servers() {
        let snapshot = json!({
            "general": {},
            "mcp": {"servers": [{
                "name": "Custom",
                "transport": "sse",
                "url": "https://mcp.example.com/sse",
                "enabled": true,
                "createdAt": 1,
                "updatedAt": 2
            }]}
        });
        let merged = merge_snapshot(snapshot, &defaults()).unwrap();
        assert_eq!(
            names(&merged),
            vec!["Web Search", "Filesystem", "Browser Automation", "Custom"]
        );
    }

    #[test]
    fn missing_mcp_block() {
        let merged = merge_snapshot(json!({"general": {"maxStepNum": 9}}), &defaults()).unwrap();
        assert_eq!(merged.general.max_step_num, 9);
        assert_eq!(merged.mcp, defaults().mcp);
    }

    #[test]
    fn drops_duplicate_names() {
        let defaults = defaults();
        let fs = serde_json::to_value(&defaults.mcp.servers[1]).unwrap();
        let mut fs_disabled = fs.clone();
        fs_disabled["enabled"] = json!(false);
        let snapshot = json!({"mcp": {"servers": [fs, fs_disabled]}});
        let merged = merge_snapshot(snapshot, &defaults).unwrap();
        assert_eq!(names(&merged), vec!["Web Search", "Browser Automation", "Filesystem"]);
        assert!(merged.mcp.servers[2].enabled);
    }

    #[test]
    fn merge_is_idempotent() {
        let defaults = defaults();
        let snapshot = json!({
            "general": {"maxPlanIterations": 4},
            "mcp": {"servers": [{
                "name": "Custom",
                "transport": "stdio",
                "command": "uvx",
                "args": ["custom-mcp"],
                "enabled": false,
                "createdAt": 10,
                "updatedAt": 10
            }]}
        });
        let once = merge_snapshot(snapshot, &defaults).unwrap();
        let twice = merge_snapshot(serde_json::to_value(&once).unwrap(), &defaults).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn rejects_non_objects() {
        assert!(merge_snapshot(json!([1, 2]), &defaults()).unwrap_err().is_validation());
        assert!(merge_snapshot(json!("settings"), &defaults()).unwrap_err().is_validation());
    }

    #[test]
    fn unreadable_general_key_falls_back_alone() {
        let snapshot = json!({
            "general": {
                "maxStepNum": "many",
                "maxPlanIterations": 4,
                "reportStyle": "strategic_investment"
            }
        });
        let reconciled = reconcile_snapshot(snapshot, &defaults()).unwrap();
        let general = &reconciled.state.general;
        assert_eq!(general.max_step_num, 3);
        assert_eq!(general.max_plan_iterations, 4);
        assert_eq!(general.report_style, ReportStyle::Academic);
        assert_eq!(reconciled.discarded, 2);
    }

    #[test]
    fn unreadable_server_is_dropped_alone() {
        let defaults = defaults();
        let mut web_search = serde_json::to_value(&defaults.mcp.servers[0]).unwrap();
        web_search["enabled"] = json!(false);
        let snapshot = json!({
            "general": {"maxStepNum": 9, "reportStyle": "news"},
            "mcp": {"servers": [
                web_search,
                {
                    "name": "Mine",
                    "transport": "stdio",
                    "command": "uvx",
                    "args": ["mine-mcp"],
                    "enabled": false,
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
        });
        let reconciled = reconcile_snapshot(snapshot, &defaults).unwrap();
        let state = &reconciled.state;
        assert_eq!(reconciled.discarded, 1);
        assert_eq!(state.general.max_step_num, 9);
        assert_eq!(state.general.report_style, ReportStyle::News);
        assert_eq!(
            names(state),
            vec!["Filesystem", "Browser Automation", "Web Search", "Mine"]
        );
        assert!(!state.mcp.servers[2].enabled);
        assert!(!state.mcp.servers[3].enabled);
    }

    #[test]
    fn malformed_blocks_count_as_discarded() {
        let reconciled =
            reconcile_snapshot(json!({"general": 7, "mcp": {"servers": "all"}}), &defaults())
                .unwrap();
        assert_eq!(reconciled.state, defaults());
        assert_eq!(reconciled.discarded, 2);
    }

    #[test]
    fn clean_snapshot_discards_nothing() {
        let defaults = defaults();
        let snapshot = serde_json::to_value(&defaults).unwrap();
        let reconciled = reconcile_snapshot(snapshot, &defaults).unwrap();
        assert_eq!(reconciled.discarded, 0);
        assert_eq!(reconciled.state, defaults);
    }
}
