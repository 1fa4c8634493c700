use serde::{Deserialize, Serialize};

use crate::types::{McpServerMetadata, ReportStyle};

/// Turn defaults the user can change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralSettings {
    /// Accept the planner's plan without asking.
    pub auto_accepted_plan: bool,
    /// Use a reasoning model.
    pub enable_deep_thinking: bool,
    /// Run a web search before planning.
    pub enable_background_investigation: bool,
    /// How many times the planner may revise its plan.
    pub max_plan_iterations: u32,
    /// Maximum number of steps in a plan.
    pub max_step_num: u32,
    /// Maximum number of search results per query.
    pub max_search_results: u32,
    /// Style of the final report.
    pub report_style: ReportStyle,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            auto_accepted_plan: false,
            enable_deep_thinking: false,
            enable_background_investigation: false,
            max_plan_iterations: 1,
            max_step_num: 3,
            max_search_results: 3,
            report_style: ReportStyle::Academic,
        }
    }
}

/// The MCP server registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpRegistry {
    /// Servers in display order.
    pub servers: Vec<McpServerMetadata>,
}

/// Everything the settings store persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsState {
    /// Turn defaults.
    pub general: GeneralSettings,
    /// Tool servers.
    pub mcp: McpRegistry,
}
