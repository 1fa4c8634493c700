//! Compiled-in settings.

use std::env;

use time::OffsetDateTime;

use crate::types::{GeneralSettings, McpRegistry, McpServerMetadata, SettingsState, ToolDescriptor};

/// Storage key of the persisted settings snapshot.
pub const SETTINGS_KEY: &str = "anaFlow.settings";

/// Storage key holding the last stored snapshot that could not be read in full.
pub const SETTINGS_BACKUP_KEY: &str = "anaFlow.settings.backup";

/// Agents that receive the tools of every enabled MCP server.
pub const TOOL_AGENTS: &[&str] = &["researcher"];

const TAVILY_API_KEY_ENV: &str = "TAVILY_API_KEY";

/// The MCP servers every installation starts with.
///
/// Web Search and Filesystem are enabled; Browser Automation is offered but disabled.  These
/// servers can be toggled but not removed.
pub fn default_mcp_servers(now: OffsetDateTime) -> Vec<McpServerMetadata> {
    let mut web_search =
        McpServerMetadata::stdio("Web Search", "npx", ["-y", "tavily-mcp@0.1.3"], now).with_tools(
            vec![ToolDescriptor::new(
                "tavily_search_results_json",
                "Search the web using Tavily Search API",
            )],
        );
    if let Ok(key) = env::var(TAVILY_API_KEY_ENV) {
        web_search = web_search.with_env(TAVILY_API_KEY_ENV, key);
    }

    let filesystem = McpServerMetadata::stdio(
        "Filesystem",
        "npx",
        ["-y", "@modelcontextprotocol/server-filesystem", "./local_data"],
        now,
    )
    .with_tools(vec![
        ToolDescriptor::new(
            "read_file",
            "Read the complete contents of a file from the file system",
        ),
        ToolDescriptor::new(
            "write_file",
            "Create a new file or overwrite an existing file with new content",
        ),
        ToolDescriptor::new(
            "list_directory",
            "Get a detailed listing of all files and directories in a specified path",
        ),
        ToolDescriptor::new(
            "create_directory",
            "Create a new directory or ensure a directory exists",
        ),
        ToolDescriptor::new(
            "search_files",
            "Recursively search for files and directories matching a pattern",
        ),
        ToolDescriptor::new(
            "get_file_info",
            "Retrieve detailed metadata about a file or directory",
        ),
    ]);

    let browser = McpServerMetadata::stdio(
        "Browser Automation",
        "npx",
        ["-y", "@modelcontextprotocol/server-playwright"],
        now,
    )
    .with_enabled(false)
    .with_tools(vec![
        ToolDescriptor::new("playwright_screenshot", "Take a screenshot of a webpage"),
        ToolDescriptor::new("playwright_click", "Click on an element on a webpage"),
        ToolDescriptor::new("playwright_fill", "Fill a form field on a webpage"),
        ToolDescriptor::new("playwright_navigate", "Navigate to a specific URL"),
    ]);

    vec![web_search, filesystem, browser]
}

/// The full default settings, with server timestamps set to `now`.
pub fn default_settings(now: OffsetDateTime) -> SettingsState {
    SettingsState {
        general: GeneralSettings::default(),
        mcp: McpRegistry {
            servers: default_mcp_servers(now),
        },
    }
}
