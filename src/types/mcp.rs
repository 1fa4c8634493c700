use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// How the backend reaches an MCP server.
///
/// Serialized inline with a `transport` tag, so a stdio server reads as
/// `{"transport": "stdio", "command": "npx", "args": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport")]
pub enum McpConnection {
    /// A local process speaking MCP over stdin/stdout.
    #[serde(rename = "stdio")]
    Stdio {
        /// Executable to launch.
        command: String,
        /// Arguments passed to the executable.
        #[serde(default)]
        args: Vec<String>,
    },
    /// A remote server reached over HTTP.
    #[serde(rename = "sse", alias = "remote")]
    Remote {
        /// Endpoint of the server.
        url: String,
    },
}

impl McpConnection {
    /// The transport name as it appears on the wire.
    pub fn transport(&self) -> &'static str {
        match self {
            McpConnection::Stdio { .. } => "stdio",
            McpConnection::Remote { .. } => "sse",
        }
    }
}

/// A tool exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within its server.
    pub name: String,
    /// What the tool does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ToolDescriptor {
    /// Creates a described tool.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
        }
    }
}

/// A stored MCP server definition.
///
/// `name` is the identity of the server: merges, lookups and toggles all key on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerMetadata {
    /// Unique server name.
    pub name: String,
    /// Transport and connection details.
    #[serde(flatten)]
    pub connection: McpConnection,
    /// Environment passed to the server.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Tools the server provides.
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    /// Whether the server is offered to the agents.
    pub enabled: bool,
    /// When the definition was created.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
    /// When the definition last changed.
    #[serde(with = "crate::utils::time")]
    pub updated_at: OffsetDateTime,
}

impl McpServerMetadata {
    /// Creates an enabled stdio server definition stamped at `now`.
    pub fn stdio(
        name: impl Into<String>,
        command: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            name: name.into(),
            connection: McpConnection::Stdio {
                command: command.into(),
                args: args.into_iter().map(Into::into).collect(),
            },
            env: BTreeMap::new(),
            tools: Vec::new(),
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an enabled remote server definition stamped at `now`.
    pub fn remote(name: impl Into<String>, url: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            name: name.into(),
            connection: McpConnection::Remote { url: url.into() },
            env: BTreeMap::new(),
            tools: Vec::new(),
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the tool list.
    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    /// Sets an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Names of the server's tools, in order.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.name.clone()).collect()
    }
}

/// The per-server descriptor sent with a chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerSettings {
    /// Server name.
    pub name: String,
    /// Transport and connection details.
    #[serde(flatten)]
    pub connection: McpConnection,
    /// Environment passed to the server.
    pub env: BTreeMap<String, String>,
    /// Tools the agents may call.
    pub enabled_tools: Vec<String>,
    /// Agents that receive the tools.
    pub add_to_agents: Vec<String>,
}

/// The `mcp_settings` block of a chat turn, keyed by server name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpSettings {
    /// Enabled servers.
    pub servers: BTreeMap<String, McpServerSettings>,
}
