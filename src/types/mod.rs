// Public modules
pub mod chat_event;
pub mod chat_request;
pub mod mcp;
pub mod report_style;
pub mod resource;
pub mod runtime_config;
pub mod settings_state;

// Re-exports
pub use chat_event::{
    ChatEvent, ChatEventType, InterruptEvent, InterruptOption, MessageChunk, ToolCall,
    ToolCallResult, ToolCallsEvent,
};
pub use chat_request::{
    ChatMessage, ChatStreamBody, ChatTurnRequest, PlanningLimits, TurnFlags,
};
pub use mcp::{McpConnection, McpServerMetadata, McpServerSettings, McpSettings, ToolDescriptor};
pub use report_style::ReportStyle;
pub use resource::Resource;
pub use runtime_config::{ModelConfig, RagConfig, RuntimeConfig};
pub use settings_state::{GeneralSettings, McpRegistry, SettingsState};
