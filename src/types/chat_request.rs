use serde::{Deserialize, Serialize};

use crate::types::{McpSettings, ReportStyle, Resource};

/// Limits on how much work the planner may schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningLimits {
    /// How many times the planner may revise its plan.
    pub max_plan_iterations: u32,
    /// Maximum number of steps in a plan.
    pub max_step_num: u32,
    /// Maximum number of search results per query.
    pub max_search_results: Option<u32>,
}

/// Behavioral switches for one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnFlags {
    /// Accept the planner's plan without asking.
    pub auto_accepted_plan: bool,
    /// Use a reasoning model.
    pub enable_deep_thinking: bool,
    /// Run a web search before planning.
    pub enable_background_investigation: bool,
}

/// Everything needed to start one chat turn.
///
/// A request is built fresh for every send and is not changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurnRequest {
    /// The user's message.
    pub message: String,
    /// Conversation identifier.
    pub thread_id: String,
    /// Attached resources.
    pub resources: Vec<Resource>,
    /// Planner limits.
    pub planning_limits: PlanningLimits,
    /// Behavioral switches.
    pub flags: TurnFlags,
    /// Style of the final report.
    pub report_style: Option<ReportStyle>,
    /// The user's answer to a previous interrupt.
    pub interrupt_feedback: Option<String>,
    /// Tool servers offered to the agents.
    pub mcp_settings: Option<McpSettings>,
}

/// A message in the request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Always `user` for messages sent by this client.
    pub role: String,
    /// Message text.
    pub content: String,
}

/// The JSON body of `POST /chat/stream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatStreamBody {
    /// The new user message.
    pub messages: Vec<ChatMessage>,
    /// Conversation identifier.
    pub thread_id: String,
    /// Attached resources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,
    /// Accept the planner's plan without asking.
    pub auto_accepted_plan: bool,
    /// How many times the planner may revise its plan.
    pub max_plan_iterations: u32,
    /// Maximum number of steps in a plan.
    pub max_step_num: u32,
    /// Maximum number of search results per query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_search_results: Option<u32>,
    /// The user's answer to a previous interrupt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt_feedback: Option<String>,
    /// Use a reasoning model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_deep_thinking: Option<bool>,
    /// Run a web search before planning.
    pub enable_background_investigation: bool,
    /// Style of the final report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_style: Option<ReportStyle>,
    /// Tool servers offered to the agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_settings: Option<McpSettings>,
}

impl From<&ChatTurnRequest> for ChatStreamBody {
    fn from(request: &ChatTurnRequest) -> Self {
        Self {
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.message.clone(),
            }],
            thread_id: request.thread_id.clone(),
            resources: request.resources.clone(),
            auto_accepted_plan: request.flags.auto_accepted_plan,
            max_plan_iterations: request.planning_limits.max_plan_iterations,
            max_step_num: request.planning_limits.max_step_num,
            max_search_results: request.planning_limits.max_search_results,
            interrupt_feedback: request.interrupt_feedback.clone(),
            enable_deep_thinking: Some(request.flags.enable_deep_thinking),
            enable_background_investigation: request.flags.enable_background_investigation,
            report_style: request.report_style,
            mcp_settings: request.mcp_settings.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> ChatTurnRequest {
        ChatTurnRequest {
            message: "What is MCP?".to_string(),
            thread_id: "thread-1".to_string(),
            resources: Vec::new(),
            planning_limits: PlanningLimits {
                max_plan_iterations: 1,
                max_step_num: 3,
                max_search_results: None,
            },
            flags: TurnFlags::default(),
            report_style: Some(ReportStyle::News),
            interrupt_feedback: None,
            mcp_settings: None,
        }
    }

    #[test]
    fn body_omits_absent_optionals() {
        let body = ChatStreamBody::from(&request());
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "messages": [{"role": "user", "content": "What is MCP?"}],
                "thread_id": "thread-1",
                "auto_accepted_plan": false,
                "max_plan_iterations": 1,
                "max_step_num": 3,
                "enable_deep_thinking": false,
                "enable_background_investigation": false,
                "report_style": "news"
            })
        );
    }

    #[test]
    fn body_carries_feedback_and_resources() {
        let mut request = request();
        request.interrupt_feedback = Some("accepted".to_string());
        request.resources = vec![Resource::new("rag://dataset/1", "Handbook")];
        request.planning_limits.max_search_results = Some(5);
        let json = serde_json::to_value(ChatStreamBody::from(&request)).unwrap();
        assert_eq!(json["interrupt_feedback"], "accepted");
        assert_eq!(json["max_search_results"], 5);
        assert_eq!(
            json["resources"],
            json!([{"uri": "rag://dataset/1", "title": "Handbook"}])
        );
    }
}
