//! Slash command parsing for the chat application.
//!
//! Lines starting with `/` control the session and the stored settings; they are never sent to
//! the service.

use crate::types::ReportStyle;

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Show the runtime configuration reported by the service.
    ShowConfig,

    /// Show the stored settings.
    ShowSettings,

    /// Set the report style.
    Style(ReportStyle),

    /// Toggle the reasoning model.
    DeepThinking(bool),

    /// Toggle the web search before planning.
    BackgroundInvestigation(bool),

    /// Toggle automatic plan acceptance.
    AutoAcceptPlan(bool),

    /// Set the number of plan revisions.
    MaxPlanIterations(u32),

    /// Set the maximum number of plan steps.
    MaxStepNum(u32),

    /// Set the maximum number of search results.
    MaxSearchResults(u32),

    /// List the MCP servers.
    McpList,

    /// Enable or disable an MCP server by name.
    McpEnabled(String, bool),

    /// Remove a user-added MCP server.
    McpRemove(String),

    /// Select the feedback for the next turn, by option value or by number.
    Feedback(String),

    /// Drop the selected feedback.
    ClearFeedback,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it should be sent as a
/// message.
///
/// # Examples
///
/// ```
/// # use anaflow::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/style news").is_some());
/// assert!(parse_command("What is MCP?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "config" => ChatCommand::ShowConfig,
        "settings" => ChatCommand::ShowSettings,
        "style" => match argument.map(str::parse::<ReportStyle>) {
            Some(Ok(style)) => ChatCommand::Style(style),
            Some(Err(err)) => ChatCommand::Invalid(format!("/style {err}")),
            None => ChatCommand::Invalid(format!(
                "/style requires one of: {}",
                style_names().join(", ")
            )),
        },
        "deep_thinking" => parse_toggle(argument, ChatCommand::DeepThinking, "/deep_thinking"),
        "background" => {
            parse_toggle(argument, ChatCommand::BackgroundInvestigation, "/background")
        }
        "auto_accept" => parse_toggle(argument, ChatCommand::AutoAcceptPlan, "/auto_accept"),
        "max_plan_iterations" => parse_u32_command(
            argument,
            ChatCommand::MaxPlanIterations,
            "/max_plan_iterations",
        ),
        "max_step_num" => parse_u32_command(argument, ChatCommand::MaxStepNum, "/max_step_num"),
        "max_search_results" => parse_u32_command(
            argument,
            ChatCommand::MaxSearchResults,
            "/max_search_results",
        ),
        "mcp" => parse_mcp_command(argument),
        "feedback" => match argument {
            Some(arg) if arg.eq_ignore_ascii_case("clear") => ChatCommand::ClearFeedback,
            Some(arg) => ChatCommand::Feedback(arg.to_string()),
            None => ChatCommand::Invalid("/feedback requires a value or 'clear'".to_string()),
        },
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

fn parse_mcp_command(argument: Option<&str>) -> ChatCommand {
    let Some(arg) = argument else {
        return ChatCommand::McpList;
    };

    let mut parts = arg.splitn(2, ' ');
    let action = parts.next().unwrap_or_default().to_lowercase();
    let name = parts
        .next()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    match (action.as_str(), name) {
        ("list", _) => ChatCommand::McpList,
        ("enable", Some(name)) => ChatCommand::McpEnabled(name, true),
        ("disable", Some(name)) => ChatCommand::McpEnabled(name, false),
        ("remove", Some(name)) => ChatCommand::McpRemove(name),
        ("enable" | "disable" | "remove", None) => {
            ChatCommand::Invalid(format!("/mcp {action} requires a server name"))
        }
        _ => ChatCommand::Invalid(
            "Unrecognized /mcp action (use list, enable, disable, or remove)".to_string(),
        ),
    }
}

fn parse_toggle<F>(argument: Option<&str>, constructor: F, name: &str) -> ChatCommand
where
    F: Fn(bool) -> ChatCommand,
{
    match argument.and_then(parse_on_off) {
        Some(value) => constructor(value),
        None => ChatCommand::Invalid(format!("{name} expects 'on' or 'off'")),
    }
}

fn parse_u32_command<F>(argument: Option<&str>, constructor: F, name: &str) -> ChatCommand
where
    F: Fn(u32) -> ChatCommand,
{
    match argument {
        Some(arg) => match arg.parse::<u32>() {
            Ok(value) => constructor(value),
            Err(_) => ChatCommand::Invalid(format!("{name} expects a positive integer")),
        },
        None => ChatCommand::Invalid(format!("{name} requires a value")),
    }
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn style_names() -> Vec<&'static str> {
    ReportStyle::ALL.iter().map(|style| style.as_str()).collect()
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /style <style>              Set the report style (academic, popular_science, news, social_media)
  /deep_thinking on|off       Use the reasoning model
  /background on|off          Search the web before planning
  /auto_accept on|off         Accept plans without asking
  /max_plan_iterations <n>    Set how often the plan may be revised
  /max_step_num <n>           Set the maximum number of plan steps
  /max_search_results <n>     Set the maximum number of search results
  /mcp list                   List MCP servers
  /mcp enable <name>          Enable an MCP server
  /mcp disable <name>         Disable an MCP server
  /mcp remove <name>          Remove a user-added MCP server
  /feedback <value|n>         Answer the last interrupt with the next message
  /feedback clear             Drop the selected answer
  /settings                   Show stored settings
  /config                     Show the service configuration
  /help                       Show this help message
  /quit                       Exit the chat

Press Ctrl-C while a response streams to cancel it."#
}
