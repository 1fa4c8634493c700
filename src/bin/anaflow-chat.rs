//! Interactive chat with an AnaFlow research assistant.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a local development server
//! anaflow-chat
//!
//! # Talk to another deployment, continuing a thread
//! anaflow-chat --base-url https://anaflow.example.com/api/ --thread-id 0190c8b2-...
//!
//! # Disable colors (useful for piping output)
//! anaflow-chat --no-color
//! ```
//!
//! Settings changed with slash commands are stored under `~/.anaflow` and apply to every later
//! turn.  Press Ctrl-C while a response streams to cancel it.

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use anaflow::chat::{
    ChatArgs, ChatCommand, ChatConfig, PlainTextObserver, SendOptions, SessionController,
    help_text, parse_command,
};
use anaflow::settings::SettingsStore;
use anaflow::{AnaFlow, AppContext, FileStorage, McpConnection, RuntimeConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("anaflow-chat [OPTIONS]");
    let config = ChatConfig::from(args);

    let client = AnaFlow::new(config.base_url.clone())?;
    let context = AppContext::new(Arc::new(FileStorage::new(config.settings_dir.clone())));
    let runtime = context.init(&client).await;

    let observer = Arc::new(PlainTextObserver::new(config.use_color));
    let controller = Arc::new(
        SessionController::new(client.clone(), context.settings(), config.thread_id.clone())
            .with_observer(observer.clone()),
    );

    let cancel_target = Arc::clone(&controller);
    ctrlc::set_handler(move || {
        cancel_target.cancel();
    })?;

    let mut rl = DefaultEditor::new()?;

    println!("AnaFlow Chat ({})", client.base_url());
    println!("Thread: {}", config.thread_id);
    println!("RAG provider: {}", runtime.rag_provider());
    println!("Type /help for commands, /quit to exit\n");

    loop {
        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    let settings = context.settings();
                    let mut settings = settings
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::ShowConfig => print_config(runtime),
                        ChatCommand::ShowSettings => print_settings(&settings),
                        ChatCommand::Style(style) => {
                            settings.set_report_style(style);
                            print_info(&format!("Report style set to {style}"));
                        }
                        ChatCommand::DeepThinking(enabled) => {
                            settings.set_enable_deep_thinking(enabled);
                            print_info(&format!("Deep thinking {}", on_off(enabled)));
                        }
                        ChatCommand::BackgroundInvestigation(enabled) => {
                            settings.set_enable_background_investigation(enabled);
                            print_info(&format!("Background investigation {}", on_off(enabled)));
                        }
                        ChatCommand::AutoAcceptPlan(enabled) => {
                            settings.set_auto_accepted_plan(enabled);
                            print_info(&format!("Auto-accept plan {}", on_off(enabled)));
                        }
                        ChatCommand::MaxPlanIterations(value) => {
                            settings.set_max_plan_iterations(value);
                            print_info(&format!("max_plan_iterations set to {value}"));
                        }
                        ChatCommand::MaxStepNum(value) => {
                            settings.set_max_step_num(value);
                            print_info(&format!("max_step_num set to {value}"));
                        }
                        ChatCommand::MaxSearchResults(value) => {
                            settings.set_max_search_results(value);
                            print_info(&format!("max_search_results set to {value}"));
                        }
                        ChatCommand::McpList => print_servers(&settings),
                        ChatCommand::McpEnabled(name, enabled) => {
                            match settings.set_mcp_server_enabled(&name, enabled) {
                                Ok(()) => print_info(&format!("{name} {}", on_off(enabled))),
                                Err(err) => print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::McpRemove(name) => match settings.remove_mcp_server(&name) {
                            Ok(_) => print_info(&format!("Removed {name}")),
                            Err(err) => print_error(&err.to_string()),
                        },
                        ChatCommand::Feedback(answer) => {
                            let option = observer.resolve_feedback(&answer);
                            print_info(&format!("Next message answers with: {}", option.value));
                            controller.set_feedback(option);
                        }
                        ChatCommand::ClearFeedback => {
                            controller.clear_feedback();
                            print_info("Feedback cleared.");
                        }
                        ChatCommand::Invalid(message) => print_error(&message),
                    }
                    continue;
                }

                controller.send(line, SendOptions::default()).await;
                // Feedback answers one interrupt.
                controller.clear_feedback();
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

fn print_info(message: &str) {
    println!("    {message}");
}

fn print_error(message: &str) {
    eprintln!("    error: {message}");
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn print_config(config: &RuntimeConfig) {
    println!("    Service Configuration:");
    println!("      RAG provider: {}", config.rag_provider());
    println!("      Basic models: {}", describe_list(&config.models.basic));
    println!(
        "      Reasoning models: {}",
        describe_list(&config.models.reasoning)
    );
}

fn print_settings(settings: &SettingsStore) {
    let general = settings.general();
    println!("    Current Settings:");
    println!("      Report style: {}", general.report_style);
    println!("      Deep thinking: {}", on_off(general.enable_deep_thinking));
    println!(
        "      Background investigation: {}",
        on_off(general.enable_background_investigation)
    );
    println!("      Auto-accept plan: {}", on_off(general.auto_accepted_plan));
    println!("      Max plan iterations: {}", general.max_plan_iterations);
    println!("      Max step num: {}", general.max_step_num);
    println!("      Max search results: {}", general.max_search_results);
    print_servers(settings);
}

fn print_servers(settings: &SettingsStore) {
    println!("      MCP servers:");
    for server in settings.servers() {
        let target = match &server.connection {
            McpConnection::Stdio { command, args } => format!("{command} {}", args.join(" ")),
            McpConnection::Remote { url } => url.clone(),
        };
        println!(
            "        [{}] {} ({}: {})",
            if server.enabled { "x" } else { " " },
            server.name,
            server.connection.transport(),
            target
        );
        if !server.tools.is_empty() {
            println!("            tools: {}", server.tool_names().join(", "));
        }
    }
}

fn describe_list(values: &[String]) -> String {
    if values.is_empty() {
        "(none)".to_string()
    } else {
        values.join(", ")
    }
}
