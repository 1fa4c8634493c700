//! Print the runtime configuration an AnaFlow deployment reports.
//!
//! # Usage
//!
//! ```bash
//! anaflow-config
//! anaflow-config --base-url https://anaflow.example.com/api/
//!
//! # Fail instead of printing the built-in fallback
//! anaflow-config --strict
//! ```

use arrrg::CommandLine;
use arrrg_derive::CommandLine;
use tracing_subscriber::EnvFilter;

use anaflow::{AnaFlow, ConfigLoader};

/// Command-line arguments for the anaflow-config tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
struct Args {
    /// Base URL of the AnaFlow service.
    #[arrrg(optional, "Service base URL (default: $ANAFLOW_API_URL)", "URL")]
    base_url: Option<String>,

    /// Exit with an error when the service cannot be reached.
    #[arrrg(flag, "Fail instead of falling back to the default configuration")]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, free) = Args::from_command_line_relaxed("anaflow-config [OPTIONS]");
    if !free.is_empty() {
        eprintln!("Error: unexpected arguments: {}", free.join(" "));
        std::process::exit(2);
    }

    let client = AnaFlow::new(args.base_url)?;
    let config = if args.strict {
        client.fetch_config().await?
    } else {
        ConfigLoader::new().load(&client).await.clone()
    };
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
