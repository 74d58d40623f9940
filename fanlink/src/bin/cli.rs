//! Command-line interface for fanlink.
//!
//! This binary talks to a running `fanlinkd` over its HTTP API. Each
//! subcommand maps onto one tool call.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::process::ExitCode;

use fanlink::{api_client::{ApiClient, DEFAULT_BASE_URL}, tools::Tool};

#[derive(Parser)]
#[command(name = "fanlink-cli", version, about = "Control a fan through fanlinkd")]
struct Cli {
    /// Base URL of the fanlinkd API
    #[arg(long, env = "FANLINK_URL", default_value = DEFAULT_BASE_URL)]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available tools
    List,
    /// Switch the fan on or off
    Fan { state: Switch },
    /// Switch the LED on or off
    Led { state: Switch },
    /// Set the fan speed (1-6)
    Speed { level: i64 },
    /// Check whether the fan is reachable
    Health,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl Command {
    fn tool_call(&self) -> Option<(Tool, Value)> {
        let call = match self {
            Command::List => return None,
            Command::Fan { state: Switch::On } => (Tool::TurnOnFan, Value::Null),
            Command::Fan { state: Switch::Off } => (Tool::TurnOffFan, Value::Null),
            Command::Led { state: Switch::On } => (Tool::TurnOnLed, Value::Null),
            Command::Led { state: Switch::Off } => (Tool::TurnOffLed, Value::Null),
            Command::Speed { level } => (Tool::SetFanSpeed, json!({ "speed": level })),
            Command::Health => (Tool::CheckFanHealth, Value::Null),
        };
        Some(call)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let client = ApiClient::new(cli.url);

    let Some((tool, args)) = cli.command.tool_call() else {
        for tool in client.list_tools().await? {
            println!("{:<18} {}", tool.name, tool.description);
        }
        return Ok(ExitCode::SUCCESS);
    };

    let response = client.call_tool(tool.as_ref(), args).await?;
    if response.is_error {
        eprintln!("error: {}", response.content);
        return Ok(ExitCode::FAILURE);
    }

    println!("{}", response.content);
    Ok(ExitCode::SUCCESS)
}
