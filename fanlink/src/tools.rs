//! Tool registry and dispatch.
//!
//! Tools are the named operations that outside callers (the HTTP API, the
//! CLI, an assistant with tool calling) can invoke. Each tool maps to exactly
//! one [`FanControl`] operation. This module owns argument parsing and the
//! text of the responses; the facade only sees typed, validated input.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use thiserror::Error;

use crate::{
    fan::{FanControl, FanError},
    tracing::prelude::*,
    transport::Transport,
    validation::{self, ValidationError, SPEED_MAX, SPEED_MIN},
};

/// Every tool the dispatcher knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Tool {
    TurnOnFan,
    TurnOffFan,
    TurnOnLed,
    TurnOffLed,
    SetFanSpeed,
    CheckFanHealth,
}

impl Tool {
    pub fn description(&self) -> &'static str {
        match self {
            Tool::TurnOnFan => "Turn the fan on",
            Tool::TurnOffFan => "Turn the fan off",
            Tool::TurnOnLed => "Turn the fan's LED on",
            Tool::TurnOffLed => "Turn the fan's LED off",
            Tool::SetFanSpeed => "Set the fan speed (1-6)",
            Tool::CheckFanHealth => "Check whether the fan is reachable",
        }
    }

    /// JSON Schema describing the tool's arguments.
    pub fn input_schema(&self) -> Value {
        match self {
            Tool::SetFanSpeed => json!({
                "type": "object",
                "properties": {
                    "speed": {
                        "type": "integer",
                        "minimum": SPEED_MIN,
                        "maximum": SPEED_MAX,
                        "description": "Fan speed level"
                    }
                },
                "required": ["speed"]
            }),
            _ => json!({ "type": "object", "properties": {} }),
        }
    }

    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Catalog entry for one tool.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Text returned by a successful tool call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ToolOutput {
    pub text: String,
}

impl ToolOutput {
    fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Failure of a tool call.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: Tool, reason: String },
    #[error(transparent)]
    Fan(#[from] FanError),
}

impl From<ValidationError> for ToolError {
    fn from(e: ValidationError) -> Self {
        ToolError::Fan(FanError::Validation(e))
    }
}

/// List all registered tools.
pub fn catalog() -> Vec<ToolInfo> {
    Tool::iter().map(|tool| tool.info()).collect()
}

/// Invoke the tool called `name` with JSON `args`.
///
/// `args` may be `null` for tools that take no arguments.
pub async fn dispatch<T: Transport>(
    fan: &FanControl<T>,
    name: &str,
    args: Value,
) -> Result<ToolOutput, ToolError> {
    let tool = Tool::from_str(name).map_err(|_| ToolError::UnknownTool(name.to_string()))?;
    debug!(tool = %tool, args = %args, "Dispatching tool call");

    let output = match tool {
        Tool::TurnOnFan => {
            fan.power_on().await?;
            ToolOutput::text("Fan turned on")
        }
        Tool::TurnOffFan => {
            fan.power_off().await?;
            ToolOutput::text("Fan turned off")
        }
        Tool::TurnOnLed => {
            fan.led_on().await?;
            ToolOutput::text("LED turned on")
        }
        Tool::TurnOffLed => {
            fan.led_off().await?;
            ToolOutput::text("LED turned off")
        }
        Tool::SetFanSpeed => {
            let raw = args.get("speed").ok_or_else(|| ToolError::InvalidArguments {
                tool,
                reason: "missing required field 'speed'".to_string(),
            })?;
            let level = validation::validate_speed(raw)?;
            let level = fan.set_speed(level.get().into()).await?;
            ToolOutput::text(format!("Fan speed set to {}", level))
        }
        Tool::CheckFanHealth => {
            let status = fan.check_health().await;
            ToolOutput::text(serde_json::to_string_pretty(&status).unwrap_or(status.detail))
        }
    };

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{retry::RetryPolicy, transport::{Endpoint, NetworkError}};
    use async_trait::async_trait;
    use std::{
        sync::{
            atomic::{AtomicU32, Ordering},
            Arc,
        },
        time::Duration,
    };
    use test_case::test_case;

    struct CountingTransport {
        sends: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send(
            &self,
            _: &[u8],
            _: &Endpoint,
            timeout: Duration,
        ) -> Result<(), NetworkError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NetworkError::Timeout(timeout))
            } else {
                Ok(())
            }
        }

        fn shutdown(&self) {}
    }

    fn fan(fail: bool) -> (FanControl<CountingTransport>, Arc<CountingTransport>) {
        let transport = Arc::new(CountingTransport {
            sends: AtomicU32::new(0),
            fail,
        });
        let endpoint = Endpoint::new("192.168.4.1", 4210).unwrap();
        let policy = RetryPolicy::new(2, Duration::from_millis(10), Duration::from_millis(50));
        (FanControl::new(transport.clone(), endpoint, policy), transport)
    }

    #[test]
    fn test_catalog_names() {
        let names: Vec<String> = catalog().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            [
                "turn-on-fan",
                "turn-off-fan",
                "turn-on-led",
                "turn-off-led",
                "set-fan-speed",
                "check-fan-health",
            ]
        );
    }

    #[test]
    fn test_speed_schema_requires_speed() {
        let schema = Tool::SetFanSpeed.input_schema();
        assert_eq!(schema["required"], json!(["speed"]));
        assert_eq!(schema["properties"]["speed"]["maximum"], 6);
    }

    #[test_case("turn-on-fan", "Fan turned on" ; "power on")]
    #[test_case("turn-off-fan", "Fan turned off" ; "power off")]
    #[test_case("turn-on-led", "LED turned on" ; "led on")]
    #[test_case("turn-off-led", "LED turned off" ; "led off")]
    #[tokio::test]
    async fn test_simple_tools(name: &str, expected: &str) {
        let (fan, transport) = fan(false);
        let output = dispatch(&fan, name, Value::Null).await.unwrap();
        assert_eq!(output.text, expected);
        assert_eq!(transport.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_set_speed() {
        let (fan, _) = fan(false);
        let output = dispatch(&fan, "set-fan-speed", json!({ "speed": 3 })).await.unwrap();
        assert_eq!(output.text, "Fan speed set to 3");
    }

    #[test_case(json!({ "speed": 7 }) ; "too fast")]
    #[test_case(json!({ "speed": 1.5 }) ; "fraction")]
    #[test_case(json!({ "speed": "fast" }) ; "string")]
    #[tokio::test]
    async fn test_set_speed_rejects_without_sending(args: Value) {
        let (fan, transport) = fan(false);
        let err = dispatch(&fan, "set-fan-speed", args).await.unwrap_err();
        assert!(matches!(
            err,
            ToolError::Fan(FanError::Validation(ValidationError::Speed(_)))
        ));
        assert_eq!(transport.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_set_speed_requires_argument() {
        let (fan, _) = fan(false);
        let err = dispatch(&fan, "set-fan-speed", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { tool: Tool::SetFanSpeed, .. }));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (fan, _) = fan(false);
        let err = dispatch(&fan, "self-destruct", Value::Null).await.unwrap_err();
        assert_eq!(err.to_string(), "unknown tool 'self-destruct'");
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_never_errors() {
        let (fan, transport) = fan(true);
        let output = dispatch(&fan, "check-fan-health", Value::Null).await.unwrap();
        let status: Value = serde_json::from_str(&output.text).unwrap();
        assert_eq!(status["state"], "unhealthy");
        assert!(status["detail"].as_str().unwrap().contains("timed out"));
        assert_eq!(transport.sends.load(Ordering::SeqCst), 2);
    }
}
