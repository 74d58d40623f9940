//! Wire format for fan commands.
//!
//! The appliance accepts one small JSON object per datagram, carrying exactly
//! one of the fields `led`, `power` or `speed`. It never replies.
//!
//! ```text
//! {"led":true}
//! {"power":false}
//! {"speed":4}
//! ```

use bytes::Bytes;
use serde::Serialize;

use crate::validation::SpeedLevel;

/// A single command for the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Led(bool),
    Power(bool),
    Speed(SpeedLevel),
}

impl Command {
    /// Short name used in log events.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Led(_) => "led",
            Command::Power(_) => "power",
            Command::Speed(_) => "speed",
        }
    }
}

// Absent fields are left out of the object entirely rather than sent as
// null or false.
#[derive(Serialize, Default)]
struct Payload {
    #[serde(skip_serializing_if = "Option::is_none")]
    led: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    power: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<SpeedLevel>,
}

impl From<Command> for Payload {
    fn from(command: Command) -> Self {
        match command {
            Command::Led(on) => Payload {
                led: Some(on),
                ..Default::default()
            },
            Command::Power(on) => Payload {
                power: Some(on),
                ..Default::default()
            },
            Command::Speed(level) => Payload {
                speed: Some(level),
                ..Default::default()
            },
        }
    }
}

/// Encode a command into its datagram payload.
pub fn encode(command: &Command) -> Bytes {
    let payload = Payload::from(*command);
    // A struct of optional bools and integers always serializes.
    let json = serde_json::to_vec(&payload).expect("fan payload serialization cannot fail");
    Bytes::from(json)
}
