//! Input validation for fan commands and the appliance endpoint.
//!
//! Everything that reaches the encoder or the network passes through here
//! first. The checks are pure: they never block, retry, or log.

use serde::Serialize;
use serde_json::Value;
use std::{fmt, net::Ipv4Addr};
use thiserror::Error;

/// Slowest supported fan speed.
pub const SPEED_MIN: u8 = 1;
/// Fastest supported fan speed.
pub const SPEED_MAX: u8 = 6;

/// Rejected input, naming the constraint that was violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("speed must be an integer between 1 and 6, got {0}")]
    Speed(String),
    #[error("'{0}' is not a valid IPv4 address")]
    Ip(String),
    #[error("IPv4 address must not be 0.0.0.0")]
    UnspecifiedIp,
    #[error("port must be an integer between 1 and 65535, got {0}")]
    Port(String),
}

/// A fan speed known to lie within [`SPEED_MIN`]..=[`SPEED_MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SpeedLevel(u8);

impl SpeedLevel {
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for SpeedLevel {
    type Error = ValidationError;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        if (i64::from(SPEED_MIN)..=i64::from(SPEED_MAX)).contains(&level) {
            Ok(SpeedLevel(level as u8))
        } else {
            Err(ValidationError::Speed(level.to_string()))
        }
    }
}

impl fmt::Display for SpeedLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate a speed given as an untyped JSON value.
///
/// Accepts integers, and floats with no fractional part, in the supported
/// range. Anything else (fractions, strings, booleans, null) is rejected as
/// a speed-range violation.
pub fn validate_speed(value: &Value) -> Result<SpeedLevel, ValidationError> {
    let level = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        _ => None,
    };

    match level {
        Some(level) => {
            SpeedLevel::try_from(level).map_err(|_| ValidationError::Speed(value.to_string()))
        }
        None => Err(ValidationError::Speed(value.to_string())),
    }
}

/// Validate an IPv4 literal, rejecting the unspecified address.
pub fn validate_ip(raw: &str) -> Result<Ipv4Addr, ValidationError> {
    let addr: Ipv4Addr = raw
        .parse()
        .map_err(|_| ValidationError::Ip(raw.to_string()))?;

    if addr.is_unspecified() {
        return Err(ValidationError::UnspecifiedIp);
    }

    Ok(addr)
}

/// Validate a UDP port number. Port 0 is not addressable.
pub fn validate_port(port: i64) -> Result<u16, ValidationError> {
    match u16::try_from(port) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ValidationError::Port(port.to_string())),
    }
}

/// Parse and validate a port given as text, e.g. from the environment.
pub fn validate_port_str(raw: &str) -> Result<u16, ValidationError> {
    let port: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::Port(format!("'{}'", raw)))?;
    validate_port(port)
}
