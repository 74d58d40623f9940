//! Fan control operations.
//!
//! [`FanControl`] is the entry point for everything that talks to the
//! appliance. Each operation is a one-shot pipeline: validate the input,
//! encode the command, then send it through the retry executor. Nothing is
//! remembered between calls.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    protocol::{self, Command},
    retry::{self, RetryError, RetryPolicy},
    tracing::prelude::*,
    transport::{Endpoint, NetworkError, Transport, UdpTransport},
    validation::{SpeedLevel, ValidationError},
};

/// Failure of a fan operation.
#[derive(Error, Debug)]
pub enum FanError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("network error: {0}")]
    Network(#[from] RetryError<NetworkError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

/// Result of a single health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub state: HealthState,
    pub detail: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}

/// Remote control for one appliance.
pub struct FanControl<T: Transport = UdpTransport> {
    transport: Arc<T>,
    endpoint: Endpoint,
    policy: RetryPolicy,
    /// Cancelled on shutdown to wake operations waiting out a backoff
    closing: CancellationToken,
}

impl<T: Transport> FanControl<T> {
    pub fn new(transport: Arc<T>, endpoint: Endpoint, policy: RetryPolicy) -> Self {
        Self {
            transport,
            endpoint,
            policy,
            closing: CancellationToken::new(),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn led_on(&self) -> Result<(), FanError> {
        self.execute(Command::Led(true)).await
    }

    pub async fn led_off(&self) -> Result<(), FanError> {
        self.execute(Command::Led(false)).await
    }

    pub async fn power_on(&self) -> Result<(), FanError> {
        self.execute(Command::Power(true)).await
    }

    pub async fn power_off(&self) -> Result<(), FanError> {
        self.execute(Command::Power(false)).await
    }

    /// Set the fan speed. Out-of-range levels are rejected before anything
    /// is sent.
    pub async fn set_speed(&self, level: i64) -> Result<SpeedLevel, FanError> {
        let level = SpeedLevel::try_from(level)?;
        self.execute(Command::Speed(level)).await?;
        Ok(level)
    }

    /// Check the appliance by sending an LED-off command.
    ///
    /// Never fails; delivery errors are reported in the returned status.
    pub async fn check_health(&self) -> HealthStatus {
        match self.execute(Command::Led(false)).await {
            Ok(()) => HealthStatus {
                state: HealthState::Healthy,
                detail: "responding".to_string(),
            },
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Health check failed");
                HealthStatus {
                    state: HealthState::Unhealthy,
                    detail: e.to_string(),
                }
            }
        }
    }

    /// Close the transport. Later operations fail with a network error.
    ///
    /// Operations in flight fail on their current or next attempt instead of
    /// retrying: a closed transport is never retried, and pending backoffs
    /// are woken.
    pub fn shutdown(&self) {
        self.transport.shutdown();
        self.closing.cancel();
    }

    async fn execute(&self, command: Command) -> Result<(), FanError> {
        let payload = protocol::encode(&command);
        let timeout = self.policy.per_attempt_timeout;

        debug!(
            endpoint = %self.endpoint,
            command = command.name(),
            "Sending command"
        );

        retry::run_with_retry_if(
            &self.policy,
            |attempt| {
                trace!(attempt, command = command.name(), "Sending datagram");
                self.transport.send(&payload, &self.endpoint, timeout)
            },
            NetworkError::is_retryable,
            Some(&self.closing),
        )
        .await?;

        info!(endpoint = %self.endpoint, command = ?command, "Command delivered");
        Ok(())
    }
}
