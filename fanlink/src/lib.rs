//! Remote control for a UDP-addressable fan.
//!
//! Commands (power, LED, speed) are validated, encoded as one small JSON
//! datagram each, and sent fire-and-forget with bounded retry and
//! exponential backoff. The appliance never answers, so "delivered" means
//! the datagram left this host without a local error.
//!
//! [`FanControl`] is the entry point. The [`tools`] and [`api`] modules put a
//! tool-calling surface over HTTP in front of it, and the `fanlinkd` binary
//! wires everything to process signals.

pub mod api;
pub mod api_client;
pub mod config;
pub mod error;
pub mod fan;
pub mod protocol;
pub mod retry;
pub mod tools;
pub mod tracing;
pub mod transport;
pub mod validation;

pub use fan::{FanControl, FanError, HealthState, HealthStatus};
pub use retry::RetryPolicy;
pub use transport::{Endpoint, Transport, UdpTransport};
