//! API version 1 endpoints.

use axum::{
    body::Bytes,
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    fan::FanError,
    tools::{self, ToolError, ToolInfo},
    transport::{Transport, UdpTransport},
    FanControl,
};

/// Shared application state for API endpoints.
pub struct AppState<T: Transport = UdpTransport> {
    /// The fan every tool call is routed to
    pub fan: Arc<FanControl<T>>,
}

impl<T: Transport> AppState<T> {
    pub fn new(fan: Arc<FanControl<T>>) -> Self {
        Self { fan }
    }
}

impl<T: Transport> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            fan: self.fan.clone(),
        }
    }
}

/// Result of a tool call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolCallResponse {
    /// Human-readable result, or the error message
    pub content: String,
    /// Whether the call failed
    pub is_error: bool,
}

impl ToolCallResponse {
    fn error(status: StatusCode, content: String) -> Response {
        let body = ToolCallResponse {
            content,
            is_error: true,
        };
        (status, Json(body)).into_response()
    }
}

/// Health check endpoint handler.
///
/// Returns a simple OK status to verify the API is running. This says
/// nothing about the fan; use the `check-fan-health` tool for that.
async fn health() -> &'static str {
    "OK"
}

/// List tools endpoint handler.
///
/// # Example
/// ```bash
/// curl http://localhost:7786/api/v1/tools
/// ```
async fn list_tools() -> Json<Vec<ToolInfo>> {
    Json(tools::catalog())
}

/*   Call tool endpoint handler.

     Invokes the named tool. The request body holds the tool's arguments as a
     JSON object and may be empty for tools that take none.

    # Example

    curl -X POST http://localhost:7786/api/v1/tools/set-fan-speed \
       -H "Content-Type: application/json" \
       -d '{"speed": 4}'
*/
async fn call_tool<T: Transport + 'static>(
    State(state): State<AppState<T>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let args = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(args) => args,
            Err(e) => {
                return ToolCallResponse::error(
                    StatusCode::BAD_REQUEST,
                    format!("arguments are not valid JSON: {}", e),
                );
            }
        }
    };

    debug!(tool = %name, "API request to call tool");

    match tools::dispatch(&state.fan, &name, args).await {
        Ok(output) => {
            let response = ToolCallResponse {
                content: output.text,
                is_error: false,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            warn!(tool = %name, error = %e, "Tool call failed");
            ToolCallResponse::error(status_for(&e), e.to_string())
        }
    }
}

fn status_for(error: &ToolError) -> StatusCode {
    match error {
        ToolError::UnknownTool(_) => StatusCode::NOT_FOUND,
        ToolError::InvalidArguments { .. } | ToolError::Fan(FanError::Validation(_)) => {
            StatusCode::BAD_REQUEST
        }
        ToolError::Fan(FanError::Network(_)) => StatusCode::BAD_GATEWAY,
    }
}

/// Build the v1 API routes.
pub fn routes<T: Transport + 'static>(state: AppState<T>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/tools/:name", post(call_tool::<T>))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{retry::RetryError, transport::NetworkError, validation::ValidationError};
    use std::time::Duration;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            status_for(&ToolError::UnknownTool("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ValidationError::Speed("9".into()).into()),
            StatusCode::BAD_REQUEST
        );
        let exhausted = RetryError::Exhausted {
            attempts: 3,
            last_error: NetworkError::Timeout(Duration::from_secs(5)),
        };
        assert_eq!(
            status_for(&ToolError::Fan(FanError::Network(exhausted))),
            StatusCode::BAD_GATEWAY
        );
    }
}
