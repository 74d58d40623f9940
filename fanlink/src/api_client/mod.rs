//! API client library.
//!
//! This module provides a Rust client for the daemon's HTTP API, used by the
//! CLI binary. It handles request/response serialization; tool failures come
//! back as a [`ToolCallResponse`] with `is_error` set rather than as an
//! [`Err`], which is reserved for transport and decoding problems.

use reqwest::Client;
use serde_json::Value;

use crate::{
    api::ToolCallResponse,
    error::{Error, Result},
    tools::ToolInfo,
};

/// Default base URL of a locally running daemon.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7786";

/// Client for the v1 API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    /// Check that the daemon is up.
    pub async fn health(&self) -> Result<String> {
        let response = self
            .http
            .get(self.url("/health"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(api_error)?;
        response.text().await.map_err(api_error)
    }

    /// Fetch the tool catalog.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        self.http
            .get(self.url("/tools"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(api_error)?
            .json()
            .await
            .map_err(api_error)
    }

    /// Call a tool. `args` may be [`Value::Null`] for tools without
    /// arguments.
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<ToolCallResponse> {
        let mut request = self.http.post(self.url(&format!("/tools/{}", name)));
        if !args.is_null() {
            request = request.json(&args);
        }

        // Error statuses still carry a ToolCallResponse body.
        request
            .send()
            .await
            .map_err(api_error)?
            .json()
            .await
            .map_err(api_error)
    }
}

fn api_error(e: reqwest::Error) -> Error {
    Error::Api(e.to_string())
}
