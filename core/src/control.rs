//! Control-phase client.
//!
//! Two requests configure and trigger generation: `/api/initialize` and
//! `/api/generate`. Each is a single attempt with a bounded wait; every
//! failure mode is folded into [`ControlError`] so the orchestrator can
//! turn it into a session outcome instead of unwinding.

use crate::error::ControlError;
use crate::protocol::{
    GenerateRequest, GenerateResponse, InitializeRequest, InitializeResponse,
};
use anyhow::{Context, Result};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Initialization may involve heavy remote setup; starting generation is
/// quick to acknowledge.
const INITIALIZE_TIMEOUT: Duration = Duration::from_secs(30);
const GENERATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest error body echoed back into a [`ControlError::Status`].
const MAX_ERROR_BODY: usize = 300;

pub struct ControlClient {
    host: String,
    http_client: HttpClient,
}

impl ControlClient {
    /// `server` may be a bare host or carry an http/https scheme; the
    /// scheme is stripped because control traffic always goes over https
    /// and streaming over wss.
    pub fn new(server: &str) -> Result<Self> {
        let http_client = HttpClient::builder()
            .user_agent(concat!("heatlink/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            host: normalize_host(server),
            http_client,
        })
    }

    /// Host the session talks to, scheme already stripped.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Configure the backend with the satellite dataset.
    pub async fn initialize(
        &self,
        request: &InitializeRequest,
    ) -> Result<InitializeResponse, ControlError> {
        self.post("/api/initialize", request, INITIALIZE_TIMEOUT)
            .await
    }

    /// Ask the backend to start producing frames. The returned
    /// `total_frames` seeds the session's expected count.
    pub async fn start_generation(
        &self,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ControlError> {
        self.post("/api/generate", request, GENERATE_TIMEOUT).await
    }

    async fn post<B, R>(&self, path: &str, body: &B, timeout: Duration) -> Result<R, ControlError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = format!("https://{}{}", self.host, path);
        crate::debug_log!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|source| ControlError::Transport {
                endpoint: path.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(MAX_ERROR_BODY);
            return Err(ControlError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ControlError::MalformedBody {
                endpoint: path.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Strip any scheme the caller supplied; the transport is fixed per phase.
pub fn normalize_host(server: &str) -> String {
    let host = server
        .strip_prefix("https://")
        .or_else(|| server.strip_prefix("http://"))
        .unwrap_or(server);
    host.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("localhost:5000"), "localhost:5000");
        assert_eq!(normalize_host("http://localhost:5000"), "localhost:5000");
        assert_eq!(
            normalize_host("https://heatmaps.example.com/"),
            "heatmaps.example.com"
        );
    }

    #[test]
    fn test_client_keeps_normalized_host() {
        let client = ControlClient::new("https://heatmaps.example.com/").unwrap();
        assert_eq!(client.host(), "heatmaps.example.com");
    }
}
