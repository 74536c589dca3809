// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `http_fetch`: HTTP request with a host blocklist and a capped body.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use waynebot_core::WaynebotError;

use crate::sandbox::{Sandbox, truncate_with_marker};
use crate::tool::{Tool, ToolContext, ToolOutput, parse_args};

const HTTP_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum response body returned to the model (50KB).
pub const MAX_RESPONSE_SIZE: usize = 50 * 1024;

#[derive(Deserialize)]
struct FetchArgs {
    #[serde(default)]
    url: String,
    #[serde(default)]
    method: String,
    #[serde(default)]
    header: HashMap<String, String>,
}

pub struct HttpFetchTool {
    client: reqwest::Client,
    sandbox: Arc<Sandbox>,
}

impl HttpFetchTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, sandbox }
    }
}

#[async_trait]
impl Tool for HttpFetchTool {
    fn name(&self) -> &str {
        "http_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a URL via HTTP."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch."
                },
                "method": {
                    "type": "string",
                    "description": "HTTP method (GET, POST, etc.). Defaults to GET."
                },
                "header": {
                    "type": "object",
                    "description": "HTTP headers as key-value pairs.",
                    "additionalProperties": { "type": "string" }
                }
            },
            "required": ["url"]
        })
    }

    async fn invoke(
        &self,
        _ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<ToolOutput, WaynebotError> {
        let args: FetchArgs = parse_args(input)?;
        if args.url.is_empty() {
            return Err(WaynebotError::Tool("url is required".into()));
        }
        let method = if args.method.is_empty() {
            reqwest::Method::GET
        } else {
            args.method
                .to_uppercase()
                .parse::<reqwest::Method>()
                .map_err(|e| WaynebotError::Tool(format!("create request: {e}")))?
        };

        let url = reqwest::Url::parse(&args.url)
            .map_err(|e| WaynebotError::Tool(format!("invalid url: {e}")))?;
        let host = url
            .host_str()
            .unwrap_or_default()
            .trim_start_matches('[')
            .trim_end_matches(']');
        if self.sandbox.is_host_blocked(host) {
            return Err(WaynebotError::Tool(format!("host {host:?} is blocked")));
        }

        let mut request = self.client.request(method, url.clone());
        for (key, value) in &args.header {
            request = request.header(key.as_str(), value.as_str());
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| WaynebotError::Tool(format!("fetch: {e}")))?;
        let status = response.status();

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| WaynebotError::Tool(format!("read body: {e}")))?
        {
            body.extend_from_slice(&chunk);
            if body.len() > MAX_RESPONSE_SIZE {
                break;
            }
        }
        let text = String::from_utf8_lossy(&body);
        let result = truncate_with_marker(&text, MAX_RESPONSE_SIZE, "\n... response truncated");

        if status.as_u16() >= 400 {
            return Ok(ToolOutput::failed(result, format!("HTTP {}", status.as_u16())));
        }
        Ok(ToolOutput::ok(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn open_tool() -> HttpFetchTool {
        let mut sb = Sandbox::new("/tmp");
        sb.blocked_hosts.clear();
        HttpFetchTool::new(Arc::new(sb))
    }

    #[tokio::test]
    async fn get_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hi there"))
            .mount(&server)
            .await;

        let out = open_tool()
            .invoke(
                &ToolContext::default(),
                serde_json::json!({"url": format!("{}/hello", server.uri())}),
            )
            .await
            .unwrap();
        assert_eq!(out, ToolOutput::ok("hi there"));
    }

    #[tokio::test]
    async fn sends_method_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("x-token", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let out = open_tool()
            .invoke(
                &ToolContext::default(),
                serde_json::json!({
                    "url": format!("{}/hook", server.uri()),
                    "method": "post",
                    "header": {"x-token": "abc"}
                }),
            )
            .await
            .unwrap();
        assert_eq!(out.content, "ok");
    }

    #[tokio::test]
    async fn error_status_returns_body_and_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&server)
            .await;

        let out = open_tool()
            .invoke(
                &ToolContext::default(),
                serde_json::json!({"url": server.uri()}),
            )
            .await
            .unwrap();
        assert_eq!(out, ToolOutput::failed("nope", "HTTP 404"));
    }

    #[tokio::test]
    async fn large_body_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("x".repeat(MAX_RESPONSE_SIZE * 2)),
            )
            .mount(&server)
            .await;

        let out = open_tool()
            .invoke(
                &ToolContext::default(),
                serde_json::json!({"url": server.uri()}),
            )
            .await
            .unwrap();
        assert!(out.content.ends_with("\n... response truncated"));
        assert_eq!(
            out.content.len(),
            MAX_RESPONSE_SIZE + "\n... response truncated".len()
        );
    }

    #[tokio::test]
    async fn default_blocklist_rejects_metadata_and_loopback() {
        let tool = HttpFetchTool::new(Arc::new(Sandbox::new("/tmp")));
        for url in [
            "http://169.254.169.254/latest/meta-data",
            "http://localhost:8080/",
            "http://[::1]/",
        ] {
            let err = tool
                .invoke(&ToolContext::default(), serde_json::json!({"url": url}))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("is blocked"), "{url}");
        }
    }

    #[tokio::test]
    async fn url_is_required() {
        let err = open_tool()
            .invoke(&ToolContext::default(), serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "url is required");
    }
}
