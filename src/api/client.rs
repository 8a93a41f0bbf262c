//! Bearer-authenticated HTTP client with the shared network retry policy.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, Method};

use crate::error::{GatewayError, Result};
use crate::retry::RetryPolicy;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct ApiClient {
    http: Client,
    base_url: String,
    access_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, access_token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| GatewayError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            access_token,
        })
    }

    /// Sends a request, retrying only on transport-level network errors.
    /// Absence of an access token is an immediate client error before any
    /// I/O; non-2xx responses are classified, never retried.
    pub async fn send(
        &self,
        method: &str,
        path: &str,
        query_params: &BTreeMap<String, String>,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let token = self.access_token.as_ref().ok_or_else(|| GatewayError::ApiClientError {
            status: 401,
            body: "access token not configured".to_string(),
        })?;

        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| GatewayError::UnexpectedError(format!("invalid HTTP method: {method}")))?;
        let url = format!("{}{}", self.base_url, path);

        let response = RetryPolicy::NETWORK
            .run(
                || {
                    let mut req = self.http.request(method.clone(), &url).bearer_auth(token);
                    for (k, v) in query_params {
                        req = req.query(&[(k.as_str(), v.as_str())]);
                    }
                    if let Some(b) = body {
                        req = req.json(b);
                    }
                    async move { req.send().await }
                },
                |e: &reqwest::Error| e.is_connect() || e.is_timeout() || e.is_request(),
            )
            .await
            .map_err(|e| GatewayError::ApiConnectionError(format!("network error after 3 retry attempts: {e}")))?;

        classify_response(response).await
    }
}

async fn classify_response(response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| GatewayError::ApiResponseError(e.to_string()))?;

    let json: serde_json::Value = if text.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&text).map_err(|_| GatewayError::ApiResponseError(text.clone()))?
    };

    if status.is_success() {
        Ok(json)
    } else if status.is_client_error() {
        let message = json
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or(text);
        Err(GatewayError::ApiClientError {
            status: status.as_u16(),
            body: message,
        })
    } else if status.is_server_error() {
        Err(GatewayError::ApiServerError {
            status: status.as_u16(),
            body: text,
        })
    } else {
        Err(GatewayError::UnexpectedError(format!(
            "unexpected status {status}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_access_token_fails_before_any_network_io() {
        let client = ApiClient::new("https://api.example.com", None).unwrap();
        let err = client
            .send("GET", "/v1/projects", &BTreeMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::ApiClientError { status: 401, .. }
        ));
    }
}
