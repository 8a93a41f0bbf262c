//! Orchestrates gate → path substitution → retrying HTTP send for management-API calls.

use std::collections::BTreeMap;

use crate::api::client::ApiClient;
use crate::error::{GatewayError, Result};
use crate::risk::ClientKind;
use crate::safety::{ApiOperation, Decision, Operation, SafetyManager};

/// Closed set of placeholder names the path substitution step recognizes.
const KNOWN_PLACEHOLDERS: &[&str] = &[
    "ref",
    "function_slug",
    "id",
    "slug",
    "branch_id",
    "provider_id",
    "tpa_id",
];

#[derive(Debug)]
pub enum ApiOutcome {
    Completed(serde_json::Value),
    ConfirmationRequired { token: String },
}

pub struct ApiManager {
    safety: std::sync::Arc<SafetyManager>,
    client: ApiClient,
    project_ref: String,
}

impl ApiManager {
    pub fn new(safety: std::sync::Arc<SafetyManager>, client: ApiClient, project_ref: impl Into<String>) -> Self {
        Self {
            safety,
            client,
            project_ref: project_ref.into(),
        }
    }

    pub async fn execute(
        &self,
        method: &str,
        path: &str,
        path_params: BTreeMap<String, String>,
        query_params: BTreeMap<String, String>,
        body: Option<serde_json::Value>,
        confirmed: bool,
    ) -> Result<ApiOutcome> {
        let op = ApiOperation {
            method: method.to_string(),
            path: path.to_string(),
            path_params: path_params.clone(),
            query_params: query_params.clone(),
            body: body.clone(),
        };

        let decision = self
            .safety
            .validate_op(ClientKind::Api, Operation::Api(op), confirmed)?;

        let Decision::Ok = decision else {
            let Decision::ConfirmationRequired { token } = decision else {
                unreachable!("validate_op only returns Ok or ConfirmationRequired");
            };
            return Ok(ApiOutcome::ConfirmationRequired { token });
        };

        if path_params.contains_key("ref") {
            return Err(GatewayError::UnknownPathPlaceholder("ref".to_string()));
        }

        let mut merged = path_params;
        merged.insert("ref".to_string(), self.project_ref.clone());
        let substituted = substitute_path(path, &merged)?;

        let json = self.client.send(method, &substituted, &query_params, body.as_ref()).await?;
        Ok(ApiOutcome::Completed(json))
    }

    pub async fn handle_confirmation(&self, token: &str) -> Result<ApiOutcome> {
        let op = self.safety.take(token)?;
        let Operation::Api(api_op) = op else {
            return Err(GatewayError::UnknownConfirmation);
        };
        self.execute(
            &api_op.method,
            &api_op.path,
            api_op.path_params,
            api_op.query_params,
            api_op.body,
            true,
        )
        .await
    }
}

/// Replaces every `{name}` segment with its value from `params`. Fails if a
/// placeholder isn't in the closed set, or if any remain unsubstituted.
fn substitute_path(path: &str, params: &BTreeMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let Some(end_rel) = rest[start..].find('}') else {
            return Err(GatewayError::MissingPathPlaceholder(rest[start + 1..].to_string()));
        };
        let end = start + end_rel;
        let name = &rest[start + 1..end];

        if !KNOWN_PLACEHOLDERS.contains(&name) {
            return Err(GatewayError::UnknownPathPlaceholder(name.to_string()));
        }

        match params.get(name) {
            Some(value) => out.push_str(value),
            None => return Err(GatewayError::MissingPathPlaceholder(name.to_string())),
        }

        rest = &rest[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_placeholders() {
        let mut params = BTreeMap::new();
        params.insert("ref".to_string(), "abcdefghijklmnopqrst".to_string());
        params.insert("function_slug".to_string(), "hello".to_string());
        let out = substitute_path("/v1/projects/{ref}/functions/{function_slug}", &params).unwrap();
        assert_eq!(out, "/v1/projects/abcdefghijklmnopqrst/functions/hello");
    }

    #[test]
    fn missing_placeholder_fails() {
        let params = BTreeMap::new();
        let err = substitute_path("/v1/projects/{ref}/functions/{function_slug}", &params).unwrap_err();
        assert!(matches!(err, GatewayError::MissingPathPlaceholder(name) if name == "ref"));
    }

    #[test]
    fn unknown_placeholder_fails() {
        let mut params = BTreeMap::new();
        params.insert("made_up".to_string(), "x".to_string());
        let err = substitute_path("/v1/widgets/{made_up}", &params).unwrap_err();
        assert!(matches!(err, GatewayError::UnknownPathPlaceholder(name) if name == "made_up"));
    }

    #[tokio::test]
    async fn caller_supplied_ref_is_refused() {
        let safety = std::sync::Arc::new(SafetyManager::new());
        let client = ApiClient::new("https://api.example.com", Some("token".into())).unwrap();
        let manager = ApiManager::new(safety, client, "abcdefghijklmnopqrst");

        let mut path_params = BTreeMap::new();
        path_params.insert("ref".to_string(), "sneaky".to_string());
        let err = manager
            .execute("GET", "/v1/projects/{ref}", path_params, BTreeMap::new(), None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnknownPathPlaceholder(name) if name == "ref"));
    }

    #[tokio::test]
    async fn extreme_delete_project_is_never_allowed() {
        let safety = std::sync::Arc::new(SafetyManager::new());
        safety.set_mode(ClientKind::Api, crate::risk::SafetyMode::Unsafe);
        let client = ApiClient::new("https://api.example.com", Some("token".into())).unwrap();
        let manager = ApiManager::new(safety, client, "abcdefghijklmnopqrst");

        let err = manager
            .execute("DELETE", "/v1/projects/{ref}", BTreeMap::new(), BTreeMap::new(), None, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::NotAllowed {
                risk: crate::risk::RiskLevel::Extreme,
                ..
            }
        ));
    }
}
