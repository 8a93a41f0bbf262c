//! An injectable feature-access oracle.
//!
//! Off by default: with nothing injected, every feature is granted and no
//! network call is made. When an operator wires in an HTTP-backed oracle,
//! the query/API managers can gate individual operations behind it.

use async_trait::async_trait;

use crate::error::{GatewayError, Result};

#[async_trait]
pub trait FeatureAccessOracle: Send + Sync {
    /// Returns `Ok(())` if `feature_name` is available, `Err(FeatureAccessDenied)`
    /// if it is not, or `Err(FeatureCheckTemporary)` if the oracle itself
    /// could not be reached (callers may retry).
    async fn check(&self, feature_name: &str) -> Result<()>;
}

/// The default oracle: always grants access, used when no access-control
/// backend is configured.
pub struct AlwaysGranted;

#[async_trait]
impl FeatureAccessOracle for AlwaysGranted {
    async fn check(&self, _feature_name: &str) -> Result<()> {
        Ok(())
    }
}

/// HTTP-backed oracle querying a feature-flag endpoint on the management API.
pub struct HttpFeatureAccessOracle {
    base_url: String,
    access_token: String,
    http: reqwest::Client,
}

impl HttpFeatureAccessOracle {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl FeatureAccessOracle for HttpFeatureAccessOracle {
    async fn check(&self, feature_name: &str) -> Result<()> {
        let url = format!("{}/platform/features/{feature_name}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|_| GatewayError::FeatureCheckTemporary(feature_name.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::FeatureCheckTemporary(feature_name.to_string()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|_| GatewayError::FeatureCheckTemporary(feature_name.to_string()))?;

        let granted = body.get("access_granted").and_then(|v| v.as_bool()).unwrap_or(false);
        if granted {
            Ok(())
        } else {
            Err(GatewayError::FeatureAccessDenied(feature_name.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_granted_never_denies() {
        let oracle = AlwaysGranted;
        assert!(oracle.check("sql.unsafe_mode").await.is_ok());
    }
}
