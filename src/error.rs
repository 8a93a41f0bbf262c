//! Error types for the gateway.
//!
//! One `thiserror`-derived enum covering every failure surface named in the
//! kernel design: input validation, safety gating, DB transport, HTTP
//! transport, configuration and the optional feature-access oracle.

use thiserror::Error;

use crate::risk::{RiskLevel, SafetyMode};

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    // --- Input / validation -------------------------------------------
    #[error("SQL batch is empty")]
    EmptyBatch,

    #[error("invalid SQL: {0}")]
    InvalidSql(String),

    #[error(
        "transaction control statements are not allowed; the executor wraps every batch \
         in its own transaction"
    )]
    TransactionControlRejected,

    #[error("invalid schema name: {0}")]
    InvalidSchemaName(String),

    #[error("invalid table name: {0}")]
    InvalidTableName(String),

    #[error("unknown path placeholder '{0}'")]
    UnknownPathPlaceholder(String),

    #[error("missing path placeholder '{0}'")]
    MissingPathPlaceholder(String),

    // --- Safety ----------------------------------------------------------
    #[error("operation not allowed: risk {risk} exceeds what {mode} mode permits")]
    NotAllowed { risk: RiskLevel, mode: SafetyMode },

    #[error(
        "confirmation required for a {risk} risk operation: re-submit with token '{token}' \
         within 300 seconds to proceed"
    )]
    ConfirmationRequired { token: String, risk: RiskLevel },

    #[error("confirmation token has expired")]
    ConfirmationExpired,

    #[error("unknown confirmation token")]
    UnknownConfirmation,

    // --- DB transport ------------------------------------------------------
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("permission denied: {0}. Enable UNSAFE mode to allow this operation.")]
    PermissionDenied(String),

    #[error("query error: {0}")]
    QueryError(String),

    // --- HTTP transport ------------------------------------------------
    #[error("API connection error: {0}")]
    ApiConnectionError(String),

    #[error("API client error ({status}): {body}")]
    ApiClientError { status: u16, body: String },

    #[error("API server error ({status}): {body}")]
    ApiServerError { status: u16, body: String },

    #[error("unexpected API response: {0}")]
    UnexpectedError(String),

    #[error("API response was not valid JSON: {0}")]
    ApiResponseError(String),

    // --- Feature access (optional oracle) -------------------------------
    #[error("feature '{0}' is not available on this project")]
    FeatureAccessDenied(String),

    #[error("feature access check for '{0}' could not be completed; try again")]
    FeatureCheckTemporary(String),

    // --- Configuration / internal ---------------------------------------
    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryError(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::EmptyBatch
            | Self::InvalidSql(_)
            | Self::TransactionControlRejected
            | Self::InvalidSchemaName(_)
            | Self::InvalidTableName(_)
            | Self::UnknownPathPlaceholder(_)
            | Self::MissingPathPlaceholder(_) => "Validation Error",
            Self::NotAllowed { .. }
            | Self::ConfirmationRequired { .. }
            | Self::ConfirmationExpired
            | Self::UnknownConfirmation => "Safety Error",
            Self::ConnectionFailed(_) | Self::PermissionDenied(_) | Self::QueryError(_) => {
                "Database Error"
            }
            Self::ApiConnectionError(_)
            | Self::ApiClientError { .. }
            | Self::ApiServerError { .. }
            | Self::UnexpectedError(_)
            | Self::ApiResponseError(_) => "API Error",
            Self::FeatureAccessDenied(_) | Self::FeatureCheckTemporary(_) => "Feature Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;
