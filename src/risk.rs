//! Risk, mode and client-kind enumerations shared by every gating decision.
//!
//! These are the closed vocabularies the safety manager, the SQL classifier
//! and the API risk config all key off of. Kept tiny and dependency-free so
//! every other module can import them without pulling in `sql` or `api`.

use std::fmt;

/// Ordered risk label assigned to a classified operation.
///
/// Ordering matters: a batch's overall risk is the maximum of its members',
/// and the safety manager's decision table branches on this ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Extreme => write!(f, "EXTREME"),
        }
    }
}

/// Per-client permission mode. Every client kind starts SAFE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SafetyMode {
    Safe,
    Unsafe,
}

impl Default for SafetyMode {
    fn default() -> Self {
        Self::Safe
    }
}

impl fmt::Display for SafetyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "SAFE"),
            Self::Unsafe => write!(f, "UNSAFE"),
        }
    }
}

/// Which side of the gateway an operation is gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    Database,
    Api,
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database => write!(f, "DATABASE"),
            Self::Api => write!(f, "API"),
        }
    }
}
