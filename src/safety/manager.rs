//! Per-client mode, gating decisions, and the pending-confirmation store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64::Engine;
use rand::RngCore;

use crate::error::{GatewayError, Result};
use crate::risk::{ClientKind, RiskLevel, SafetyMode};
use crate::safety::api_rules::{ApiOperation, RuleTable};
use crate::sql::ValidationResult;

const T_CONF: Duration = Duration::from_secs(300);

/// The classified operation a confirmation token stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Database(ValidationResult),
    Api(ApiOperation),
}

/// A confirmation awaiting redemption.
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub client_kind: ClientKind,
    pub risk: RiskLevel,
    pub op: Operation,
    created_at: Instant,
}

impl PendingConfirmation {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > T_CONF
    }
}

/// Outcome of a gating decision, surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Ok,
    ConfirmationRequired { token: String },
}

struct State {
    mode: HashMap<ClientKind, SafetyMode>,
    pending: HashMap<String, PendingConfirmation>,
}

/// Process-lifetime singleton owning mode state, the API rule table, and
/// pending confirmations. All critical sections are short map operations
/// under a single mutex; no I/O holds the lock.
pub struct SafetyManager {
    state: Mutex<State>,
    api_rules: RuleTable,
}

impl Default for SafetyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyManager {
    pub fn new() -> Self {
        let mut mode = HashMap::new();
        mode.insert(ClientKind::Database, SafetyMode::default());
        mode.insert(ClientKind::Api, SafetyMode::default());
        Self {
            state: Mutex::new(State {
                mode,
                pending: HashMap::new(),
            }),
            api_rules: RuleTable::new(),
        }
    }

    pub fn mode(&self, kind: ClientKind) -> SafetyMode {
        let state = self.state.lock().expect("safety manager mutex poisoned");
        state.mode.get(&kind).copied().unwrap_or_default()
    }

    /// Idempotent write; does not clear pending confirmations.
    pub fn set_mode(&self, kind: ClientKind, mode: SafetyMode) {
        let mut state = self.state.lock().expect("safety manager mutex poisoned");
        state.mode.insert(kind, mode);
    }

    pub fn api_rules(&self) -> &RuleTable {
        &self.api_rules
    }

    /// The safety-gate decision function. `Ok(Decision::Ok)` permits the
    /// operation to proceed; `Ok(Decision::ConfirmationRequired)` surfaces a
    /// fresh token; `Err(NotAllowed)` is a hard denial.
    pub fn validate_op(&self, kind: ClientKind, op: Operation, confirmed: bool) -> Result<Decision> {
        let risk = self.risk_of(&op);
        let mode = self.mode(kind);

        match risk {
            RiskLevel::Low => Ok(Decision::Ok),
            RiskLevel::Medium => {
                if mode == SafetyMode::Unsafe {
                    Ok(Decision::Ok)
                } else {
                    Err(GatewayError::NotAllowed { risk, mode })
                }
            }
            RiskLevel::High => {
                if mode != SafetyMode::Unsafe {
                    return Err(GatewayError::NotAllowed { risk, mode });
                }
                if confirmed {
                    Ok(Decision::Ok)
                } else {
                    let token = self.store_pending(kind, risk, op);
                    Ok(Decision::ConfirmationRequired { token })
                }
            }
            RiskLevel::Extreme => Err(GatewayError::NotAllowed { risk, mode }),
        }
    }

    fn risk_of(&self, op: &Operation) -> RiskLevel {
        match op {
            Operation::Database(v) => v.highest_risk(),
            Operation::Api(api_op) => self.api_rules.risk_of(&api_op.method, &api_op.path),
        }
    }

    fn store_pending(&self, client_kind: ClientKind, risk: RiskLevel, op: Operation) -> String {
        let token = generate_token();
        let mut state = self.state.lock().expect("safety manager mutex poisoned");
        evict_expired(&mut state.pending);
        state.pending.insert(
            token.clone(),
            PendingConfirmation {
                client_kind,
                risk,
                op,
                created_at: Instant::now(),
            },
        );
        token
    }

    /// Redeems a token, returning the operation it stands for. Multi-shot:
    /// the entry survives redemption and is only removed on expiry. A token
    /// that was issued but has aged past the 300s window is distinguished
    /// from one that was never issued at all.
    pub fn take(&self, token: &str) -> Result<Operation> {
        let mut state = self.state.lock().expect("safety manager mutex poisoned");
        let now = Instant::now();
        match state.pending.get(token).cloned() {
            None => Err(GatewayError::UnknownConfirmation),
            Some(pending) if pending.is_expired(now) => {
                state.pending.remove(token);
                Err(GatewayError::ConfirmationExpired)
            }
            Some(pending) => Ok(pending.op),
        }
    }
}

fn evict_expired(pending: &mut HashMap<String, PendingConfirmation>) {
    let now = Instant::now();
    pending.retain(|_, entry| !entry.is_expired(now));
}

fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!(
        "conf_{}",
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::validate;
    use std::collections::BTreeMap;

    fn db_op(sql: &str) -> Operation {
        Operation::Database(validate(sql).unwrap())
    }

    fn api_op(method: &str, path: &str) -> Operation {
        Operation::Api(ApiOperation {
            method: method.to_string(),
            path: path.to_string(),
            path_params: BTreeMap::new(),
            query_params: BTreeMap::new(),
            body: None,
        })
    }

    #[test]
    fn low_risk_always_ok() {
        let mgr = SafetyManager::new();
        let decision = mgr
            .validate_op(ClientKind::Database, db_op("SELECT 1"), false)
            .unwrap();
        assert_eq!(decision, Decision::Ok);
    }

    #[test]
    fn medium_risk_blocked_in_safe_mode() {
        let mgr = SafetyManager::new();
        let err = mgr
            .validate_op(ClientKind::Database, db_op("INSERT INTO t(x) VALUES (1)"), false)
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::NotAllowed {
                risk: RiskLevel::Medium,
                mode: SafetyMode::Safe
            }
        ));
    }

    #[test]
    fn medium_risk_allowed_in_unsafe_mode() {
        let mgr = SafetyManager::new();
        mgr.set_mode(ClientKind::Database, SafetyMode::Unsafe);
        let decision = mgr
            .validate_op(ClientKind::Database, db_op("INSERT INTO t(x) VALUES (1)"), false)
            .unwrap();
        assert_eq!(decision, Decision::Ok);
    }

    #[test]
    fn high_risk_in_unsafe_mode_requires_confirmation_then_succeeds() {
        let mgr = SafetyManager::new();
        mgr.set_mode(ClientKind::Database, SafetyMode::Unsafe);
        let decision = mgr
            .validate_op(ClientKind::Database, db_op("DROP TABLE t"), false)
            .unwrap();
        let Decision::ConfirmationRequired { token } = decision else {
            panic!("expected confirmation request");
        };
        assert!(token.starts_with("conf_"));

        let redeemed = mgr.take(&token).unwrap();
        let Operation::Database(v) = redeemed else {
            panic!("expected a database operation");
        };
        let decision = mgr
            .validate_op(ClientKind::Database, Operation::Database(v), true)
            .unwrap();
        assert_eq!(decision, Decision::Ok);
    }

    #[test]
    fn extreme_risk_never_allowed() {
        let mgr = SafetyManager::new();
        mgr.set_mode(ClientKind::Api, SafetyMode::Unsafe);
        let err = mgr
            .validate_op(
                ClientKind::Api,
                api_op("DELETE", "/v1/projects/{ref}"),
                true,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::NotAllowed {
                risk: RiskLevel::Extreme,
                ..
            }
        ));
    }

    #[test]
    fn unknown_token_fails_redemption() {
        let mgr = SafetyManager::new();
        assert!(matches!(
            mgr.take("conf_does_not_exist"),
            Err(GatewayError::UnknownConfirmation)
        ));
    }

    #[test]
    fn aged_token_fails_redemption_with_expired_not_unknown() {
        let mgr = SafetyManager::new();
        let token = "conf_aged".to_string();
        {
            let mut state = mgr.state.lock().unwrap();
            state.pending.insert(
                token.clone(),
                PendingConfirmation {
                    client_kind: ClientKind::Database,
                    risk: RiskLevel::High,
                    op: db_op("DROP TABLE t"),
                    created_at: Instant::now() - Duration::from_secs(301),
                },
            );
        }
        assert!(matches!(
            mgr.take(&token),
            Err(GatewayError::ConfirmationExpired)
        ));
        // the expired entry is evicted on first failed redemption
        assert!(matches!(
            mgr.take(&token),
            Err(GatewayError::UnknownConfirmation)
        ));
    }

    #[test]
    fn token_is_multi_shot_within_window() {
        let mgr = SafetyManager::new();
        mgr.set_mode(ClientKind::Database, SafetyMode::Unsafe);
        let decision = mgr
            .validate_op(ClientKind::Database, db_op("DROP TABLE t"), false)
            .unwrap();
        let Decision::ConfirmationRequired { token } = decision else {
            panic!("expected confirmation request");
        };
        assert!(mgr.take(&token).is_ok());
        assert!(mgr.take(&token).is_ok());
    }

    #[test]
    fn tokens_are_unique_per_issuance() {
        let mgr = SafetyManager::new();
        mgr.set_mode(ClientKind::Database, SafetyMode::Unsafe);
        let mut tokens = std::collections::HashSet::new();
        for _ in 0..5 {
            let decision = mgr
                .validate_op(ClientKind::Database, db_op("DROP TABLE t"), false)
                .unwrap();
            let Decision::ConfirmationRequired { token } = decision else {
                panic!("expected confirmation request");
            };
            assert!(tokens.insert(token));
        }
    }

    #[test]
    fn mode_change_does_not_clear_pending() {
        let mgr = SafetyManager::new();
        mgr.set_mode(ClientKind::Database, SafetyMode::Unsafe);
        let decision = mgr
            .validate_op(ClientKind::Database, db_op("DROP TABLE t"), false)
            .unwrap();
        let Decision::ConfirmationRequired { token } = decision else {
            panic!("expected confirmation request");
        };
        mgr.set_mode(ClientKind::Database, SafetyMode::Safe);
        mgr.set_mode(ClientKind::Database, SafetyMode::Unsafe);
        assert!(mgr.take(&token).is_ok());
    }
}
