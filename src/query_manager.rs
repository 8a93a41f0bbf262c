//! Orchestrates validate → gate → record-migration → execute for SQL batches.

use crate::db::{BatchResult, PostgresExecutor};
use crate::error::{GatewayError, Result};
use crate::risk::{ClientKind, RiskLevel, SafetyMode};
use crate::safety::{Decision, Operation, SafetyManager};
use crate::sql::{derive_name, validate};

/// What handling a batch produced: either it ran, or it is waiting on the
/// caller to echo back a confirmation token.
#[derive(Debug)]
pub enum QueryOutcome {
    Executed(BatchResult),
    ConfirmationRequired { token: String, risk: RiskLevel },
}

pub struct QueryManager {
    safety: std::sync::Arc<SafetyManager>,
    executor: PostgresExecutor,
}

impl QueryManager {
    pub fn new(safety: std::sync::Arc<SafetyManager>, executor: PostgresExecutor) -> Self {
        Self { safety, executor }
    }

    /// Validates `text`, gates it through the safety manager, records a
    /// migration if the batch needs one, then executes.
    pub async fn handle(&self, text: &str, confirmed: bool, migration_name: Option<&str>) -> Result<QueryOutcome> {
        let validation = validate(text)?;
        let risk = validation.highest_risk();

        let decision = self.safety.validate_op(
            ClientKind::Database,
            Operation::Database(validation.clone()),
            confirmed,
        )?;

        let Decision::Ok = decision else {
            let Decision::ConfirmationRequired { token } = decision else {
                unreachable!("validate_op only returns Ok or ConfirmationRequired");
            };
            return Ok(QueryOutcome::ConfirmationRequired { token, risk });
        };

        if validation.needs_migration() {
            let (version, name) = derive_name(&validation, migration_name, chrono::Utc::now());
            self.executor
                .record_migration(&version, &name, &validation.original_text)
                .await;
        }

        let readonly = self.safety.mode(ClientKind::Database) == SafetyMode::Safe;
        let result = self.executor.execute(&validation, readonly).await?;
        Ok(QueryOutcome::Executed(result))
    }

    /// Redeems a confirmation token and re-enters `handle` with
    /// `confirmed = true`.
    pub async fn handle_confirmation(&self, token: &str) -> Result<QueryOutcome> {
        let op = self.safety.take(token)?;
        let Operation::Database(validation) = op else {
            return Err(GatewayError::UnknownConfirmation);
        };
        self.handle(&validation.original_text, true, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::SafetyMode;

    fn manager() -> QueryManager {
        let safety = std::sync::Arc::new(SafetyManager::new());
        let executor = PostgresExecutor::new("postgres://unused/unused");
        QueryManager::new(safety, executor)
    }

    #[tokio::test]
    async fn blocked_write_in_safe_mode_raises_not_allowed_without_db_contact() {
        let mgr = manager();
        let err = mgr
            .handle("INSERT INTO t(x) VALUES (1)", false, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::NotAllowed {
                risk: RiskLevel::Medium,
                mode: SafetyMode::Safe
            }
        ));
    }

    #[tokio::test]
    async fn rejected_tcl_never_reaches_the_safety_gate() {
        let mgr = manager();
        let err = mgr
            .handle("BEGIN; SELECT 1; COMMIT;", false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::TransactionControlRejected));
    }

    #[tokio::test]
    async fn destructive_ddl_in_unsafe_mode_requires_confirmation() {
        let mgr = manager();
        mgr.safety.set_mode(ClientKind::Database, SafetyMode::Unsafe);
        let outcome = mgr.handle("DROP TABLE t", false, None).await.unwrap();
        assert!(matches!(
            outcome,
            QueryOutcome::ConfirmationRequired {
                risk: RiskLevel::High,
                ..
            }
        ));
    }
}
