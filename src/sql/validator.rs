//! Batch validation: parse → classify every statement → batch-wide checks.

use crate::error::{GatewayError, Result};
use crate::sql::classifier::classify_node;
use crate::sql::{ClassifiedStatement, SqlCategory, ValidationResult};

/// Validates a full batch of (potentially multiple, semicolon-separated)
/// SQL statements and returns a `ValidationResult`, or fails with
/// `EmptyBatch`, `InvalidSql`, or `TransactionControlRejected`.
pub fn validate(text: &str) -> Result<ValidationResult> {
    if text.trim().is_empty() {
        return Err(GatewayError::EmptyBatch);
    }

    let parsed = pg_query::parse(text).map_err(|e| GatewayError::InvalidSql(e.to_string()))?;

    if parsed.protobuf.stmts.is_empty() {
        return Err(GatewayError::EmptyBatch);
    }

    let mut statements = Vec::with_capacity(parsed.protobuf.stmts.len());

    for raw in &parsed.protobuf.stmts {
        let Some(stmt) = raw.stmt.as_ref().and_then(|n| n.node.as_ref()) else {
            continue;
        };

        let start = raw.stmt_location.max(0) as usize;
        let len = raw.stmt_len;
        let span_text = if len > 0 {
            let end = (start + len as usize).min(text.len());
            text.get(start..end).unwrap_or(text).trim().to_string()
        } else {
            text.get(start..).unwrap_or(text).trim().to_string()
        };

        let classification = classify_node(stmt);
        statements.push(ClassifiedStatement {
            category: classification.category,
            command: classification.command,
            risk: classification.risk,
            needs_migration: classification.needs_migration,
            object_type: classification.object_type,
            schema: classification.schema,
            text: span_text,
        });
    }

    if statements.is_empty() {
        return Err(GatewayError::EmptyBatch);
    }

    if statements.iter().any(|s| s.category == SqlCategory::Tcl) {
        return Err(GatewayError::TransactionControlRejected);
    }

    Ok(ValidationResult {
        statements,
        original_text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskLevel;

    #[test]
    fn rejects_empty_batch() {
        assert!(matches!(validate(""), Err(GatewayError::EmptyBatch)));
        assert!(matches!(validate("   \n\t"), Err(GatewayError::EmptyBatch)));
    }

    #[test]
    fn rejects_invalid_sql() {
        let err = validate("SELEKT * FROM t").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSql(_)));
    }

    #[test]
    fn rejects_transaction_control() {
        let err = validate("BEGIN; SELECT 1; COMMIT;").unwrap_err();
        assert!(matches!(err, GatewayError::TransactionControlRejected));
    }

    #[test]
    fn single_safe_select() {
        let v = validate("SELECT 1 AS n").unwrap();
        assert_eq!(v.statements.len(), 1);
        assert_eq!(v.highest_risk(), RiskLevel::Low);
        assert!(!v.needs_migration());
    }

    #[test]
    fn batch_highest_risk_is_max_across_statements() {
        let v = validate("SELECT 1; DROP TABLE t;").unwrap();
        assert_eq!(v.statements.len(), 2);
        assert_eq!(v.highest_risk(), RiskLevel::High);
    }

    #[test]
    fn statement_text_is_exact_span() {
        let v = validate("SELECT 1; DROP TABLE t;").unwrap();
        assert!(v.statements[1].text.contains("DROP TABLE t"));
    }

    #[test]
    fn round_trip_on_text_is_a_no_op() {
        let v1 = validate("SELECT 1").unwrap();
        let v2 = validate(&v1.original_text).unwrap();
        assert_eq!(v1, v2);
    }
}
