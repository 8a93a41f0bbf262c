//! SQL classification and validation.
//!
//! Consumes a Postgres-compatible parse tree (via the `pg_query` crate) and
//! turns a batch of statements into a `ValidationResult` the safety manager
//! and executor can act on without ever looking at SQL text again.

mod classifier;
mod migration_name;
mod validator;

pub use classifier::classify_node;
pub use migration_name::derive_name;
pub use validator::validate;

use std::fmt;

use crate::risk::RiskLevel;

/// SQL sub-language a statement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlCategory {
    Dql,
    Dml,
    Ddl,
    Tcl,
    Dcl,
    PostgresSpecific,
    Other,
}

impl fmt::Display for SqlCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Dql => "DQL",
            Self::Dml => "DML",
            Self::Ddl => "DDL",
            Self::Tcl => "TCL",
            Self::Dcl => "DCL",
            Self::PostgresSpecific => "POSTGRES_SPECIFIC",
            Self::Other => "OTHER",
        };
        write!(f, "{s}")
    }
}

/// Normalized SQL command, independent of the exact parse-tree node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlCommand {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    Create,
    Alter,
    Drop,
    Truncate,
    Comment,
    Rename,
    Grant,
    Revoke,
    Begin,
    Commit,
    Rollback,
    Savepoint,
    Vacuum,
    Analyze,
    Explain,
    Copy,
    Listen,
    Notify,
    Prepare,
    Execute,
    Deallocate,
    Unknown,
}

impl fmt::Display for SqlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Merge => "MERGE",
            Self::Create => "CREATE",
            Self::Alter => "ALTER",
            Self::Drop => "DROP",
            Self::Truncate => "TRUNCATE",
            Self::Comment => "COMMENT",
            Self::Rename => "RENAME",
            Self::Grant => "GRANT",
            Self::Revoke => "REVOKE",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Rollback => "ROLLBACK",
            Self::Savepoint => "SAVEPOINT",
            Self::Vacuum => "VACUUM",
            Self::Analyze => "ANALYZE",
            Self::Explain => "EXPLAIN",
            Self::Copy => "COPY",
            Self::Listen => "LISTEN",
            Self::Notify => "NOTIFY",
            Self::Prepare => "PREPARE",
            Self::Execute => "EXECUTE",
            Self::Deallocate => "DEALLOCATE",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// A single classified statement; immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedStatement {
    pub category: SqlCategory,
    pub command: SqlCommand,
    pub risk: RiskLevel,
    pub needs_migration: bool,
    pub object_type: Option<String>,
    pub schema: String,
    pub text: String,
}

impl ClassifiedStatement {
    /// Invariant check used by tests and debug assertions: DQL is always
    /// low-risk and never migration-bearing.
    pub fn upholds_dql_invariant(&self) -> bool {
        self.category != SqlCategory::Dql
            || (self.risk == RiskLevel::Low && !self.needs_migration)
    }
}

/// Result of validating a full batch of semicolon-separated statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub statements: Vec<ClassifiedStatement>,
    pub original_text: String,
}

impl ValidationResult {
    /// Highest risk across every statement in the batch.
    pub fn highest_risk(&self) -> RiskLevel {
        self.statements
            .iter()
            .map(|s| s.risk)
            .max()
            .unwrap_or(RiskLevel::Low)
    }

    /// True if any statement in the batch requires migration bookkeeping.
    pub fn needs_migration(&self) -> bool {
        self.statements.iter().any(|s| s.needs_migration)
    }

    /// The first statement that needs migration bookkeeping, if any.
    pub fn first_migration_statement(&self) -> Option<&ClassifiedStatement> {
        self.statements.iter().find(|s| s.needs_migration)
    }
}

/// The closed risk table for SQL commands, grouped by risk level — the SQL
/// counterpart to the API rule table's `introspect()`, surfaced by the same
/// `rules` command.
pub fn statement_type_table() -> std::collections::BTreeMap<RiskLevel, Vec<SqlCommand>> {
    use SqlCommand::*;

    let mut table: std::collections::BTreeMap<RiskLevel, Vec<SqlCommand>> = std::collections::BTreeMap::new();
    let entries = [
        (RiskLevel::Low, vec![
            Select, Explain, Begin, Commit, Rollback, Savepoint, Analyze, Prepare, Deallocate, Listen,
        ]),
        (RiskLevel::Medium, vec![
            Insert, Update, Delete, Merge, Copy, Create, Alter, Comment, Rename, Grant, Revoke, Vacuum,
            Notify, Execute,
        ]),
        (RiskLevel::High, vec![Drop, Truncate]),
    ];
    for (risk, commands) in entries {
        table.insert(risk, commands);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(category: SqlCategory, risk: RiskLevel, needs_migration: bool) -> ClassifiedStatement {
        ClassifiedStatement {
            category,
            command: SqlCommand::Unknown,
            risk,
            needs_migration,
            object_type: None,
            schema: "public".into(),
            text: "x".into(),
        }
    }

    #[test]
    fn highest_risk_is_max_of_members() {
        let result = ValidationResult {
            statements: vec![
                stmt(SqlCategory::Dql, RiskLevel::Low, false),
                stmt(SqlCategory::Ddl, RiskLevel::High, true),
                stmt(SqlCategory::Dml, RiskLevel::Medium, false),
            ],
            original_text: "x; y; z".into(),
        };
        assert_eq!(result.highest_risk(), RiskLevel::High);
    }

    #[test]
    fn needs_migration_true_if_any_member_does() {
        let result = ValidationResult {
            statements: vec![
                stmt(SqlCategory::Dql, RiskLevel::Low, false),
                stmt(SqlCategory::Ddl, RiskLevel::Medium, true),
            ],
            original_text: "x; y".into(),
        };
        assert!(result.needs_migration());
    }

    #[test]
    fn dql_invariant_rejects_risky_dql() {
        let bad = stmt(SqlCategory::Dql, RiskLevel::Medium, false);
        assert!(!bad.upholds_dql_invariant());
        let good = stmt(SqlCategory::Dql, RiskLevel::Low, false);
        assert!(good.upholds_dql_invariant());
    }
}
