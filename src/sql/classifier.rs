//! Node-type → classification lookup table.
//!
//! This is the normative truth of the classifier: a closed mapping from a
//! Postgres parse-tree node to `{category, command, risk, needs_migration,
//! object_type, schema}`. The table shape follows `pg_query`'s `NodeEnum`,
//! which mirrors PostgreSQL's own `parsenodes.h` node set (the same nodes
//! `fankaiLiu-pgorm`'s `sql_analysis.rs` pattern-matches against).

use pg_query::protobuf::RangeVar;
use pg_query::NodeEnum;

use crate::risk::RiskLevel;
use crate::sql::{SqlCategory, SqlCommand};

/// Partial classification produced for a single parse-tree node; the caller
/// (the validator) fills in `text` once the node's source span is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: SqlCategory,
    pub command: SqlCommand,
    pub risk: RiskLevel,
    pub needs_migration: bool,
    pub object_type: Option<String>,
    pub schema: String,
}

const DEFAULT_SCHEMA: &str = "public";

fn schema_of(rv: &RangeVar) -> String {
    if rv.schemaname.is_empty() {
        DEFAULT_SCHEMA.to_string()
    } else {
        rv.schemaname.clone()
    }
}

fn schema_from_str(s: &str) -> String {
    if s.is_empty() {
        DEFAULT_SCHEMA.to_string()
    } else {
        s.to_string()
    }
}

/// Schema-qualified name parts as pg_query represents them: a list of
/// `String` leaf nodes, e.g. `["myschema", "my_func"]` for `myschema.my_func`.
fn schema_from_qualified_name(parts: &[pg_query::Node]) -> String {
    if parts.len() >= 2 {
        if let Some(NodeEnum::String(s)) = parts[0].node.as_ref() {
            return schema_from_str(&s.sval);
        }
    }
    DEFAULT_SCHEMA.to_string()
}

fn ddl(object_type: impl Into<String>, schema: String, command: SqlCommand) -> Classification {
    Classification {
        category: SqlCategory::Ddl,
        command,
        risk: RiskLevel::Medium,
        needs_migration: true,
        object_type: Some(object_type.into()),
        schema,
    }
}

fn dcl(object_type: impl Into<String>, schema: String, command: SqlCommand) -> Classification {
    Classification {
        category: SqlCategory::Dcl,
        command,
        risk: RiskLevel::Medium,
        needs_migration: true,
        object_type: Some(object_type.into()),
        schema,
    }
}

fn destructive_ddl(
    object_type: impl Into<String>,
    schema: String,
    command: SqlCommand,
) -> Classification {
    Classification {
        category: SqlCategory::Ddl,
        command,
        risk: RiskLevel::High,
        needs_migration: true,
        object_type: Some(object_type.into()),
        schema,
    }
}

fn unknown_node() -> Classification {
    Classification {
        category: SqlCategory::Other,
        command: SqlCommand::Unknown,
        risk: RiskLevel::Medium,
        needs_migration: false,
        object_type: None,
        schema: DEFAULT_SCHEMA.to_string(),
    }
}

/// Classifies a single top-level statement node. Fails safe: any node type
/// not explicitly covered below is treated as `OTHER`/`MEDIUM`, never `LOW`.
pub fn classify_node(node: &NodeEnum) -> Classification {
    match node {
        NodeEnum::SelectStmt(_) => Classification {
            category: SqlCategory::Dql,
            command: SqlCommand::Select,
            risk: RiskLevel::Low,
            needs_migration: false,
            object_type: None,
            schema: DEFAULT_SCHEMA.to_string(),
        },
        NodeEnum::ExplainStmt(_) => Classification {
            category: SqlCategory::Dql,
            command: SqlCommand::Explain,
            risk: RiskLevel::Low,
            needs_migration: false,
            object_type: None,
            schema: DEFAULT_SCHEMA.to_string(),
        },

        NodeEnum::InsertStmt(s) => {
            let schema = s.relation.as_ref().map(|r| schema_of(r)).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            Classification {
                category: SqlCategory::Dml,
                command: SqlCommand::Insert,
                risk: RiskLevel::Medium,
                needs_migration: false,
                object_type: Some("table".into()),
                schema,
            }
        }
        NodeEnum::UpdateStmt(s) => {
            let schema = s.relation.as_ref().map(|r| schema_of(r)).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            Classification {
                category: SqlCategory::Dml,
                command: SqlCommand::Update,
                risk: RiskLevel::Medium,
                needs_migration: false,
                object_type: Some("table".into()),
                schema,
            }
        }
        NodeEnum::DeleteStmt(s) => {
            let schema = s.relation.as_ref().map(|r| schema_of(r)).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            Classification {
                category: SqlCategory::Dml,
                command: SqlCommand::Delete,
                risk: RiskLevel::Medium,
                needs_migration: false,
                object_type: Some("table".into()),
                schema,
            }
        }
        NodeEnum::MergeStmt(s) => {
            let schema = s.relation.as_ref().map(|r| schema_of(r)).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            Classification {
                category: SqlCategory::Dml,
                command: SqlCommand::Merge,
                risk: RiskLevel::Medium,
                needs_migration: false,
                object_type: Some("table".into()),
                schema,
            }
        }

        // COPY is resolved by direction: TO (read-out) is DQL/LOW, FROM (load) is DML/MEDIUM.
        NodeEnum::CopyStmt(s) => {
            let schema = s.relation.as_ref().map(|r| schema_of(r)).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            if s.is_from {
                Classification {
                    category: SqlCategory::Dml,
                    command: SqlCommand::Copy,
                    risk: RiskLevel::Medium,
                    needs_migration: false,
                    object_type: Some("table".into()),
                    schema,
                }
            } else {
                Classification {
                    category: SqlCategory::Dql,
                    command: SqlCommand::Copy,
                    risk: RiskLevel::Low,
                    needs_migration: false,
                    object_type: Some("table".into()),
                    schema,
                }
            }
        }

        // --- Schema-changing DDL (reversible-ish): MEDIUM, migration required ---
        NodeEnum::CreateStmt(s) => {
            let schema = s.relation.as_ref().map(|r| schema_of(r)).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            ddl("table", schema, SqlCommand::Create)
        }
        NodeEnum::AlterTableStmt(s) => {
            let schema = s.relation.as_ref().map(|r| schema_of(r)).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            ddl("table", schema, SqlCommand::Alter)
        }
        NodeEnum::IndexStmt(s) => {
            let schema = s.relation.as_ref().map(|r| schema_of(r)).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            ddl("index", schema, SqlCommand::Create)
        }
        NodeEnum::ViewStmt(s) => {
            let schema = s.view.as_ref().map(|r| schema_of(r)).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            ddl("view", schema, SqlCommand::Create)
        }
        NodeEnum::CreateFunctionStmt(s) => {
            let schema = schema_from_qualified_name(&s.funcname);
            ddl("function", schema, SqlCommand::Create)
        }
        NodeEnum::CreateTrigStmt(s) => {
            let schema = s.relation.as_ref().map(|r| schema_of(r)).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            ddl("trigger", schema, SqlCommand::Create)
        }
        NodeEnum::CreateEnumStmt(s) => {
            let schema = schema_from_qualified_name(&s.type_name);
            ddl("type", schema, SqlCommand::Create)
        }
        NodeEnum::CompositeTypeStmt(s) => {
            let schema = s
                .typevar
                .as_ref()
                .map(|r| schema_of(r))
                .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            ddl("type", schema, SqlCommand::Create)
        }
        NodeEnum::CreateDomainStmt(s) => {
            let schema = schema_from_qualified_name(&s.domainname);
            ddl("domain", schema, SqlCommand::Create)
        }
        NodeEnum::CreateSeqStmt(s) => {
            let schema = s.sequence.as_ref().map(|r| schema_of(r)).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            ddl("sequence", schema, SqlCommand::Create)
        }
        NodeEnum::CreateForeignTableStmt(s) => {
            let schema = s
                .base_stmt
                .as_ref()
                .and_then(|base| base.relation.as_ref())
                .map(|r| schema_of(r))
                .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            ddl("foreign_table", schema, SqlCommand::Create)
        }
        NodeEnum::CreatePolicyStmt(s) => {
            let schema = s.table.as_ref().map(|r| schema_of(r)).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            ddl("policy", schema, SqlCommand::Create)
        }
        NodeEnum::CreateExtensionStmt(_) => ddl("extension", DEFAULT_SCHEMA.to_string(), SqlCommand::Create),
        NodeEnum::CreateSchemaStmt(s) => {
            let schema = schema_from_str(&s.schemaname);
            ddl("schema", schema, SqlCommand::Create)
        }
        NodeEnum::CommentStmt(_) => ddl("comment", DEFAULT_SCHEMA.to_string(), SqlCommand::Comment),
        NodeEnum::RenameStmt(s) => {
            let schema = s.relation.as_ref().map(|r| schema_of(r)).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            ddl("object", schema, SqlCommand::Rename)
        }
        NodeEnum::AlterEnumStmt(s) => {
            let schema = schema_from_qualified_name(&s.type_name);
            ddl("type", schema, SqlCommand::Alter)
        }
        NodeEnum::AlterSeqStmt(s) => {
            let schema = s.sequence.as_ref().map(|r| schema_of(r)).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            ddl("sequence", schema, SqlCommand::Alter)
        }
        NodeEnum::AlterOwnerStmt(_) => ddl("object", DEFAULT_SCHEMA.to_string(), SqlCommand::Alter),
        NodeEnum::AlterObjectSchemaStmt(s) => {
            let schema = s.relation.as_ref().map(|r| schema_of(r)).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            ddl("object", schema, SqlCommand::Alter)
        }

        // --- Destructive schema changes: HIGH, migration required ---
        NodeEnum::DropStmt(s) => {
            let object_type = drop_object_type(s.remove_type);
            let schema = first_drop_schema(&s.objects);
            destructive_ddl(object_type, schema, SqlCommand::Drop)
        }
        NodeEnum::TruncateStmt(s) => {
            let schema = s
                .relations
                .first()
                .and_then(|n| n.node.as_ref())
                .and_then(|n| match n {
                    NodeEnum::RangeVar(rv) => Some(schema_of(rv)),
                    _ => None,
                })
                .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
            destructive_ddl("table", schema, SqlCommand::Truncate)
        }
        NodeEnum::DropRoleStmt(_) => destructive_ddl("role", DEFAULT_SCHEMA.to_string(), SqlCommand::Drop),

        // --- Access control: MEDIUM, migration required ---
        NodeEnum::GrantStmt(s) => {
            let command = if s.is_grant {
                SqlCommand::Grant
            } else {
                SqlCommand::Revoke
            };
            dcl("privilege", DEFAULT_SCHEMA.to_string(), command)
        }
        NodeEnum::GrantRoleStmt(s) => {
            let command = if s.is_grant {
                SqlCommand::Grant
            } else {
                SqlCommand::Revoke
            };
            dcl("role", DEFAULT_SCHEMA.to_string(), command)
        }
        NodeEnum::CreateRoleStmt(_) => dcl("role", DEFAULT_SCHEMA.to_string(), SqlCommand::Create),
        NodeEnum::AlterRoleStmt(_) => dcl("role", DEFAULT_SCHEMA.to_string(), SqlCommand::Alter),

        // --- Transaction control: outer validator rejects any batch containing these ---
        NodeEnum::TransactionStmt(s) => {
            use pg_query::protobuf::TransactionStmtKind::*;
            let command = match s.kind() {
                TransStmtBegin | TransStmtStart => SqlCommand::Begin,
                TransStmtCommit => SqlCommand::Commit,
                TransStmtRollback => SqlCommand::Rollback,
                TransStmtSavepoint => SqlCommand::Savepoint,
                _ => SqlCommand::Unknown,
            };
            Classification {
                category: SqlCategory::Tcl,
                command,
                risk: RiskLevel::Low,
                needs_migration: false,
                object_type: None,
                schema: DEFAULT_SCHEMA.to_string(),
            }
        }

        // --- Postgres-specific ---
        NodeEnum::VacuumStmt(s) => {
            let (command, risk) = if s.is_vacuumcmd {
                (SqlCommand::Vacuum, RiskLevel::Medium)
            } else {
                (SqlCommand::Analyze, RiskLevel::Low)
            };
            Classification {
                category: SqlCategory::PostgresSpecific,
                command,
                risk,
                needs_migration: false,
                object_type: None,
                schema: DEFAULT_SCHEMA.to_string(),
            }
        }
        NodeEnum::ClusterStmt(_) | NodeEnum::CheckPointStmt(_) => Classification {
            category: SqlCategory::PostgresSpecific,
            command: SqlCommand::Vacuum,
            risk: RiskLevel::Medium,
            needs_migration: false,
            object_type: None,
            schema: DEFAULT_SCHEMA.to_string(),
        },
        NodeEnum::PrepareStmt(_) => postgres_specific(SqlCommand::Prepare, RiskLevel::Low),
        NodeEnum::DeallocateStmt(_) => postgres_specific(SqlCommand::Deallocate, RiskLevel::Low),
        NodeEnum::ListenStmt(_) => postgres_specific(SqlCommand::Listen, RiskLevel::Low),
        NodeEnum::NotifyStmt(_) => postgres_specific(SqlCommand::Notify, RiskLevel::Medium),
        NodeEnum::ExecuteStmt(_) => postgres_specific(SqlCommand::Execute, RiskLevel::Medium),

        // Fail safe: anything not explicitly named above.
        _ => unknown_node(),
    }
}

fn postgres_specific(command: SqlCommand, risk: RiskLevel) -> Classification {
    Classification {
        category: SqlCategory::PostgresSpecific,
        command,
        risk,
        needs_migration: false,
        object_type: None,
        schema: DEFAULT_SCHEMA.to_string(),
    }
}

fn drop_object_type(remove_type: i32) -> &'static str {
    use pg_query::protobuf::ObjectType::*;
    match pg_query::protobuf::ObjectType::try_from(remove_type).unwrap_or(ObjectTable) {
        ObjectTable => "table",
        ObjectIndex => "index",
        ObjectView => "view",
        ObjectMatview => "materialized_view",
        ObjectSequence => "sequence",
        ObjectFunction | ObjectProcedure | ObjectRoutine => "function",
        ObjectTrigger => "trigger",
        ObjectType => "type",
        ObjectDomain => "domain",
        ObjectSchema => "schema",
        ObjectExtension => "extension",
        ObjectForeignTable => "foreign_table",
        ObjectPolicy => "policy",
        _ => "object",
    }
}

fn first_drop_schema(objects: &[pg_query::Node]) -> String {
    for obj in objects {
        if let Some(NodeEnum::List(list)) = obj.node.as_ref() {
            if list.items.len() >= 2 {
                if let Some(NodeEnum::String(s)) = list.items[0].node.as_ref() {
                    return schema_from_str(&s.sval);
                }
            }
        }
    }
    DEFAULT_SCHEMA.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_first(sql: &str) -> NodeEnum {
        let parsed = pg_query::parse(sql).expect("valid SQL");
        parsed
            .protobuf
            .stmts
            .into_iter()
            .next()
            .and_then(|raw| raw.stmt)
            .and_then(|boxed| boxed.node)
            .expect("a statement node")
    }

    #[test]
    fn select_is_low_risk_dql() {
        let c = classify_node(&parse_first("SELECT 1"));
        assert_eq!(c.category, SqlCategory::Dql);
        assert_eq!(c.risk, RiskLevel::Low);
        assert!(!c.needs_migration);
    }

    #[test]
    fn insert_is_medium_risk_dml_without_migration() {
        let c = classify_node(&parse_first("INSERT INTO t(x) VALUES (1)"));
        assert_eq!(c.category, SqlCategory::Dml);
        assert_eq!(c.command, SqlCommand::Insert);
        assert_eq!(c.risk, RiskLevel::Medium);
        assert!(!c.needs_migration);
    }

    #[test]
    fn create_table_is_medium_ddl_with_migration() {
        let c = classify_node(&parse_first("CREATE TABLE t(id int)"));
        assert_eq!(c.category, SqlCategory::Ddl);
        assert_eq!(c.risk, RiskLevel::Medium);
        assert!(c.needs_migration);
        assert_eq!(c.object_type.as_deref(), Some("table"));
    }

    #[test]
    fn drop_table_is_high_risk() {
        let c = classify_node(&parse_first("DROP TABLE t"));
        assert_eq!(c.category, SqlCategory::Ddl);
        assert_eq!(c.command, SqlCommand::Drop);
        assert_eq!(c.risk, RiskLevel::High);
        assert!(c.needs_migration);
    }

    #[test]
    fn truncate_is_high_risk() {
        let c = classify_node(&parse_first("TRUNCATE t"));
        assert_eq!(c.risk, RiskLevel::High);
    }

    #[test]
    fn transaction_control_is_low_risk_tcl() {
        let c = classify_node(&parse_first("BEGIN"));
        assert_eq!(c.category, SqlCategory::Tcl);
        assert_eq!(c.risk, RiskLevel::Low);
    }

    #[test]
    fn grant_is_medium_dcl() {
        let c = classify_node(&parse_first("GRANT SELECT ON t TO alice"));
        assert_eq!(c.category, SqlCategory::Dcl);
        assert_eq!(c.command, SqlCommand::Grant);
        assert!(c.needs_migration);
    }

    #[test]
    fn copy_to_is_low_risk_read() {
        let c = classify_node(&parse_first("COPY t TO STDOUT"));
        assert_eq!(c.category, SqlCategory::Dql);
        assert_eq!(c.risk, RiskLevel::Low);
    }

    #[test]
    fn copy_from_is_medium_risk_write() {
        let c = classify_node(&parse_first("COPY t FROM STDIN"));
        assert_eq!(c.category, SqlCategory::Dml);
        assert_eq!(c.risk, RiskLevel::Medium);
    }

    #[test]
    fn vacuum_is_medium_analyze_is_low() {
        let vacuum = classify_node(&parse_first("VACUUM t"));
        assert_eq!(vacuum.risk, RiskLevel::Medium);
        let analyze = classify_node(&parse_first("ANALYZE t"));
        assert_eq!(analyze.risk, RiskLevel::Low);
    }

    #[test]
    fn schema_defaults_to_public() {
        let c = classify_node(&parse_first("CREATE TABLE t(id int)"));
        assert_eq!(c.schema, "public");
        let c = classify_node(&parse_first("CREATE TABLE myschema.t(id int)"));
        assert_eq!(c.schema, "myschema");
    }
}
