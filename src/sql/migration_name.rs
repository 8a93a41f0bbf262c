//! Derives a stable, descriptive migration name from a classified batch.
//!
//! Regex-based extraction is spec-accurate but brittle by construction; it
//! is isolated behind `extract_object_name` so a future parse-tree-driven
//! rewrite can replace it without touching the recorder or the caller.

use md5::{Digest, Md5};
use regex::Regex;
use std::sync::OnceLock;

use crate::sql::{ClassifiedStatement, SqlCategory, ValidationResult};

/// Timestamp format for migration versions: `YYYYMMDDHHMMSS`.
pub fn format_version(now: chrono::DateTime<chrono::Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// Sanitizes a raw name into the closed migration-name alphabet: lowercase,
/// `[A-Za-z0-9_ ]` only, runs of whitespace collapsed to `_`, truncated to
/// 100 characters. Idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(name: &str) -> String {
    let lowered = name.to_lowercase();
    let filtered: String = lowered
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    let mut collapsed = String::with_capacity(filtered.len());
    let mut last_was_space = false;
    for c in filtered.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                collapsed.push('_');
            }
            last_was_space = true;
        } else {
            collapsed.push(c);
            last_was_space = false;
        }
    }

    collapsed.chars().take(100).collect()
}

fn short_hash(text: &str) -> String {
    let digest = Md5::digest(text.as_bytes());
    digest.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

/// Derives `(version, name)` for a validation result. If the caller supplied
/// a non-empty name it is sanitized and used directly; otherwise a
/// descriptive name is composed from the first migration-bearing statement,
/// falling back to a content hash if none is found.
pub fn derive_name(
    result: &ValidationResult,
    client_supplied_name: Option<&str>,
    now: chrono::DateTime<chrono::Utc>,
) -> (String, String) {
    let version = format_version(now);

    if let Some(name) = client_supplied_name {
        if !name.trim().is_empty() {
            return (version, sanitize(name));
        }
    }

    let name = match result.first_migration_statement() {
        Some(stmt) => generate_descriptive_name(stmt),
        None => format!("migration_{}", short_hash(&result.original_text)),
    };

    (version, name)
}

fn generate_descriptive_name(stmt: &ClassifiedStatement) -> String {
    match stmt.category {
        SqlCategory::Ddl => generate_ddl_name(stmt),
        SqlCategory::Dml => generate_dml_name(stmt),
        SqlCategory::Dcl => generate_dcl_name(stmt),
        _ => generate_generic_name(stmt),
    }
}

fn generate_ddl_name(stmt: &ClassifiedStatement) -> String {
    let command = stmt.command.to_string().to_lowercase();
    let schema = stmt.schema.to_lowercase();
    let object_type = stmt.object_type.as_deref().unwrap_or("object");
    let object_name = extract_object_name(object_type, &stmt.text);
    sanitize(&format!("{command}_{object_type}_{schema}_{object_name}"))
}

fn generate_dml_name(stmt: &ClassifiedStatement) -> String {
    let command = stmt.command.to_string().to_lowercase();
    let schema = stmt.schema.to_lowercase();
    let table_name = extract_object_name("table", &stmt.text);

    if command == "update" {
        if let Some(columns) = extract_update_columns(&stmt.text) {
            return sanitize(&format!("{command}_{columns}_in_{schema}_{table_name}"));
        }
    }

    sanitize(&format!("{command}_{schema}_{table_name}"))
}

fn generate_dcl_name(stmt: &ClassifiedStatement) -> String {
    let command = stmt.command.to_string().to_lowercase();
    let schema = stmt.schema.to_lowercase();
    let privilege = extract_privilege(&stmt.text);
    let object_name = extract_dcl_object_name(&stmt.text);
    sanitize(&format!("{command}_{privilege}_{schema}_{object_name}"))
}

fn generate_generic_name(stmt: &ClassifiedStatement) -> String {
    let command = stmt.command.to_string().to_lowercase();
    let schema = stmt.schema.to_lowercase();
    let object_type = stmt.object_type.as_deref().unwrap_or("object");
    sanitize(&format!("{command}_{schema}_{object_type}"))
}

fn cached_regex(cell: &OnceLock<Regex>, pattern: &str) -> &Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex is valid"))
}

/// Extracts the object's name from raw SQL text using a small family of
/// regexes keyed by `object_type`. Falls back to `"unknown"`.
pub fn extract_object_name(object_type: &str, text: &str) -> String {
    static TABLE: OnceLock<Regex> = OnceLock::new();
    static FUNCTION: OnceLock<Regex> = OnceLock::new();
    static TRIGGER: OnceLock<Regex> = OnceLock::new();
    static VIEW: OnceLock<Regex> = OnceLock::new();
    static MATVIEW: OnceLock<Regex> = OnceLock::new();
    static INDEX: OnceLock<Regex> = OnceLock::new();
    static SEQUENCE: OnceLock<Regex> = OnceLock::new();
    static CONSTRAINT: OnceLock<Regex> = OnceLock::new();
    static FOREIGN_TABLE: OnceLock<Regex> = OnceLock::new();
    static EXTENSION: OnceLock<Regex> = OnceLock::new();
    static TYPE: OnceLock<Regex> = OnceLock::new();
    static DOMAIN: OnceLock<Regex> = OnceLock::new();
    static GENERIC: OnceLock<Regex> = OnceLock::new();

    let captured = match object_type {
        "table" => cached_regex(
            &TABLE,
            r"(?i)(?:CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?|ALTER\s+TABLE\s+|DROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?|INSERT\s+INTO\s+|UPDATE\s+|DELETE\s+FROM\s+)(?:(\w+)\.)?(\w+)",
        )
        .captures(text),
        "function" | "procedure" => cached_regex(
            &FUNCTION,
            r"(?i)(?:CREATE|ALTER|DROP)\s+(?:OR\s+REPLACE\s+)?(?:FUNCTION|PROCEDURE)\s+(?:(\w+)\.)?(\w+)",
        )
        .captures(text),
        "trigger" => cached_regex(
            &TRIGGER,
            r"(?i)(?:CREATE|ALTER|DROP)\s+TRIGGER\s+(?:IF\s+(?:NOT\s+)?EXISTS\s+)?(\w+)",
        )
        .captures(text),
        "view" => cached_regex(
            &VIEW,
            r"(?i)(?:CREATE|ALTER|DROP)\s+(?:OR\s+REPLACE\s+)?VIEW\s+(?:(\w+)\.)?(\w+)",
        )
        .captures(text),
        "materialized_view" => cached_regex(
            &MATVIEW,
            r"(?i)(?:CREATE|ALTER|DROP)\s+MATERIALIZED\s+VIEW\s+(?:IF\s+(?:NOT\s+)?EXISTS\s+)?(?:(\w+)\.)?(\w+)",
        )
        .captures(text),
        "index" => cached_regex(
            &INDEX,
            r"(?i)(?:CREATE\s+(?:UNIQUE\s+)?|DROP\s+)INDEX\s+(?:IF\s+(?:NOT\s+)?EXISTS\s+)?(?:(\w+)\.)?(\w+)",
        )
        .captures(text),
        "sequence" => cached_regex(
            &SEQUENCE,
            r"(?i)(?:CREATE|ALTER|DROP)\s+SEQUENCE\s+(?:IF\s+(?:NOT\s+)?EXISTS\s+)?(?:(\w+)\.)?(\w+)",
        )
        .captures(text),
        "constraint" => cached_regex(&CONSTRAINT, r"(?i)CONSTRAINT\s+(\w+)").captures(text),
        "foreign_table" => cached_regex(
            &FOREIGN_TABLE,
            r"(?i)(?:CREATE|ALTER|DROP)\s+FOREIGN\s+TABLE\s+(?:IF\s+(?:NOT\s+)?EXISTS\s+)?(?:(\w+)\.)?(\w+)",
        )
        .captures(text),
        "extension" => cached_regex(
            &EXTENSION,
            r"(?i)CREATE\s+EXTENSION\s+(?:IF\s+NOT\s+EXISTS\s+)?(\w+)",
        )
        .captures(text),
        "type" => cached_regex(
            &TYPE,
            r"(?i)(?:CREATE|ALTER|DROP)\s+TYPE\s+(?:(\w+)\.)?(\w+)",
        )
        .captures(text),
        "domain" => cached_regex(
            &DOMAIN,
            r"(?i)(?:CREATE|ALTER|DROP)\s+DOMAIN\s+(?:(\w+)\.)?(\w+)",
        )
        .captures(text),
        _ => cached_regex(&GENERIC, r"(?i)(?:(\w+)\.)?(\w+)\s*$").captures(text),
    };

    captured
        .and_then(|c| c.get(2).or_else(|| c.get(1)))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn extract_update_columns(text: &str) -> Option<String> {
    static SET_CLAUSE: OnceLock<Regex> = OnceLock::new();
    static COLUMN: OnceLock<Regex> = OnceLock::new();

    let set_re = cached_regex(
        &SET_CLAUSE,
        r"(?i)UPDATE\s+(?:\w+\.)?(?:\w+)\s+SET\s+([\w\s,=']+?)(?:\s+WHERE|$)",
    );
    let set_clause = set_re.captures(text)?.get(1)?.as_str();

    let col_re = cached_regex(&COLUMN, r"(\w+)\s*=");
    let columns: Vec<String> = col_re
        .captures_iter(set_clause)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_lowercase()))
        .collect();

    if columns.is_empty() {
        None
    } else if columns.len() <= 3 {
        Some(columns.join("_"))
    } else {
        Some(format!("{}_and_others", columns[0]))
    }
}

fn extract_privilege(text: &str) -> String {
    static PRIV: OnceLock<Regex> = OnceLock::new();
    let re = cached_regex(&PRIV, r"(?i)(?:GRANT|REVOKE)\s+([\w\s,]+?)\s+ON");
    let Some(privileges) = re.captures(text).and_then(|c| c.get(1)) else {
        return "privilege".to_string();
    };
    let lowered = privileges.as_str().to_lowercase();

    for candidate in ["all", "select", "insert", "update", "delete"] {
        if lowered.contains(candidate) {
            return candidate.to_string();
        }
    }
    "privilege".to_string()
}

fn extract_dcl_object_name(text: &str) -> String {
    static ON_OBJECT: OnceLock<Regex> = OnceLock::new();
    let re = cached_regex(&ON_OBJECT, r"(?i)ON\s+(?:TABLE\s+)?(?:(\w+)\.)?(\w+)");
    re.captures(text)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
