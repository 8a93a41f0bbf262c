//! Composes a BigQuery-style `WHERE` clause for the analytics log endpoint.

use std::collections::BTreeMap;

use crate::api::manager::{ApiManager, ApiOutcome};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct LogFilter {
    pub field: String,
    pub operator: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct LogQuery {
    pub collection: String,
    pub limit: u32,
    pub hours_ago: u32,
    pub filters: Vec<LogFilter>,
    pub search: String,
    pub custom_query: Option<String>,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            collection: "api_gateway".to_string(),
            limit: 20,
            hours_ago: 1,
            filters: Vec::new(),
            search: String::new(),
            custom_query: None,
        }
    }
}

/// Maps a log collection name to its underlying table, falling back to the
/// collection name itself when it is not one of the known collections.
fn table_name(collection: &str) -> String {
    match collection {
        "postgres" => "postgres_logs",
        "api_gateway" => "edge_logs",
        "auth" => "auth_logs",
        "postgrest" => "postgrest_logs",
        "pooler" => "supavisor_logs",
        "storage" => "storage_logs",
        "realtime" => "realtime_logs",
        "edge_functions" => "function_edge_logs",
        "cron" => "postgres_logs",
        "pgbouncer" => "pgbouncer_logs",
        other => return other.to_string(),
    }
    .to_string()
}

fn escape_single_quotes(text: &str) -> String {
    text.replace('\'', "''")
}

/// Conjoins the time bound, any field filters, and a LIKE search into a
/// single `WHERE`-clause body (without the `WHERE` keyword).
pub fn build_where_clause(query: &LogQuery) -> String {
    if let Some(custom) = &query.custom_query {
        if !custom.trim().is_empty() {
            return custom.clone();
        }
    }

    let table = table_name(&query.collection);
    let mut clauses = vec![format!(
        "{table}.timestamp >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL {} HOUR)",
        query.hours_ago
    )];

    for filter in &query.filters {
        clauses.push(format!(
            "{} {} '{}'",
            filter.field,
            filter.operator,
            escape_single_quotes(&filter.value)
        ));
    }

    if !query.search.is_empty() {
        clauses.push(format!(
            "event_message LIKE '%{}%'",
            escape_single_quotes(&query.search)
        ));
    }

    clauses.join(" AND ")
}

/// Builds the per-collection SQL and dispatches it through the analytics
/// endpoint via the API manager's normal gate → substitute → send path.
pub async fn retrieve_logs(manager: &ApiManager, query: &LogQuery) -> Result<ApiOutcome> {
    let table = table_name(&query.collection);
    let where_clause = build_where_clause(query);
    let sql = format!(
        "SELECT * FROM {table} WHERE {where_clause} ORDER BY timestamp DESC LIMIT {}",
        query.limit
    );

    let mut query_params = BTreeMap::new();
    query_params.insert("sql".to_string(), sql);

    manager
        .execute(
            "GET",
            "/v1/projects/{ref}/analytics/endpoints/logs.all",
            BTreeMap::new(),
            query_params,
            None,
            false,
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_bound_is_qualified_with_table_name() {
        let query = LogQuery {
            collection: "postgres".to_string(),
            hours_ago: 6,
            ..Default::default()
        };
        let clause = build_where_clause(&query);
        assert_eq!(
            clause,
            "postgres_logs.timestamp >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL 6 HOUR)"
        );
    }

    #[test]
    fn unknown_collection_falls_back_to_its_own_name_as_the_table() {
        let query = LogQuery {
            collection: "some_custom_collection".to_string(),
            hours_ago: 2,
            ..Default::default()
        };
        let clause = build_where_clause(&query);
        assert_eq!(
            clause,
            "some_custom_collection.timestamp >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL 2 HOUR)"
        );
    }

    #[test]
    fn filters_and_search_are_conjoined() {
        let query = LogQuery {
            filters: vec![LogFilter {
                field: "status_code".to_string(),
                operator: "=".to_string(),
                value: "500".to_string(),
            }],
            search: "O'Brien".to_string(),
            ..Default::default()
        };
        let clause = build_where_clause(&query);
        assert!(clause.contains("status_code = '500'"));
        assert!(clause.contains("event_message LIKE '%O''Brien%'"));
        assert_eq!(clause.matches(" AND ").count(), 2);
    }

    #[test]
    fn custom_query_overrides_composition() {
        let query = LogQuery {
            custom_query: Some("event_message LIKE '%panic%'".to_string()),
            ..Default::default()
        };
        assert_eq!(build_where_clause(&query), "event_message LIKE '%panic%'");
    }
}
