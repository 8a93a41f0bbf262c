//! Bookkeeping for schema-affecting batches: `supabase_migrations.schema_migrations`.

use sqlx::PgPool;
use tracing::warn;

const INIT_SCHEMA: &str = "CREATE SCHEMA IF NOT EXISTS supabase_migrations;";
const INIT_TABLE: &str = "CREATE TABLE IF NOT EXISTS supabase_migrations.schema_migrations \
    (version text primary key, statements text[] not null, name text not null);";

/// Ensures the bookkeeping schema/table exist, then inserts a migration row.
/// Never fails the caller: recording failures are logged and swallowed —
/// migration bookkeeping is advisory, the primary workload wins.
pub async fn record(pool: &PgPool, version: &str, name: &str, original_text: &str) {
    if let Err(e) = init(pool).await {
        warn!(error = %e, "failed to initialize migration bookkeeping schema");
        return;
    }

    if let Err(e) = insert(pool, version, name, original_text).await {
        warn!(error = %e, version, name, "failed to record migration");
    }
}

async fn init(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(INIT_SCHEMA).execute(pool).await?;
    sqlx::query(INIT_TABLE).execute(pool).await?;
    Ok(())
}

async fn insert(pool: &PgPool, version: &str, name: &str, original_text: &str) -> Result<(), sqlx::Error> {
    let escaped = escape_single_quotes(original_text);
    let sql = format!(
        "INSERT INTO supabase_migrations.schema_migrations(version, name, statements) \
         VALUES ('{version}', '{name}', ARRAY['{escaped}']);"
    );
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}

fn escape_single_quotes(text: &str) -> String {
    text.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping_doubles_single_quotes() {
        assert_eq!(escape_single_quotes("it's a test"), "it''s a test");
        assert_eq!(escape_single_quotes("no quotes"), "no quotes");
    }

    #[tokio::test]
    async fn records_version_and_name_against_a_live_database() {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("skipping: DATABASE_URL not set");
            return;
        };
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .unwrap();

        record(&pool, "20260101000000", "test_migration", "SELECT 1").await;

        let row: (String,) = sqlx::query_as(
            "SELECT name FROM supabase_migrations.schema_migrations WHERE version = $1",
        )
        .bind("20260101000000")
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(row.0, "test_migration");

        sqlx::query("DELETE FROM supabase_migrations.schema_migrations WHERE version = $1")
            .bind("20260101000000")
            .execute(&pool)
            .await
            .unwrap();
    }
}
