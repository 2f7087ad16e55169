use std::collections::HashSet;

use sqlx::PgPool;
use tracing::warn;

use crate::domain::DomainError;

pub async fn create_vector_extension(pool: &PgPool) -> Result<(), DomainError> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create pgvector extension: {}", e)))?;
    Ok(())
}

pub async fn execute_all(pool: &PgPool, statements: &[String]) -> Result<(), DomainError> {
    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to initialize schema: {}", e)))?;
    }
    Ok(())
}

pub async fn ensure_vector_extension(pool: &PgPool) -> Result<(), DomainError> {
    let installed: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT FROM pg_extension WHERE extname = 'vector')")
            .fetch_one(pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to check extensions: {}", e)))?;

    if installed {
        Ok(())
    } else {
        Err(DomainError::schema(
            "The 'vector' extension is not installed in the destination database. \
             Run: CREATE EXTENSION vector;",
        ))
    }
}

pub async fn table_exists(pool: &PgPool, table: &str) -> Result<bool, DomainError> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT FROM information_schema.tables \
         WHERE table_schema = current_schema() AND table_name = $1)",
    )
    .bind(table)
    .fetch_one(pool)
    .await
    .map_err(|e| DomainError::storage(format!("Failed to check table {}: {}", table, e)))
}

pub async fn table_columns(pool: &PgPool, table: &str) -> Result<HashSet<String>, DomainError> {
    let columns: Vec<String> = sqlx::query_scalar(
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_schema = current_schema() AND table_name = $1",
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| DomainError::storage(format!("Failed to read columns of {}: {}", table, e)))?;

    Ok(columns.into_iter().collect())
}

/// Fails when any table is missing; only warns about missing columns.
pub async fn verify_tables(
    pool: &PgPool,
    tables: &[(&str, &[&str])],
) -> Result<(), DomainError> {
    let mut missing_tables = Vec::new();

    for (table, required_columns) in tables {
        if !table_exists(pool, table).await? {
            missing_tables.push(table.to_string());
            continue;
        }

        let existing = table_columns(pool, table).await?;
        let missing = missing_columns(&existing, required_columns);
        if !missing.is_empty() {
            warn!(
                "Table '{}' is missing columns: {}. Writes may fail.",
                table,
                missing.join(", ")
            );
        }
    }

    if missing_tables.is_empty() {
        Ok(())
    } else {
        Err(DomainError::schema(format!(
            "Missing tables in destination database: {}. \
             Run with INIT_DBS=true to create them.",
            missing_tables.join(", ")
        )))
    }
}

fn missing_columns(existing: &HashSet<String>, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|c| !existing.contains(**c))
        .map(|c| c.to_string())
        .collect()
}
