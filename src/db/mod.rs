use sqlx::{postgres::PgPoolOptions, Error, Executor, PgPool};
use thiserror::Error;

pub mod models;

const SCHEMA: &str = include_str!("schema.sql");

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to parse database URL: {0}")]
    UrlParse(String),
    #[error("Database error: {0}")]
    Sqlx(#[from] Error),
    #[error("Failed to create database: {0}")]
    CreateDb(String),
    #[error("Failed to apply schema: {0}")]
    Schema(String),
}

/// Connects to the pharmacy database, creating it first when the server has
/// no database of that name yet.
pub async fn init_db(database_url: &str) -> Result<PgPool, DatabaseError> {
    let (base_url, db_name) = parse_database_url(database_url)?;

    let temp_pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&base_url)
        .await
        .map_err(DatabaseError::Sqlx)?;

    ensure_database_exists(&temp_pool, &db_name).await?;
    temp_pool.close().await;

    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(DatabaseError::Sqlx)
}

/// Applies the table definitions. Every statement is `IF NOT EXISTS`, so this
/// runs on each start.
pub async fn apply_schema(pool: &PgPool) -> Result<(), DatabaseError> {
    pool.execute(SCHEMA)
        .await
        .map_err(|e| DatabaseError::Schema(e.to_string()))?;
    log::info!("Database schema is up to date");
    Ok(())
}

fn parse_database_url(database_url: &str) -> Result<(String, String), DatabaseError> {
    let (base_url, tail) = database_url
        .rsplit_once('/')
        .ok_or_else(|| DatabaseError::UrlParse("Invalid database URL format".to_string()))?;

    let db_name = tail
        .split('?')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| DatabaseError::UrlParse("Failed to extract database name".to_string()))?;

    if !db_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(DatabaseError::UrlParse(format!(
            "Unsupported database name: {}",
            db_name
        )));
    }

    Ok((base_url.to_string(), db_name.to_string()))
}

async fn ensure_database_exists(pool: &PgPool, db_name: &str) -> Result<(), DatabaseError> {
    let db_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(pool)
            .await
            .map_err(DatabaseError::Sqlx)?;

    if !db_exists {
        log::info!("Creating database {}", db_name);
        pool.execute(format!("CREATE DATABASE {}", db_name).as_str())
            .await
            .map_err(|e| DatabaseError::CreateDb(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_server_url_from_database_name() {
        let (base, name) =
            parse_database_url("postgres://user:pw@localhost:5432/meditrack?sslmode=disable")
                .unwrap();
        assert_eq!(base, "postgres://user:pw@localhost:5432");
        assert_eq!(name, "meditrack");
    }

    #[test]
    fn rejects_names_that_would_need_quoting() {
        assert!(matches!(
            parse_database_url("postgres://localhost/drop;table"),
            Err(DatabaseError::UrlParse(_))
        ));
        assert!(matches!(
            parse_database_url("postgres://localhost/"),
            Err(DatabaseError::UrlParse(_))
        ));
        assert!(parse_database_url("no-slashes").is_err());
    }
}
