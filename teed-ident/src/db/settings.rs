//! Settings database operations
//!
//! Key-value accessors over the `settings` table. Provider API keys live
//! here and take priority over environment variables and the TOML file.

use sqlx::{Pool, Sqlite};
use teed_common::{Error, Result};

use crate::config::ApiKeyKind;

/// Get a provider API key from the database
pub async fn get_api_key(db: &Pool<Sqlite>, kind: ApiKeyKind) -> Result<Option<String>> {
    get_setting::<String>(db, kind.setting_key()).await
}

/// Store a provider API key in the database
pub async fn set_api_key(db: &Pool<Sqlite>, kind: ApiKeyKind, key: String) -> Result<()> {
    set_setting(db, kind.setting_key(), key).await
}

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((Some(value),)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}

/// Generic setting setter (UPSERT)
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
