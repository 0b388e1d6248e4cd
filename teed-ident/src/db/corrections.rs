//! Correction database operations

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use teed_common::{Error, Result};

use super::{parse_json, parse_timestamp, parse_uuid, to_json};
use crate::models::{CorrectionRecord, CorrectionType};
use crate::types::Category;

const SELECT_COLUMNS: &str = r#"
    SELECT id, input_kind, input_key, original_brand, original_name, original_category,
           corrected_brand, corrected_name, corrected_category, correction_type,
           change_summary, model_keywords, created_at
    FROM corrections
"#;

/// Persist a correction
pub async fn insert_correction(pool: &SqlitePool, record: &CorrectionRecord) -> Result<()> {
    let model_keywords = to_json("model_keywords", &record.model_keywords)?;

    sqlx::query(
        r#"
        INSERT INTO corrections (
            id, input_kind, input_key, original_brand, original_name, original_category,
            corrected_brand, corrected_name, corrected_category, correction_type,
            change_summary, model_keywords, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(&record.input_kind)
    .bind(&record.input_key)
    .bind(&record.original_brand)
    .bind(&record.original_name)
    .bind(record.original_category.map(|c| c.as_str()))
    .bind(&record.corrected_brand)
    .bind(&record.corrected_name)
    .bind(record.corrected_category.as_str())
    .bind(record.correction_type.as_str())
    .bind(&record.change_summary)
    .bind(&model_keywords)
    .bind(record.created_at.to_rfc3339())
    .execute(pool)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

/// Latest correction recorded for exactly this input key
pub async fn find_exact(pool: &SqlitePool, input_kind: &str, input_key: &str) -> Result<Option<CorrectionRecord>> {
    let sql = format!(
        "{} WHERE input_kind = ? AND input_key = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
        SELECT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(input_kind)
        .bind(input_key)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(correction_from_row).transpose()
}

/// Latest correction whose key contains, or is contained in, `input_key`
///
/// Stored keys shorter than `min_len` characters never match.
pub async fn find_near(
    pool: &SqlitePool,
    input_kind: &str,
    input_key: &str,
    min_len: usize,
) -> Result<Option<CorrectionRecord>> {
    let sql = format!(
        "{} WHERE input_kind = ? AND length(input_key) >= ?
              AND (instr(?, input_key) > 0 OR instr(input_key, ?) > 0)
            ORDER BY created_at DESC, rowid DESC LIMIT 1",
        SELECT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(input_kind)
        .bind(min_len as i64)
        .bind(input_key)
        .bind(input_key)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(correction_from_row).transpose()
}

fn correction_from_row(row: &SqliteRow) -> Result<CorrectionRecord> {
    let id: String = row.get("id");
    let original_category: Option<String> = row.get("original_category");
    let corrected_category: String = row.get("corrected_category");
    let correction_type: String = row.get("correction_type");
    let model_keywords: String = row.get("model_keywords");
    let created_at: String = row.get("created_at");

    Ok(CorrectionRecord {
        id: parse_uuid(&id)?,
        input_kind: row.get("input_kind"),
        input_key: row.get("input_key"),
        original_brand: row.get("original_brand"),
        original_name: row.get("original_name"),
        original_category: original_category.as_deref().map(Category::from_label),
        corrected_brand: row.get("corrected_brand"),
        corrected_name: row.get("corrected_name"),
        corrected_category: Category::from_label(&corrected_category),
        correction_type: CorrectionType::parse(&correction_type),
        change_summary: row.get("change_summary"),
        model_keywords: parse_json("model_keywords", &model_keywords)?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use teed_common::db::connect_in_memory;
    use uuid::Uuid;

    fn record(key: &str, name: &str, age_secs: i64) -> CorrectionRecord {
        CorrectionRecord {
            id: Uuid::new_v4(),
            input_kind: "text".to_string(),
            input_key: key.to_string(),
            original_brand: None,
            original_name: Some("Driver".to_string()),
            original_category: Some(Category::Golf),
            corrected_brand: Some("Callaway".to_string()),
            corrected_name: name.to_string(),
            corrected_category: Category::Golf,
            correction_type: CorrectionType::Combination,
            change_summary: "summary".to_string(),
            model_keywords: vec!["paradym".to_string()],
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn test_exact_returns_latest() {
        let pool = connect_in_memory().await.unwrap();
        insert_correction(&pool, &record("callaway driver", "Paradym", 60)).await.unwrap();
        insert_correction(&pool, &record("callaway driver", "Paradym X", 5)).await.unwrap();

        let found = find_exact(&pool, "text", "callaway driver").await.unwrap().unwrap();
        assert_eq!(found.corrected_name, "Paradym X");
        assert_eq!(found.model_keywords, vec!["paradym"]);
        assert!(find_exact(&pool, "url", "callaway driver").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_near_matches_either_direction() {
        let pool = connect_in_memory().await.unwrap();
        insert_correction(&pool, &record("callaway driver", "Paradym", 10)).await.unwrap();

        // stored key inside the query
        let found = find_near(&pool, "text", "my old callaway driver 10.5", 4).await.unwrap();
        assert!(found.is_some());
        // query inside the stored key
        let found = find_near(&pool, "text", "callaway", 4).await.unwrap();
        assert!(found.is_some());
        // unrelated
        let found = find_near(&pool, "text", "titleist putter", 4).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_near_ignores_short_stored_keys() {
        let pool = connect_in_memory().await.unwrap();
        insert_correction(&pool, &record("tee", "Wooden Tee", 10)).await.unwrap();

        let found = find_near(&pool, "text", "golf tees pack", 4).await.unwrap();
        assert!(found.is_none());
    }
}
