//! Product library database operations

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use teed_common::{Error, Result};
use uuid::Uuid;

use super::{parse_json, parse_timestamp, parse_uuid, to_json};
use crate::models::{LibraryProduct, ProductOrigin};
use crate::types::Category;

/// Load every library entry, most seen first
pub async fn load_all(pool: &SqlitePool) -> Result<Vec<LibraryProduct>> {
    let rows = sqlx::query(
        r#"
        SELECT id, brand, name, category, model_number, aliases, keywords,
               source, confidence, times_seen, created_at, updated_at
        FROM library_products
        ORDER BY times_seen DESC, created_at ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(product_from_row).collect()
}

/// Find an entry by case-insensitive brand and name
pub async fn find_by_brand_name(pool: &SqlitePool, brand: &str, name: &str) -> Result<Option<LibraryProduct>> {
    let row = sqlx::query(
        r#"
        SELECT id, brand, name, category, model_number, aliases, keywords,
               source, confidence, times_seen, created_at, updated_at
        FROM library_products
        WHERE lower(brand) = lower(?) AND lower(name) = lower(?)
        "#,
    )
    .bind(brand)
    .bind(name)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(product_from_row).transpose()
}

/// Insert a new library entry
pub async fn insert_product(pool: &SqlitePool, product: &LibraryProduct) -> Result<()> {
    let aliases = to_json("aliases", &product.aliases)?;
    let keywords = to_json("keywords", &product.keywords)?;

    sqlx::query(
        r#"
        INSERT INTO library_products (
            id, brand, name, category, model_number, aliases, keywords,
            source, confidence, times_seen, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(product.id.to_string())
    .bind(&product.brand)
    .bind(&product.name)
    .bind(product.category.as_str())
    .bind(&product.model_number)
    .bind(&aliases)
    .bind(&keywords)
    .bind(product.origin.as_str())
    .bind(product.confidence as f64)
    .bind(product.times_seen)
    .bind(product.created_at.to_rfc3339())
    .bind(product.updated_at.to_rfc3339())
    .execute(pool)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

/// Record another sighting of an existing entry
pub async fn increment_times_seen(pool: &SqlitePool, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE library_products SET times_seen = times_seen + 1, updated_at = ? WHERE id = ?")
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await
        .map_err(Error::Database)?;
    Ok(())
}

fn product_from_row(row: &SqliteRow) -> Result<LibraryProduct> {
    let id: String = row.get("id");
    let category: String = row.get("category");
    let aliases: String = row.get("aliases");
    let keywords: String = row.get("keywords");
    let source: String = row.get("source");
    let confidence: f64 = row.get("confidence");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(LibraryProduct {
        id: parse_uuid(&id)?,
        brand: row.get("brand"),
        name: row.get("name"),
        category: Category::from_label(&category),
        model_number: row.get("model_number"),
        aliases: parse_json("aliases", &aliases)?,
        keywords: parse_json("keywords", &keywords)?,
        origin: ProductOrigin::parse(&source),
        confidence: confidence as f32,
        times_seen: row.get("times_seen"),
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use teed_common::db::connect_in_memory;

    #[tokio::test]
    async fn test_insert_and_load() {
        let pool = connect_in_memory().await.unwrap();
        let mut product = LibraryProduct::new("Titleist", "Pro V1", Category::Golf, ProductOrigin::Seed);
        product.aliases = vec!["prov1".to_string()];
        insert_product(&pool, &product).await.unwrap();

        let loaded = load_all(&pool).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, product.id);
        assert_eq!(loaded[0].aliases, vec!["prov1"]);
        assert_eq!(loaded[0].category, Category::Golf);
    }

    #[tokio::test]
    async fn test_brand_name_lookup_ignores_case() {
        let pool = connect_in_memory().await.unwrap();
        let product = LibraryProduct::new("YETI", "Rambler 20 oz", Category::Outdoor, ProductOrigin::Ai);
        insert_product(&pool, &product).await.unwrap();

        let found = find_by_brand_name(&pool, "yeti", "RAMBLER 20 OZ").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(product.id));

        increment_times_seen(&pool, product.id).await.unwrap();
        let found = find_by_brand_name(&pool, "YETI", "Rambler 20 oz").await.unwrap().unwrap();
        assert_eq!(found.times_seen, 2);
    }

    #[tokio::test]
    async fn test_duplicate_brand_name_rejected() {
        let pool = connect_in_memory().await.unwrap();
        let a = LibraryProduct::new("Nike", "Pegasus 41", Category::Footwear, ProductOrigin::Seed);
        let b = LibraryProduct::new("nike", "pegasus 41", Category::Footwear, ProductOrigin::Ai);
        insert_product(&pool, &a).await.unwrap();
        assert!(insert_product(&pool, &b).await.is_err());
    }
}
