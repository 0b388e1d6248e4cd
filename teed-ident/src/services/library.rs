//! Product library cache and learner
//!
//! The `library_products` table is mirrored into memory at startup. Searches
//! run against the cache only; writes go to the database first and the cache
//! follows.

use sqlx::SqlitePool;
use std::path::Path;
use teed_common::{Error, Result};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::db::library as library_db;
use crate::models::{LibraryProduct, ProductOrigin, SeedProduct};
use crate::text::{normalize_text, text_similarity, within_one_edit};
use crate::types::Candidate;
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Scores at or below this are not reported
const MIN_SEARCH_SCORE: f32 = 0.4;

/// A library entry matching a query
#[derive(Debug, Clone)]
pub struct LibraryMatch {
    pub product: LibraryProduct,
    pub confidence: f32,
    pub reasons: Vec<String>,
}

impl LibraryMatch {
    pub fn to_candidate(&self) -> Candidate {
        let mut candidate = self.product.to_candidate(self.confidence);
        candidate.reasons = self.reasons.clone();
        candidate
    }
}

/// What `learn` did with a candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearnOutcome {
    Added,
    /// Already known; its sighting count was bumped
    Seen,
    Skipped(String),
}

/// In-memory product library backed by SQLite
pub struct ProductLibrary {
    db: SqlitePool,
    products: RwLock<Vec<LibraryProduct>>,
    learn_threshold: f32,
}

impl ProductLibrary {
    /// Load every stored product into the cache
    pub async fn load(db: SqlitePool, learn_threshold: f32) -> Result<Self> {
        let products = library_db::load_all(&db).await?;
        info!(count = products.len(), "Product library loaded");
        Ok(Self {
            db,
            products: RwLock::new(products),
            learn_threshold,
        })
    }

    pub async fn len(&self) -> usize {
        self.products.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.products.read().await.is_empty()
    }

    /// Best matches for a free-text query, highest confidence first
    pub async fn search(&self, query: &str, limit: usize) -> Vec<LibraryMatch> {
        let products = self.products.read().await;
        let mut matches: Vec<LibraryMatch> = products
            .iter()
            .filter_map(|product| {
                score_product(product, query).map(|(confidence, reasons)| LibraryMatch {
                    product: product.clone(),
                    confidence,
                    reasons,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.product.times_seen.cmp(&a.product.times_seen))
        });
        matches.truncate(limit);
        matches
    }

    /// Add a confident identification to the library
    ///
    /// Known brand+name pairs (case-insensitive) only have their sighting
    /// count bumped. Candidates without a brand, or below the learn
    /// threshold, are skipped.
    pub async fn learn(&self, candidate: &Candidate) -> Result<LearnOutcome> {
        if candidate.confidence < self.learn_threshold {
            return Ok(LearnOutcome::Skipped(format!(
                "confidence {:.2} below {:.2}",
                candidate.confidence, self.learn_threshold
            )));
        }
        let Some(brand) = candidate.brand.as_deref() else {
            return Ok(LearnOutcome::Skipped("missing brand".to_string()));
        };
        if candidate.name.trim().is_empty() {
            return Ok(LearnOutcome::Skipped("missing name".to_string()));
        }

        if let Some(id) = self.find_cached(brand, &candidate.name).await {
            self.bump(id).await?;
            return Ok(LearnOutcome::Seen);
        }

        let mut product = LibraryProduct::new(
            brand.trim(),
            candidate.name.trim(),
            candidate.category,
            ProductOrigin::from_source(candidate.source),
        );
        product.model_number = candidate.model.clone();
        product.keywords = learned_keywords(&product.brand, &product.name);
        product.confidence = candidate.confidence;

        match self.insert(&product).await {
            Ok(()) => {
                info!(
                    brand = %product.brand,
                    name = %product.name,
                    origin = product.origin.as_str(),
                    "Learned product"
                );
                Ok(LearnOutcome::Added)
            }
            // Another request learned the same pair first
            Err(Error::Database(e)) if is_unique_violation(&e) => {
                debug!(brand = %product.brand, name = %product.name, "Concurrent learn, entry already stored");
                self.reload().await?;
                Ok(LearnOutcome::Seen)
            }
            Err(e) => Err(e),
        }
    }

    /// Load a JSON array of seed products, skipping pairs already present
    ///
    /// Returns the number of products added.
    pub async fn import_seed(&self, path: &Path) -> Result<usize> {
        let content = tokio::fs::read_to_string(path).await?;
        let seeds: Vec<SeedProduct> = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid library seed {}: {}", path.display(), e)))?;

        let mut added = 0;
        for seed in seeds {
            if seed.brand.trim().is_empty() || seed.name.trim().is_empty() {
                warn!("Skipping seed entry without brand or name");
                continue;
            }
            if self.find_cached(&seed.brand, &seed.name).await.is_some() {
                continue;
            }
            let product = LibraryProduct::from(seed);
            self.insert(&product).await?;
            added += 1;
        }

        info!(path = %path.display(), added, "Library seed imported");
        Ok(added)
    }

    async fn find_cached(&self, brand: &str, name: &str) -> Option<uuid::Uuid> {
        let brand = normalize_text(brand);
        let name = normalize_text(name);
        self.products
            .read()
            .await
            .iter()
            .find(|p| normalize_text(&p.brand) == brand && normalize_text(&p.name) == name)
            .map(|p| p.id)
    }

    async fn insert(&self, product: &LibraryProduct) -> Result<()> {
        retry_on_lock("library insert", DEFAULT_MAX_LOCK_WAIT_MS, || {
            library_db::insert_product(&self.db, product)
        })
        .await?;
        self.products.write().await.push(product.clone());
        Ok(())
    }

    async fn bump(&self, id: uuid::Uuid) -> Result<()> {
        retry_on_lock("library times_seen", DEFAULT_MAX_LOCK_WAIT_MS, || {
            library_db::increment_times_seen(&self.db, id)
        })
        .await?;
        if let Some(product) = self.products.write().await.iter_mut().find(|p| p.id == id) {
            product.times_seen += 1;
            product.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        let products = library_db::load_all(&self.db).await?;
        *self.products.write().await = products;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Keywords stored with a learned product
///
/// Whole-name phrases only, never single name words
fn learned_keywords(brand: &str, name: &str) -> Vec<String> {
    let mut keywords = vec![normalize_text(name), normalize_text(&format!("{} {}", brand, name))];
    keywords.dedup();
    keywords
}

/// Score one product against a query
///
/// Returns `None` when the best score does not clear the reporting floor.
pub fn score_product(product: &LibraryProduct, query: &str) -> Option<(f32, Vec<String>)> {
    let query = normalize_text(query);
    let query_words: Vec<&str> = query.split_whitespace().filter(|w| w.len() > 1).collect();
    if query.is_empty() {
        return None;
    }

    let name = normalize_text(&product.name);
    let brand = normalize_text(&product.brand);
    let full_name = format!("{} {}", brand, name);
    let full_name_words: Vec<&str> = full_name.split_whitespace().collect();
    let keywords: Vec<String> = product.keywords.iter().map(|k| normalize_text(k)).collect();
    let keyword_words: Vec<&str> = keywords.iter().flat_map(|k| k.split_whitespace()).collect();

    let mut best = 0.0f32;
    let mut reasons = Vec::new();
    let mut consider = |score: f32, reason: String| {
        if score > best {
            best = score;
        }
        reasons.push(reason);
    };

    // All query words present in brand + name, exact or one edit away
    let mut exact = 0usize;
    let mut fuzzy = 0usize;
    for word in &query_words {
        if full_name.contains(word) || keywords.iter().any(|k| k.contains(word)) {
            exact += 1;
        } else if word.len() >= 4 {
            let near = full_name_words
                .iter()
                .chain(keyword_words.iter())
                .any(|pw| pw.len() >= 4 && within_one_edit(word, pw));
            if near {
                fuzzy += 1;
            }
        }
    }
    let matched = exact + fuzzy;
    let total = query_words.len();
    if total > 0 && matched == total {
        let effective = exact as f32 + fuzzy as f32 * 0.8;
        consider((0.85 + 0.03 * effective).min(0.98), "all words match".to_string());
    } else if total >= 3 && matched == total - 1 {
        consider((0.78 + 0.02 * exact as f32).min(0.85), "most words match".to_string());
    } else if matched > 0 {
        consider(0.7 * matched as f32 / total as f32, "partial word match".to_string());
    }

    if name.contains(&query) {
        consider(0.95, "substring of name".to_string());
    }

    let name_score = text_similarity(&query, &name);
    if name_score > 0.5 {
        consider(name_score, format!("name match: {}", product.name));
    }

    let brand_score = text_similarity(&query, &brand);
    if brand_score > 0.7 {
        consider(brand_score * 0.8, format!("brand match: {}", product.brand));
    }

    let multi_word_query = query.split_whitespace().count() >= 2;
    for keyword in keywords.iter().filter(|k| k.len() >= 4) {
        if query.contains(keyword.as_str()) || (multi_word_query && keyword.contains(&query)) {
            consider(0.88, format!("keyword: {}", keyword));
        }
        let score = text_similarity(&query, keyword);
        if score > 0.6 {
            consider(score * 0.9, format!("keyword match: {}", keyword));
        }
    }

    for alias in &product.aliases {
        let alias = normalize_text(alias);
        if alias.len() >= 3 && (query.contains(&alias) || alias.contains(&query)) {
            consider(0.92, format!("alias: {}", alias));
        }
        let score = text_similarity(&query, &alias);
        if score > 0.6 {
            consider(score * 0.95, format!("alias match: {}", alias));
        }
    }

    if let Some(model) = &product.model_number {
        let score = text_similarity(&query, model);
        if score > 0.8 {
            consider(score, format!("model number: {}", model));
        }
    }

    let full_score = text_similarity(&query, &full_name);
    if full_score > 0.5 {
        consider(full_score, "full name match".to_string());
    }

    if best > MIN_SEARCH_SCORE {
        reasons.dedup();
        Some((best.min(1.0), reasons))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CandidateSource, Category};
    use teed_common::db::connect_in_memory;

    fn product(brand: &str, name: &str, category: Category) -> LibraryProduct {
        LibraryProduct::new(brand, name, category, ProductOrigin::Seed)
    }

    #[test]
    fn test_all_words_score() {
        let p = product("Callaway", "Paradym Driver", Category::Golf);
        let (score, _) = score_product(&p, "Callaway Paradym Driver").unwrap();
        assert!(score >= 0.94, "score {}", score);
    }

    #[test]
    fn test_typo_still_matches() {
        let p = product("Callaway", "Paradym Driver", Category::Golf);
        let (score, reasons) = score_product(&p, "callaway paradim driver").unwrap();
        assert!(score > 0.9, "score {}", score);
        assert!(reasons.iter().any(|r| r == "all words match"));
    }

    #[test]
    fn test_unrelated_query_dropped() {
        let p = product("Callaway", "Paradym Driver", Category::Golf);
        assert!(score_product(&p, "titleist putter").is_none());
    }

    #[test]
    fn test_alias_match() {
        let mut p = product("Titleist", "Pro V1", Category::Golf);
        p.aliases = vec!["prov1".to_string()];
        let (score, _) = score_product(&p, "a sleeve of prov1 balls").unwrap();
        assert!(score >= 0.92);
    }

    #[tokio::test]
    async fn test_search_orders_by_confidence() {
        let pool = connect_in_memory().await.unwrap();
        let library = ProductLibrary::load(pool.clone(), 0.75).await.unwrap();
        library.insert(&product("Callaway", "Paradym Driver", Category::Golf)).await.unwrap();
        library.insert(&product("Callaway", "Apex Irons", Category::Golf)).await.unwrap();
        library.insert(&product("Nike", "Pegasus 41", Category::Running)).await.unwrap();

        let results = library.search("callaway paradym driver", 5).await;
        assert!(!results.is_empty());
        assert_eq!(results[0].product.name, "Paradym Driver");
        assert!(results.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        assert!(results.iter().all(|m| m.product.brand == "Callaway"));
    }

    #[tokio::test]
    async fn test_learn_threshold_and_dedupe() {
        let pool = connect_in_memory().await.unwrap();
        let library = ProductLibrary::load(pool.clone(), 0.75).await.unwrap();

        let weak = Candidate::new(Some("Yeti".into()), "Rambler 20 oz", Category::Outdoor, 0.6, CandidateSource::Ai);
        assert!(matches!(library.learn(&weak).await.unwrap(), LearnOutcome::Skipped(_)));

        let strong = weak.clone().with_confidence(0.9);
        assert_eq!(library.learn(&strong).await.unwrap(), LearnOutcome::Added);

        let shouted = Candidate::new(Some("YETI".into()), "rambler 20 OZ", Category::Outdoor, 0.8, CandidateSource::Web);
        assert_eq!(library.learn(&shouted).await.unwrap(), LearnOutcome::Seen);

        let stored = library_db::load_all(&pool).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].times_seen, 2);
        assert_eq!(stored[0].origin, ProductOrigin::Ai);
    }

    #[tokio::test]
    async fn test_learn_requires_brand() {
        let pool = connect_in_memory().await.unwrap();
        let library = ProductLibrary::load(pool, 0.75).await.unwrap();
        let unbranded = Candidate::new(None, "Water Bottle", Category::Outdoor, 0.95, CandidateSource::Ai);
        assert!(matches!(library.learn(&unbranded).await.unwrap(), LearnOutcome::Skipped(_)));
        assert!(library.is_empty().await);
    }

    #[tokio::test]
    async fn test_import_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(
            &path,
            r#"[
                {"brand": "Titleist", "name": "Pro V1", "category": "golf", "aliases": ["prov1"]},
                {"brand": "Titleist", "name": "pro v1"},
                {"brand": "", "name": "Nameless"},
                {"brand": "Garmin", "name": "Forerunner 265", "category": "wearables", "model_number": "010-02810-00"}
            ]"#,
        )
        .unwrap();

        let pool = connect_in_memory().await.unwrap();
        let library = ProductLibrary::load(pool, 0.75).await.unwrap();
        assert_eq!(library.import_seed(&path).await.unwrap(), 2);
        assert_eq!(library.len().await, 2);

        let hits = library.search("forerunner 265", 3).await;
        assert_eq!(hits[0].product.category, Category::Wearables);
        assert_eq!(hits[0].to_candidate().model.as_deref(), Some("010-02810-00"));
    }
}
