//! The four pipeline stages

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{Stage, StageError};
use crate::services::corrections::CorrectionService;
use crate::services::google_search_client::GoogleSearchClient;
use crate::services::input::{PreparedInput, PreparedRequest};
use crate::services::library::ProductLibrary;
use crate::services::model::ProductModel;
use crate::services::prompts::{identification_prompt, parse_suggestions};
use crate::services::search_ranker::{rank_results, RankingContext};
use crate::types::{Candidate, CandidateSource, StageKind};

/// Human-verified answers recorded through the corrections API
pub struct CorrectionStage {
    corrections: Arc<CorrectionService>,
}

impl CorrectionStage {
    pub fn new(corrections: Arc<CorrectionService>) -> Self {
        Self { corrections }
    }
}

#[async_trait]
impl Stage for CorrectionStage {
    fn kind(&self) -> StageKind {
        StageKind::Correction
    }

    async fn identify(&self, request: &PreparedRequest, _prior: &[Candidate]) -> Result<Vec<Candidate>, StageError> {
        let hit = self
            .corrections
            .lookup(request.kind(), &request.key, request.allows_near_match())
            .await?;
        Ok(hit.into_iter().collect())
    }
}

/// Product library search, plus the offline reading of a URL
pub struct LibraryStage {
    library: Arc<ProductLibrary>,
    limit: usize,
}

impl LibraryStage {
    pub fn new(library: Arc<ProductLibrary>, limit: usize) -> Self {
        Self {
            library,
            limit: limit.max(1),
        }
    }
}

#[async_trait]
impl Stage for LibraryStage {
    fn kind(&self) -> StageKind {
        StageKind::Library
    }

    async fn identify(&self, request: &PreparedRequest, _prior: &[Candidate]) -> Result<Vec<Candidate>, StageError> {
        let mut candidates = Vec::new();

        if let PreparedInput::Url(parsed) = &request.input {
            if let Some(name) = &parsed.product_name {
                let mut candidate = Candidate::new(
                    parsed.brand.clone(),
                    name.clone(),
                    request.category_hint.unwrap_or(parsed.category),
                    parsed.confidence,
                    CandidateSource::Library,
                )
                .with_url(parsed.url.clone())
                .with_reason(format!("read from {} URL", parsed.host));
                candidate.model = parsed.model_number.clone().or_else(|| parsed.sku.clone());
                candidate.color = parsed.color.clone();
                candidates.push(candidate);
            }
        }

        if let Some(query) = request.search_query() {
            let matches = self.library.search(&query, self.limit).await;
            debug!(query = %query, matches = matches.len(), "Library search");
            candidates.extend(matches.iter().map(|m| m.to_candidate()));
        }

        Ok(candidates)
    }
}

/// Hosted model suggestions
pub struct AiStage {
    model: Arc<dyn ProductModel>,
}

impl AiStage {
    pub fn new(model: Arc<dyn ProductModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Stage for AiStage {
    fn kind(&self) -> StageKind {
        StageKind::Ai
    }

    async fn identify(&self, request: &PreparedRequest, prior: &[Candidate]) -> Result<Vec<Candidate>, StageError> {
        let mut model_request = identification_prompt(request);
        let known: Vec<String> = prior.iter().take(3).map(Candidate::display_name).collect();
        if !known.is_empty() {
            model_request
                .prompt
                .push_str(&format!("\n\nSimilar products already catalogued: {}", known.join("; ")));
        }

        let reply = self.model.complete(&model_request).await?;
        let mut candidates = parse_suggestions(&reply.text, request.category()).map_err(StageError::Response)?;

        if let PreparedInput::Url(parsed) = &request.input {
            for candidate in candidates.iter_mut().filter(|c| c.url.is_none()) {
                candidate.url = Some(parsed.url.clone());
            }
        }

        debug!(
            provider = self.model.name(),
            model = %reply.model,
            suggestions = candidates.len(),
            "Model suggestions parsed"
        );
        Ok(candidates)
    }
}

/// Web search ranked by domain trust and keyword overlap
pub struct WebStage {
    search: Arc<GoogleSearchClient>,
    confidence_cap: f32,
    num_results: u8,
}

impl WebStage {
    pub fn new(search: Arc<GoogleSearchClient>, confidence_cap: f32, num_results: u8) -> Self {
        Self {
            search,
            confidence_cap,
            num_results,
        }
    }
}

#[async_trait]
impl Stage for WebStage {
    fn kind(&self) -> StageKind {
        StageKind::Web
    }

    async fn identify(&self, request: &PreparedRequest, prior: &[Candidate]) -> Result<Vec<Candidate>, StageError> {
        // Photos have no text of their own; search for the best earlier guess
        let query = request
            .search_query()
            .or_else(|| prior.first().map(Candidate::display_name))
            .filter(|q| !q.trim().is_empty());
        let Some(query) = query else {
            debug!("Nothing to search the web for");
            return Ok(Vec::new());
        };

        let results = self.search.search(&query, self.num_results).await?;
        Ok(rank_results(
            &results,
            &RankingContext {
                query: &query,
                prior: prior.first(),
                category_hint: request.category(),
                confidence_cap: self.confidence_cap,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::corrections::{CorrectedProduct, OriginalGuess};
    use crate::services::input::prepare;
    use crate::services::model::testing::ScriptedModel;
    use crate::types::{Category, IdentifyInput, IdentifyRequest};
    use teed_common::db::connect_in_memory;

    fn text_request(text: &str) -> PreparedRequest {
        prepare(&IdentifyRequest {
            input: IdentifyInput::Text(text.to_string()),
            context: None,
            category_hint: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_correction_stage_hit() {
        let pool = connect_in_memory().await.unwrap();
        let library = Arc::new(ProductLibrary::load(pool.clone(), 0.75).await.unwrap());
        let corrections = Arc::new(CorrectionService::new(pool, library));
        let request = text_request("my white driver");

        let stage = CorrectionStage::new(corrections.clone());
        assert!(stage.identify(&request, &[]).await.unwrap().is_empty());

        corrections
            .record(
                request.kind(),
                &request.key,
                &OriginalGuess::default(),
                &CorrectedProduct {
                    brand: Some("TaylorMade".into()),
                    name: "Qi10 Driver".into(),
                    category: Some("golf".into()),
                },
            )
            .await
            .unwrap();

        let hits = stage.identify(&request, &[]).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].confidence, 1.0);
        assert_eq!(hits[0].brand.as_deref(), Some("TaylorMade"));
    }

    #[tokio::test]
    async fn test_library_stage_reads_url() {
        let pool = connect_in_memory().await.unwrap();
        let library = Arc::new(ProductLibrary::load(pool, 0.75).await.unwrap());
        let request = prepare(&IdentifyRequest {
            input: IdentifyInput::Url("https://www.nike.com/t/pegasus-41-mens-road-running-shoes-abc123/FD2722-002".into()),
            context: None,
            category_hint: None,
        })
        .unwrap();

        let candidates = LibraryStage::new(library, 5).identify(&request, &[]).await.unwrap();
        let first = &candidates[0];
        assert_eq!(first.brand.as_deref(), Some("Nike"));
        assert_eq!(first.source, CandidateSource::Library);
        assert!(first.url.as_deref().unwrap().contains("nike.com"));
    }

    #[tokio::test]
    async fn test_library_stage_search() {
        let pool = connect_in_memory().await.unwrap();
        let library = Arc::new(ProductLibrary::load(pool, 0.75).await.unwrap());
        library
            .learn(&Candidate::new(
                Some("Callaway".into()),
                "Paradym Driver",
                Category::Golf,
                0.9,
                CandidateSource::Ai,
            ))
            .await
            .unwrap();

        let stage = LibraryStage::new(library, 5);
        let candidates = stage.identify(&text_request("callaway paradym driver"), &[]).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].confidence >= 0.8);
    }

    #[tokio::test]
    async fn test_ai_stage_parses_and_mentions_prior() {
        let model = Arc::new(ScriptedModel::new(
            "openai",
            vec![Ok(r#"{"suggestions":[{"brand":"Callaway","name":"Paradym Driver","category":"golf","confidence":0.82}]}"#.to_string())],
        ));
        let stage = AiStage::new(model.clone());
        let prior = vec![Candidate::new(Some("Callaway".into()), "Paradym X", Category::Golf, 0.6, CandidateSource::Library)];

        let candidates = stage.identify(&text_request("callaway paradym driver"), &prior).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source, CandidateSource::Ai);

        let prompt = model.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("Callaway Paradym X"));
    }

    #[tokio::test]
    async fn test_ai_stage_rejects_prose() {
        let stage = AiStage::new(Arc::new(ScriptedModel::new("openai", vec![Ok("no idea".to_string())])));
        let err = stage.identify(&text_request("callaway paradym driver"), &[]).await.unwrap_err();
        assert!(matches!(err, StageError::Response(_)));
    }
}
