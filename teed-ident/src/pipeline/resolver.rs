//! Runs the stages in order and assembles the outcome

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use teed_common::config::IdentificationConfig;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Stage, StageError};
use crate::services::input::{PreparedInput, PreparedRequest};
use crate::services::library::{LearnOutcome, ProductLibrary};
use crate::services::telemetry::TelemetryRecorder;
use crate::types::{Candidate, IdentificationOutcome, StageFailure, StageKind};

pub struct Resolver {
    stages: Vec<Arc<dyn Stage>>,
    config: IdentificationConfig,
    library: Option<Arc<ProductLibrary>>,
    telemetry: Option<TelemetryRecorder>,
}

impl Resolver {
    /// Stages run in the order given
    pub fn new(stages: Vec<Arc<dyn Stage>>, config: IdentificationConfig) -> Self {
        Self {
            stages,
            config,
            library: None,
            telemetry: None,
        }
    }

    /// Learn confident model answers into this library
    pub fn with_library(mut self, library: Arc<ProductLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryRecorder) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Top confidence from `kind` that ends the run, if it can end it at all
    fn stop_threshold(&self, kind: StageKind) -> Option<f32> {
        match kind {
            StageKind::Correction => Some(0.0),
            StageKind::Library => Some(self.config.library_threshold),
            StageKind::Ai => Some(self.config.ai_threshold),
            StageKind::Web => None,
        }
    }

    /// Identify a validated request
    ///
    /// Never fails: stage failures are reported in `stage_errors`, and a run
    /// where nothing worked comes back empty with `clarification_needed`.
    pub async fn identify(&self, request: &PreparedRequest) -> IdentificationOutcome {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let stage_timeout = Duration::from_millis(self.config.stage_timeout_ms);

        let mut found: Vec<Candidate> = Vec::new();
        let mut stage_errors = Vec::new();
        let mut stage_reached = None;

        for stage in &self.stages {
            let kind = stage.kind();
            stage_reached = Some(kind);
            let stage_started = Instant::now();

            let result = match tokio::time::timeout(stage_timeout, stage.identify(request, &found)).await {
                Ok(result) => result,
                Err(_) => Err(StageError::Timeout(self.config.stage_timeout_ms)),
            };

            let mut candidates = match result {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(request_id = %request_id, stage = %kind, error = %e, "Stage failed");
                    stage_errors.push(StageFailure {
                        stage: kind,
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            sort_candidates(&mut candidates);

            debug!(
                request_id = %request_id,
                stage = %kind,
                candidates = candidates.len(),
                top = candidates.first().map(|c| c.confidence).unwrap_or(0.0),
                elapsed_ms = stage_started.elapsed().as_millis() as u64,
                "Stage finished"
            );

            if kind == StageKind::Ai {
                if let Some(top) = candidates.first() {
                    self.learn(top).await;
                }
            }

            let stop = match (self.stop_threshold(kind), candidates.first()) {
                (Some(threshold), Some(top)) => top.confidence >= threshold,
                _ => false,
            };

            found = merge_candidates(found, candidates);

            if stop {
                break;
            }
        }

        found.truncate(self.config.max_candidates.max(1));

        let clarification_needed = found
            .first()
            .map(|top| top.confidence < self.config.clarification_threshold)
            .unwrap_or(true);
        let questions = match (&request.input, clarification_needed) {
            (PreparedInput::Text(parsed), true) => parsed.clarification_questions(),
            _ => Vec::new(),
        };

        let outcome = IdentificationOutcome {
            request_id,
            candidates: found,
            clarification_needed,
            questions,
            stage_reached,
            stage_errors,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            request_id = %request_id,
            input = request.kind(),
            stage = stage_reached.map(|s| s.as_str()).unwrap_or("none"),
            candidates = outcome.candidates.len(),
            confidence = outcome.top_confidence(),
            clarification = clarification_needed,
            elapsed_ms = outcome.elapsed_ms,
            "Identification complete"
        );

        if let Some(telemetry) = &self.telemetry {
            telemetry.record_outcome(request.kind(), &request.key, &outcome).await;
        }

        outcome
    }

    async fn learn(&self, candidate: &Candidate) {
        let Some(library) = &self.library else {
            return;
        };
        match library.learn(candidate).await {
            Ok(LearnOutcome::Skipped(reason)) => {
                debug!(name = %candidate.display_name(), reason = %reason, "Not learned");
            }
            Ok(_) => {}
            Err(e) => warn!(name = %candidate.display_name(), error = %e, "Failed to learn product"),
        }
    }
}

/// Confidence desc, then library > ai > web, then branded first, then name
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.source.priority().cmp(&b.source.priority()))
            .then_with(|| b.brand.is_some().cmp(&a.brand.is_some()))
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Merge duplicates by normalized brand+name, keeping the most confident
///
/// The kept candidate borrows a URL, model or color from the dropped one
/// when it has none of its own.
pub fn merge_candidates(existing: Vec<Candidate>, incoming: Vec<Candidate>) -> Vec<Candidate> {
    let mut merged: Vec<Candidate> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for candidate in existing.into_iter().chain(incoming) {
        let key = candidate.merge_key();
        match index.get(&key) {
            Some(&position) => {
                let kept = &mut merged[position];
                let (mut winner, loser) = if candidate.confidence > kept.confidence {
                    (candidate, kept.clone())
                } else {
                    (kept.clone(), candidate)
                };
                winner.url = winner.url.or(loser.url);
                winner.model = winner.model.or(loser.model);
                winner.color = winner.color.or(loser.color);
                *kept = winner;
            }
            None => {
                index.insert(key, merged.len());
                merged.push(candidate);
            }
        }
    }

    sort_candidates(&mut merged);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::input::prepare;
    use crate::types::{CandidateSource, Category, IdentifyInput, IdentifyRequest};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedStage {
        kind: StageKind,
        reply: Result<Vec<Candidate>, String>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl FixedStage {
        fn ok(kind: StageKind, candidates: Vec<Candidate>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                reply: Ok(candidates),
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(kind: StageKind, message: &str) -> Arc<Self> {
            Arc::new(Self {
                kind,
                reply: Err(message.to_string()),
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(kind: StageKind, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                kind,
                reply: Ok(Vec::new()),
                delay: Some(delay),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Stage for FixedStage {
        fn kind(&self) -> StageKind {
            self.kind
        }

        async fn identify(&self, _request: &PreparedRequest, _prior: &[Candidate]) -> Result<Vec<Candidate>, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.clone().map_err(StageError::Response)
        }
    }

    fn candidate(brand: &str, name: &str, confidence: f32, source: CandidateSource) -> Candidate {
        Candidate::new(Some(brand.to_string()), name, Category::Golf, confidence, source)
    }

    fn request(text: &str) -> PreparedRequest {
        prepare(&IdentifyRequest {
            input: IdentifyInput::Text(text.to_string()),
            context: None,
            category_hint: None,
        })
        .unwrap()
    }

    fn resolver(stages: Vec<Arc<dyn Stage>>) -> Resolver {
        Resolver::new(stages, IdentificationConfig::default())
    }

    #[tokio::test]
    async fn test_library_hit_skips_later_stages() {
        let library = FixedStage::ok(
            StageKind::Library,
            vec![candidate("Callaway", "Paradym Driver", 0.9, CandidateSource::Library)],
        );
        let ai = FixedStage::ok(StageKind::Ai, vec![]);
        let outcome = resolver(vec![library.clone() as Arc<dyn Stage>, ai.clone()])
            .identify(&request("callaway paradym driver"))
            .await;

        assert_eq!(outcome.stage_reached, Some(StageKind::Library));
        assert_eq!(outcome.candidates.len(), 1);
        assert!(!outcome.clarification_needed);
        assert_eq!(ai.calls(), 0);
    }

    #[tokio::test]
    async fn test_correction_hit_stops_regardless_of_confidence() {
        let correction = FixedStage::ok(
            StageKind::Correction,
            vec![candidate("TaylorMade", "Qi10 Driver", 1.0, CandidateSource::Library)],
        );
        let library = FixedStage::ok(StageKind::Library, vec![]);
        let outcome = resolver(vec![correction as Arc<dyn Stage>, library.clone()])
            .identify(&request("my white driver"))
            .await;

        assert_eq!(outcome.stage_reached, Some(StageKind::Correction));
        assert_eq!(library.calls(), 0);
    }

    #[tokio::test]
    async fn test_weak_results_fall_through_to_web() {
        let library = FixedStage::ok(
            StageKind::Library,
            vec![candidate("Callaway", "Paradym Driver", 0.6, CandidateSource::Library)],
        );
        let ai = FixedStage::ok(
            StageKind::Ai,
            vec![candidate("Callaway", "Paradym Ai Smoke Driver", 0.65, CandidateSource::Ai)],
        );
        let web = FixedStage::ok(
            StageKind::Web,
            vec![candidate("Callaway", "Paradym Driver", 0.55, CandidateSource::Web)],
        );
        let outcome = resolver(vec![library as Arc<dyn Stage>, ai, web.clone()])
            .identify(&request("callaway driver"))
            .await;

        assert_eq!(web.calls(), 1);
        assert_eq!(outcome.stage_reached, Some(StageKind::Web));
        // Web duplicate of the library entry merged away
        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(outcome.candidates[0].source, CandidateSource::Ai);
        assert_eq!(outcome.candidates[1].source, CandidateSource::Library);
    }

    #[tokio::test]
    async fn test_failures_recorded_and_next_stage_runs() {
        let ai = FixedStage::failing(StageKind::Ai, "provider down");
        let web = FixedStage::ok(
            StageKind::Web,
            vec![candidate("Callaway", "Paradym Driver", 0.6, CandidateSource::Web)],
        );
        let outcome = resolver(vec![ai as Arc<dyn Stage>, web]).identify(&request("callaway driver")).await;

        assert_eq!(outcome.stage_errors.len(), 1);
        assert_eq!(outcome.stage_errors[0].stage, StageKind::Ai);
        assert!(outcome.stage_errors[0].message.contains("provider down"));
        assert_eq!(outcome.candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_stage_timeout() {
        let config = IdentificationConfig {
            stage_timeout_ms: 50,
            ..IdentificationConfig::default()
        };
        let slow = FixedStage::slow(StageKind::Ai, Duration::from_secs(5));
        let outcome = Resolver::new(vec![slow as Arc<dyn Stage>], config)
            .identify(&request("golf"))
            .await;

        assert!(outcome.candidates.is_empty());
        assert!(outcome.clarification_needed);
        assert_eq!(outcome.stage_errors[0].message, "Timed out after 50 ms");
    }

    #[tokio::test]
    async fn test_vague_text_gets_questions() {
        let web = FixedStage::ok(StageKind::Web, vec![]);
        let outcome = resolver(vec![web as Arc<dyn Stage>]).identify(&request("driver")).await;

        assert!(outcome.clarification_needed);
        assert!(!outcome.questions.is_empty());
    }

    #[tokio::test]
    async fn test_truncates_to_max_candidates() {
        let many: Vec<Candidate> = (0..8)
            .map(|i| candidate("Titleist", &format!("Model {}", i), 0.5 + i as f32 * 0.01, CandidateSource::Web))
            .collect();
        let outcome = resolver(vec![FixedStage::ok(StageKind::Web, many) as Arc<dyn Stage>])
            .identify(&request("titleist golf ball"))
            .await;

        assert_eq!(outcome.candidates.len(), 5);
        assert_eq!(outcome.candidates[0].name, "Model 7");
    }

    #[tokio::test]
    async fn test_confident_ai_answer_is_learned() {
        let pool = teed_common::db::connect_in_memory().await.unwrap();
        let library = Arc::new(ProductLibrary::load(pool, 0.75).await.unwrap());
        let ai = FixedStage::ok(
            StageKind::Ai,
            vec![candidate("Callaway", "Paradym Driver", 0.8, CandidateSource::Ai)],
        );

        resolver(vec![ai as Arc<dyn Stage>])
            .with_library(library.clone())
            .identify(&request("callaway paradym driver"))
            .await;

        assert_eq!(library.len().await, 1);
    }

    #[test]
    fn test_sort_order_ties() {
        let mut candidates = vec![
            candidate("B", "Web", 0.7, CandidateSource::Web),
            Candidate::new(None, "Unbranded", Category::Golf, 0.7, CandidateSource::Library),
            candidate("A", "Library", 0.7, CandidateSource::Library),
            candidate("C", "Ai", 0.7, CandidateSource::Ai),
        ];
        sort_candidates(&mut candidates);
        let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Library", "Unbranded", "Ai", "Web"]);
    }

    #[test]
    fn test_merge_keeps_best_and_fills_url() {
        let library = candidate("Nike", "Pegasus 41", 0.82, CandidateSource::Library);
        let web = candidate("NIKE", "pegasus 41", 0.6, CandidateSource::Web).with_url("https://www.nike.com/t/pegasus-41");

        let merged = merge_candidates(vec![library], vec![web]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, CandidateSource::Library);
        assert_eq!(merged[0].url.as_deref(), Some("https://www.nike.com/t/pegasus-41"));
    }
}
