//! Staged product identification
//!
//! A request passes through up to four stages, cheapest first:
//!
//! 1. **correction**: a human-verified answer for this exact input (or a
//!    near-identical one) ends the run immediately
//! 2. **library**: known products, plus what the URL alone reveals; stops at
//!    the library threshold
//! 3. **ai**: hosted model suggestions; stops at the AI threshold
//! 4. **web**: search results ranked by domain trust, confidence capped
//!
//! Every stage runs under a time budget. A stage that fails or times out is
//! recorded in the outcome and the next stage runs.

pub mod resolver;
pub mod stages;

use async_trait::async_trait;
use thiserror::Error;

use crate::services::google_search_client::SearchError;
use crate::services::input::PreparedRequest;
use crate::services::model::ModelError;
use crate::types::{Candidate, StageKind};

pub use resolver::Resolver;
pub use stages::{AiStage, CorrectionStage, LibraryStage, WebStage};

/// Why a stage produced nothing
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Storage error: {0}")]
    Storage(#[from] teed_common::Error),

    #[error("Unusable response: {0}")]
    Response(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

/// One step of the identification pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Candidates for the request
    ///
    /// `prior` holds everything earlier stages found, best first.
    async fn identify(&self, request: &PreparedRequest, prior: &[Candidate]) -> Result<Vec<Candidate>, StageError>;
}
