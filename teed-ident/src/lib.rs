//! teed-ident library interface
//!
//! Exposes the identification pipeline, provider clients and HTTP router for
//! the binary and for integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod links;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod text;
pub mod types;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::{middleware, Router};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use teed_common::config::{AiProvider, TomlConfig};
use teed_common::{Error, Result};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ApiKeys;
use crate::pipeline::{AiStage, CorrectionStage, LibraryStage, Resolver, Stage, WebStage};
use crate::services::{
    CorrectionService, GeminiClient, GoogleSearchClient, LinkFinder, ModelChain, OpenAiClient, ProductLibrary,
    ProductModel, RateLimiter, TelemetryRecorder, UsageRecorder,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub library: Arc<ProductLibrary>,
    pub resolver: Arc<Resolver>,
    pub corrections: Arc<CorrectionService>,
    pub link_finder: Arc<LinkFinder>,
    pub rate_limiter: Arc<RateLimiter>,
    /// Live provider credentials
    pub api_keys: Arc<ApiKeys>,
    pub telemetry: TelemetryRecorder,
    /// TOML file that mirrors keys set over HTTP
    pub toml_path: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// Wire every service from configuration
    ///
    /// The database must already have its schema. Provider keys are resolved
    /// here; a provider without a key stays wired and fails per request,
    /// which the pipeline records as a stage error.
    pub async fn initialize(db: SqlitePool, config: &TomlConfig, toml_path: PathBuf) -> Result<Self> {
        let api_keys = Arc::new(ApiKeys::load(&db, config).await?);
        let usage = UsageRecorder::new(db.clone());
        let telemetry = TelemetryRecorder::new(db.clone());
        let identification = config.identification.clone();

        let library = Arc::new(ProductLibrary::load(db.clone(), identification.learn_threshold).await?);
        if let Some(seed) = &config.library_seed {
            match library.import_seed(seed).await {
                Ok(added) => info!(added, seed = %seed.display(), "Library seed imported"),
                Err(e) => warn!(seed = %seed.display(), error = %e, "Library seed import failed"),
            }
        }

        let model: Arc<dyn ProductModel> = Arc::new(build_model_chain(config, &api_keys, &usage)?);
        let search = Arc::new(
            GoogleSearchClient::new(&config.providers, api_keys.clone(), Some(usage.clone()))
                .map_err(|e| Error::Internal(format!("Search client: {}", e)))?,
        );
        let corrections = Arc::new(CorrectionService::new(db.clone(), library.clone()));

        let num_results = (identification.max_candidates * 2).clamp(1, 10) as u8;
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(CorrectionStage::new(corrections.clone())),
            Arc::new(LibraryStage::new(library.clone(), identification.max_candidates)),
            Arc::new(AiStage::new(model.clone())),
            Arc::new(WebStage::new(search, identification.web_confidence_cap, num_results)),
        ];
        let resolver = Resolver::new(stages, identification)
            .with_library(library.clone())
            .with_telemetry(telemetry.clone());

        Ok(Self {
            db,
            library,
            resolver: Arc::new(resolver),
            corrections,
            link_finder: Arc::new(LinkFinder::new(model)),
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            api_keys,
            telemetry,
            toml_path,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        })
    }

    /// Replace the identification pipeline
    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Remember an error for `/health`
    pub async fn note_error(&self, message: String) {
        *self.last_error.write().await = Some(message);
    }
}

/// Configured providers, primary first
fn build_model_chain(config: &TomlConfig, keys: &Arc<ApiKeys>, usage: &UsageRecorder) -> Result<ModelChain> {
    let providers = &config.providers;
    let mut order = vec![providers.ai_provider];
    if let Some(fallback) = providers.fallback_provider.filter(|f| *f != providers.ai_provider) {
        order.push(fallback);
    }

    let mut models: Vec<Arc<dyn ProductModel>> = Vec::with_capacity(order.len());
    for provider in order {
        let model: Arc<dyn ProductModel> = match provider {
            AiProvider::OpenAi => Arc::new(
                OpenAiClient::new(providers, keys.clone(), Some(usage.clone()))
                    .map_err(|e| Error::Internal(format!("OpenAI client: {}", e)))?,
            ),
            AiProvider::Gemini => Arc::new(
                GeminiClient::new(providers, keys.clone(), Some(usage.clone()))
                    .map_err(|e| Error::Internal(format!("Gemini client: {}", e)))?,
            ),
        };
        models.push(model);
    }
    Ok(ModelChain::new(models))
}

/// Build application router
///
/// `/api/identify` and `/api/links` sit behind the per-client rate limiter.
pub fn build_router(state: AppState) -> Router {
    let limited = Router::new()
        .merge(api::identify_routes())
        .merge(api::link_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), api::rate_limit));

    Router::new()
        .merge(limited)
        .merge(api::correction_routes())
        .merge(api::telemetry_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
