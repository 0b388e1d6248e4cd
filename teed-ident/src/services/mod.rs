//! Service modules for product identification
//!
//! Request preparation, the product library, corrections, hosted model and
//! search clients, result ranking, link recommendations and bookkeeping.

pub mod corrections;
pub mod gemini_client;
pub mod google_search_client;
pub mod input;
pub mod library;
pub mod link_finder;
pub mod model;
pub mod openai_client;
pub mod prompts;
pub mod rate_limiter;
pub mod search_ranker;
pub mod telemetry;
pub mod usage;

pub use corrections::{CorrectedProduct, CorrectionReceipt, CorrectionService, OriginalGuess};
pub use gemini_client::GeminiClient;
pub use google_search_client::{GoogleSearchClient, SearchError, SearchResult};
pub use input::{prepare, PreparedInput, PreparedRequest};
pub use library::{LearnOutcome, LibraryMatch, ProductLibrary};
pub use link_finder::{LinkFinder, LinkRecommendation, LinkRequest, LinkResult};
pub use model::{ModelChain, ModelError, ModelReply, ModelRequest, ProductModel};
pub use openai_client::OpenAiClient;
pub use rate_limiter::RateLimiter;
pub use telemetry::TelemetryRecorder;
pub use usage::UsageRecorder;
