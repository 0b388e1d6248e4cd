//! Configuration resolution for teed-ident
//!
//! Provider credentials resolve with Database → ENV → TOML priority. Keys set
//! over HTTP go to the database and are mirrored into the TOML file on a
//! best-effort basis.

use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use teed_common::config::TomlConfig;
use teed_common::{Error, Result};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// External credentials the service can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKeyKind {
    OpenAi,
    Gemini,
    GoogleSearch,
    GoogleSearchEngine,
}

impl ApiKeyKind {
    pub const ALL: [ApiKeyKind; 4] = [
        ApiKeyKind::OpenAi,
        ApiKeyKind::Gemini,
        ApiKeyKind::GoogleSearch,
        ApiKeyKind::GoogleSearchEngine,
    ];

    /// Key in the `settings` table and field name in the TOML file
    pub fn setting_key(&self) -> &'static str {
        match self {
            ApiKeyKind::OpenAi => "openai_api_key",
            ApiKeyKind::Gemini => "gemini_api_key",
            ApiKeyKind::GoogleSearch => "google_search_api_key",
            ApiKeyKind::GoogleSearchEngine => "google_search_engine_id",
        }
    }

    pub fn env_var(&self) -> &'static str {
        match self {
            ApiKeyKind::OpenAi => "TEED_OPENAI_API_KEY",
            ApiKeyKind::Gemini => "TEED_GEMINI_API_KEY",
            ApiKeyKind::GoogleSearch => "TEED_GOOGLE_SEARCH_API_KEY",
            ApiKeyKind::GoogleSearchEngine => "TEED_GOOGLE_SEARCH_ENGINE_ID",
        }
    }

    /// Path segment used by `POST /api/settings/api_keys/:provider`
    pub fn from_provider(provider: &str) -> Option<Self> {
        match provider.trim().to_lowercase().as_str() {
            "openai" => Some(ApiKeyKind::OpenAi),
            "gemini" => Some(ApiKeyKind::Gemini),
            "google_search" => Some(ApiKeyKind::GoogleSearch),
            "google_search_engine" => Some(ApiKeyKind::GoogleSearchEngine),
            _ => None,
        }
    }

    fn from_toml<'a>(&self, config: &'a TomlConfig) -> Option<&'a String> {
        match self {
            ApiKeyKind::OpenAi => config.openai_api_key.as_ref(),
            ApiKeyKind::Gemini => config.gemini_api_key.as_ref(),
            ApiKeyKind::GoogleSearch => config.google_search_api_key.as_ref(),
            ApiKeyKind::GoogleSearchEngine => config.google_search_engine_id.as_ref(),
        }
    }

    fn set_in_toml(&self, config: &mut TomlConfig, value: String) {
        match self {
            ApiKeyKind::OpenAi => config.openai_api_key = Some(value),
            ApiKeyKind::Gemini => config.gemini_api_key = Some(value),
            ApiKeyKind::GoogleSearch => config.google_search_api_key = Some(value),
            ApiKeyKind::GoogleSearchEngine => config.google_search_engine_id = Some(value),
        }
    }
}

impl fmt::Display for ApiKeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ApiKeyKind::OpenAi => "OpenAI API key",
            ApiKeyKind::Gemini => "Gemini API key",
            ApiKeyKind::GoogleSearch => "Google Search API key",
            ApiKeyKind::GoogleSearchEngine => "Google Search engine id",
        };
        f.write_str(label)
    }
}

/// Resolve one credential from the three configuration tiers
///
/// **Priority:** Database → ENV → TOML
pub async fn resolve_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
    kind: ApiKeyKind,
) -> Result<String> {
    let mut sources = Vec::new();

    // Tier 1: Database (authoritative)
    let db_key = crate::db::settings::get_api_key(db, kind).await?;
    if db_key.as_deref().is_some_and(is_valid_key) {
        sources.push("database");
    }

    // Tier 2: Environment variable
    let env_key = std::env::var(kind.env_var()).ok();
    if env_key.as_deref().is_some_and(is_valid_key) {
        sources.push("environment");
    }

    // Tier 3: TOML config
    let toml_key = kind.from_toml(toml_config);
    if toml_key.is_some_and(|k| is_valid_key(k)) {
        sources.push("TOML");
    }

    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            kind,
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key.filter(|k| is_valid_key(k)) {
        info!("{} loaded from database", kind);
        return Ok(key);
    }
    if let Some(key) = env_key.filter(|k| is_valid_key(k)) {
        info!("{} loaded from environment variable", kind);
        return Ok(key);
    }
    if let Some(key) = toml_key.filter(|k| is_valid_key(k)) {
        info!("{} loaded from TOML config", kind);
        return Ok(key.clone());
    }

    Err(Error::Config(format!(
        "{} not configured. Configure using one of:\n\
         1. POST /api/settings/api_keys/<provider>\n\
         2. Environment: {}=your-key\n\
         3. TOML config: ~/.config/teed/teed-ident.toml ({} = \"your-key\")",
        kind,
        kind.env_var(),
        kind.setting_key()
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Live credential store shared by the provider clients
///
/// Clients read keys per request, so a key set over HTTP takes effect
/// without a restart.
#[derive(Debug, Default)]
pub struct ApiKeys {
    keys: RwLock<HashMap<ApiKeyKind, String>>,
}

impl ApiKeys {
    /// Resolve every credential; missing ones are logged and left unset
    pub async fn load(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<Self> {
        let mut keys = HashMap::new();
        for kind in ApiKeyKind::ALL {
            match resolve_api_key(db, toml_config, kind).await {
                Ok(key) => {
                    keys.insert(kind, key);
                }
                Err(Error::Config(_)) => {
                    info!("{} not configured; dependent stages will be skipped", kind);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Self {
            keys: RwLock::new(keys),
        })
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (ApiKeyKind, String)>) -> Self {
        Self {
            keys: RwLock::new(pairs.into_iter().collect()),
        }
    }

    pub async fn get(&self, kind: ApiKeyKind) -> Option<String> {
        self.keys.read().await.get(&kind).cloned()
    }

    pub async fn set(&self, kind: ApiKeyKind, key: String) {
        self.keys.write().await.insert(kind, key);
    }
}

/// Sync settings from database to TOML file
///
/// HashMap keys are setting keys ("openai_api_key", ...). Write failures are
/// logged and swallowed; the database write is what counts.
pub async fn sync_settings_to_toml(settings: HashMap<String, String>, toml_path: &Path) -> Result<()> {
    let mut config = if toml_path.exists() {
        let content = std::fs::read_to_string(toml_path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?
    } else {
        TomlConfig::default()
    };

    for kind in ApiKeyKind::ALL {
        if let Some(value) = settings.get(kind.setting_key()) {
            kind.set_in_toml(&mut config, value.clone());
        }
    }

    match teed_common::config::write_toml_config(&config, toml_path) {
        Ok(()) => {
            info!("Settings synced to TOML: {}", toml_path.display());
            Ok(())
        }
        Err(e) => {
            warn!("TOML write failed (database write succeeded): {}", e);
            Ok(())
        }
    }
}
