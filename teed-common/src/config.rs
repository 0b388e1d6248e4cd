//! Configuration loading and root folder resolution
//!
//! TOML configuration is optional. A missing file is not an error: every
//! field has a compiled default and services start with a warning.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "TEED_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "teed.db";

/// Contents of `~/.config/teed/<module>.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Root folder holding the database
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,
    /// HTTP listen port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub logging: LoggingConfig,
    /// JSON file of products loaded into the library at startup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_seed: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search_engine_id: Option<String>,
    pub identification: IdentificationConfig,
    pub rate_limit: RateLimitConfig,
    pub providers: ProvidersConfig,
}

/// Logging section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (e.g. "info", "debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Confidence thresholds and limits for the identification pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdentificationConfig {
    /// Library match confidence that returns immediately
    pub library_threshold: f32,
    /// Model confidence that skips web search
    pub ai_threshold: f32,
    /// Upper bound for confidence of web search candidates
    pub web_confidence_cap: f32,
    /// Below this top confidence the caller is asked for more input
    pub clarification_threshold: f32,
    /// Minimum confidence for model results to be added to the library
    pub learn_threshold: f32,
    /// Per-stage time budget
    pub stage_timeout_ms: u64,
    /// Maximum candidates returned to the caller
    pub max_candidates: usize,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            library_threshold: 0.8,
            ai_threshold: 0.7,
            web_confidence_cap: 0.6,
            clarification_threshold: 0.5,
            learn_threshold: 0.75,
            stage_timeout_ms: 25_000,
            max_candidates: 5,
        }
    }
}

/// Per-client-IP fixed-window rate limiting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests allowed per window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 30,
            window_secs: 60,
        }
    }
}

/// Hosted model providers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    OpenAi,
    Gemini,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::OpenAi => "openai",
            AiProvider::Gemini => "gemini",
        }
    }
}

/// External provider endpoints and models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Provider tried first for the AI stage
    pub ai_provider: AiProvider,
    /// Provider tried when the primary one fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_provider: Option<AiProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_base_url: Option<String>,
    /// Model used for photos
    pub openai_vision_model: String,
    /// Model used for text and URL prompts
    pub openai_text_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_base_url: Option<String>,
    pub gemini_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search_base_url: Option<String>,
    /// Outbound request timeout; every configured provider must fit inside
    /// one stage budget
    pub request_timeout_ms: u64,
}

impl ProvidersConfig {
    /// Number of model providers the AI stage may try in sequence
    pub fn model_attempts(&self) -> u64 {
        match self.fallback_provider {
            Some(fallback) if fallback != self.ai_provider => 2,
            _ => 1,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            ai_provider: AiProvider::OpenAi,
            fallback_provider: Some(AiProvider::Gemini),
            openai_base_url: None,
            openai_vision_model: "gpt-4o".to_string(),
            openai_text_model: "gpt-4o-mini".to_string(),
            gemini_base_url: None,
            gemini_model: "gemini-1.5-flash".to_string(),
            google_search_base_url: None,
            request_timeout_ms: 10_000,
        }
    }
}

/// Default location of a module's TOML file
pub fn default_config_path(module_name: &str) -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("teed"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!("{}.toml", module_name))
}

/// Load TOML configuration
///
/// A missing file yields defaults. A file that exists but does not parse is
/// a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    config.validate()?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

impl TomlConfig {
    /// Reject timeouts that would let a hung primary model consume the whole
    /// AI stage before the fallback provider is tried
    pub fn validate(&self) -> Result<()> {
        let needed = self
            .providers
            .request_timeout_ms
            .saturating_mul(self.providers.model_attempts());
        if needed > self.identification.stage_timeout_ms {
            return Err(Error::Config(format!(
                "providers.request_timeout_ms ({}) x {} provider(s) exceeds identification.stage_timeout_ms ({})",
                self.providers.request_timeout_ms,
                self.providers.model_attempts(),
                self.identification.stage_timeout_ms
            )));
        }
        Ok(())
    }
}

/// Write TOML configuration atomically (temp file + rename)
///
/// The file holds API keys, so on Unix it is created with mode 0600.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Root folder resolution following priority order:
/// 1. Command-line argument
/// 2. `TEED_ROOT_FOLDER` environment variable
/// 3. TOML config `root_folder`
/// 4. OS-dependent compiled default
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            info!(module = %self.module_name, "Root folder from TOML: {}", path.display());
            return path.clone();
        }

        let path = default_root_folder();
        info!(module = %self.module_name, "Root folder from compiled default: {}", path.display());
        path
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("teed"))
        .unwrap_or_else(|| PathBuf::from("./teed_data"))
}

/// Creates the root folder and locates the database inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse_from_empty_toml() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.identification.library_threshold, 0.8);
        assert_eq!(config.rate_limit.max_requests, 30);
        assert_eq!(config.providers.ai_provider, AiProvider::OpenAi);
    }

    #[test]
    fn test_default_timeouts_leave_room_for_fallback() {
        let config = TomlConfig::default();
        assert_eq!(config.providers.model_attempts(), 2);
        assert!(
            config.providers.request_timeout_ms * config.providers.model_attempts()
                <= config.identification.stage_timeout_ms
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_request_timeout_longer_than_stage_rejected() {
        let mut config = TomlConfig::default();
        config.providers.request_timeout_ms = 30_000;
        config.identification.stage_timeout_ms = 20_000;
        assert!(matches!(config.validate(), Err(Error::Config(msg)) if msg.contains("stage_timeout_ms")));

        // Without a fallback a single attempt only has to fit once
        config.providers.fallback_provider = None;
        config.providers.request_timeout_ms = 20_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_inverted_timeouts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teed-ident.toml");
        std::fs::write(
            &path,
            "[providers]\nrequest_timeout_ms = 30000\n\n[identification]\nstage_timeout_ms = 20000\n",
        )
        .unwrap();
        assert!(matches!(load_toml_config(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [identification]
            ai_threshold = 0.65

            [providers]
            ai_provider = "gemini"
            "#,
        )
        .unwrap();

        assert_eq!(config.identification.ai_threshold, 0.65);
        assert_eq!(config.identification.library_threshold, 0.8);
        assert_eq!(config.providers.ai_provider, AiProvider::Gemini);
        assert_eq!(config.providers.openai_vision_model, "gpt-4o");
    }

    #[test]
    fn test_database_path_inside_root() {
        let init = RootFolderInitializer::new(PathBuf::from("/tmp/teed-root"));
        assert_eq!(init.database_path(), PathBuf::from("/tmp/teed-root/teed.db"));
    }
}
