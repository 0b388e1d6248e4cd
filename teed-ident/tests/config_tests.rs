//! Provider credential resolution
//!
//! Tests that touch TEED_* key variables are #[serial] so environment
//! changes don't leak between them.

use serial_test::serial;
use teed_common::config::TomlConfig;
use teed_common::Error;
use teed_ident::config::{resolve_api_key, ApiKeyKind, ApiKeys};

fn toml_with_gemini(key: &str) -> TomlConfig {
    TomlConfig {
        gemini_api_key: Some(key.to_string()),
        ..TomlConfig::default()
    }
}

#[tokio::test]
#[serial]
async fn test_database_beats_env_and_toml() {
    let pool = teed_common::db::connect_in_memory().await.unwrap();
    teed_ident::db::settings::set_api_key(&pool, ApiKeyKind::Gemini, "from-db".to_string())
        .await
        .unwrap();
    std::env::set_var("TEED_GEMINI_API_KEY", "from-env");

    let key = resolve_api_key(&pool, &toml_with_gemini("from-toml"), ApiKeyKind::Gemini).await;

    std::env::remove_var("TEED_GEMINI_API_KEY");
    assert_eq!(key.unwrap(), "from-db");
}

#[tokio::test]
#[serial]
async fn test_env_beats_toml() {
    let pool = teed_common::db::connect_in_memory().await.unwrap();
    std::env::set_var("TEED_GEMINI_API_KEY", "from-env");

    let key = resolve_api_key(&pool, &toml_with_gemini("from-toml"), ApiKeyKind::Gemini).await;

    std::env::remove_var("TEED_GEMINI_API_KEY");
    assert_eq!(key.unwrap(), "from-env");
}

#[tokio::test]
#[serial]
async fn test_blank_values_fall_through() {
    let pool = teed_common::db::connect_in_memory().await.unwrap();
    teed_ident::db::settings::set_api_key(&pool, ApiKeyKind::Gemini, "   ".to_string())
        .await
        .unwrap();
    std::env::set_var("TEED_GEMINI_API_KEY", "");

    let key = resolve_api_key(&pool, &toml_with_gemini("from-toml"), ApiKeyKind::Gemini).await;

    std::env::remove_var("TEED_GEMINI_API_KEY");
    assert_eq!(key.unwrap(), "from-toml");
}

#[tokio::test]
#[serial]
async fn test_missing_key_is_config_error_and_store_skips_it() {
    let pool = teed_common::db::connect_in_memory().await.unwrap();
    std::env::remove_var("TEED_GEMINI_API_KEY");

    let err = resolve_api_key(&pool, &TomlConfig::default(), ApiKeyKind::Gemini)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(msg) if msg.contains("TEED_GEMINI_API_KEY")));

    let keys = ApiKeys::load(&pool, &TomlConfig::default()).await.unwrap();
    assert_eq!(keys.get(ApiKeyKind::Gemini).await, None);
}
