use std::io::Write;

use gateflow_core::config::AppConfig;
use gateflow_core::error::GateflowError;
use gateflow_test_utils::{test_config, write_config};

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[model]
provider = "azure"
model_id = "gpt-4o-deploy"
api_key = "sk-test-key"
base_url = "https://example.openai.azure.com/openai/v1/chat/completions"
max_tokens = 2048
temperature = 0.5

[model.extra_headers]
x-trace = "ci"

[workflow]
max_supersteps = 12
show_updates = true

[review]
approval_keyword = "aprobar"
abandon_keyword = "salir"
draft_placeholder = "Sin borrador."

[quality]
approval_threshold = 70
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, "azure");
    assert_eq!(config.model.model_id, "gpt-4o-deploy");
    assert_eq!(config.model.api_key, Some("sk-test-key".to_string()));
    assert_eq!(config.model.max_tokens, 2048);
    assert!((config.model.temperature - 0.5).abs() < f32::EPSILON);
    assert_eq!(config.model.extra_headers.get("x-trace").map(String::as_str), Some("ci"));

    assert_eq!(config.workflow.max_supersteps, 12);
    assert!(config.workflow.show_updates);

    assert!(config.review.is_approval(" APROBAR "));
    assert!(config.review.is_abandon("salir"));
    assert_eq!(config.review.draft_placeholder, "Sin borrador.");
    // Unset review texts keep their defaults
    assert_eq!(config.review.approved_message, "The draft is approved as-is.");

    assert_eq!(config.quality.approval_threshold, 70);
}

#[test]
fn test_minimal_config_uses_defaults() {
    let (_dir, path) = write_config(
        r#"
[model]
model_id = "openai/gpt-4o"
"#,
    );
    let config = AppConfig::load(&path).expect("load config");

    assert_eq!(config.model.provider, "github");
    assert_eq!(config.model.max_tokens, 4096);
    assert!(config.model.api_key.is_none());
    assert_eq!(config.workflow.max_supersteps, 64);
    assert!(!config.workflow.show_updates);
    assert!(config.review.is_approval("approve"));
    assert!(config.review.is_abandon("quit"));
    assert_eq!(config.quality.approval_threshold, 80);
}

#[test]
fn test_env_var_expansion_in_file() {
    std::env::set_var("GATEFLOW_TEST_TOKEN", "ghp_from_env");
    let (_dir, path) = write_config(
        r#"
[model]
model_id = "openai/gpt-4o"
api_key = "${GATEFLOW_TEST_TOKEN}"
"#,
    );
    let config = AppConfig::load(&path).expect("load config");
    assert_eq!(config.model.api_key.as_deref(), Some("ghp_from_env"));
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let err = AppConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, GateflowError::ConfigNotFound(_)));
}

#[test]
fn test_invalid_toml_is_config_error() {
    let (_dir, path) = write_config("[model\nmodel_id = ");
    assert!(matches!(AppConfig::load(&path), Err(GateflowError::Config(_))));

    let (_dir, path) = write_config("[workflow]\nmax_supersteps = 3\n");
    assert!(matches!(AppConfig::load(&path), Err(GateflowError::Config(_))));
}

#[test]
fn test_redacted_config_serializes_without_key() {
    let mut config = test_config();
    config.model.api_key = Some("sk-secret".to_string());

    let printed = toml::to_string_pretty(&config.redacted()).expect("serialize");
    assert!(!printed.contains("sk-secret"));
    assert!(printed.contains("***"));
    assert_eq!(config.model.api_key.as_deref(), Some("sk-secret"));
}
