use std::collections::HashMap;

use gateflow_core::config::ModelConfig;

/// A named provider preset for OpenAI-compatible APIs.
pub struct ProviderPreset {
    pub default_base_url: &'static str,
    pub needs_api_key: bool,
    pub extra_headers: &'static [(&'static str, &'static str)],
}

/// Look up a provider preset by name.
pub fn get_preset(provider: &str) -> Option<ProviderPreset> {
    match provider {
        "github" => Some(ProviderPreset {
            default_base_url: "https://models.github.ai/inference/chat/completions",
            needs_api_key: true,
            extra_headers: &[],
        }),
        "openai" => Some(ProviderPreset {
            default_base_url: "https://api.openai.com/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[],
        }),
        "ollama" => Some(ProviderPreset {
            default_base_url: "http://localhost:11434/v1/chat/completions",
            needs_api_key: false,
            extra_headers: &[],
        }),
        // Azure endpoints are per-resource; base_url must be configured.
        _ => None,
    }
}

/// Fill in `base_url` and preset headers for known providers.
pub fn apply_preset_defaults(config: &mut ModelConfig) {
    if let Some(preset) = get_preset(&config.provider) {
        if config.base_url.is_none() {
            config.base_url = Some(preset.default_base_url.to_string());
        }
        for (k, v) in build_extra_headers(&preset, &config.extra_headers) {
            config.extra_headers.insert(k, v);
        }
        if preset.needs_api_key && config.api_key.is_none() {
            tracing::warn!(provider = %config.provider, "Provider expects an API key but none is configured");
        }
    }
}

/// Build extra headers from a preset + user config overrides.
pub fn build_extra_headers(
    preset: &ProviderPreset,
    user_headers: &HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = preset
        .extra_headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    for (k, v) in user_headers {
        // User overrides take precedence
        if let Some(pos) = headers.iter().position(|(hk, _)| hk == k) {
            headers[pos].1 = v.clone();
        } else {
            headers.push((k.clone(), v.clone()));
        }
    }

    headers
}
