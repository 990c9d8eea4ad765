//! Provider router — selects the language-model backend based on config.
//!
//! The router is built once at startup; the pipeline takes the resolved
//! provider as an injected `Arc<dyn Provider>`.

use crate::openai_compat::OpenAiCompatProvider;
use partspec_config::AppConfig;
use partspec_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Routes LLM requests to the correct provider.
#[derive(Default)]
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Resolve a provider from a name, or an ad-hoc `custom:<url>` endpoint.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Provider>> {
        if let Some(url) = name.strip_prefix("custom:") {
            return Some(Arc::new(OpenAiCompatProvider::new("custom", url, "")));
        }
        self.get(name)
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new();

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));

        debug!(provider = %name, url = %base_url, "Registering provider");
        router.register(name.clone(), Arc::new(build_provider(name, &base_url, &api_key)));
    }

    // The default provider exists even when it has no explicit section
    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        let base_url = default_base_url(&config.default_provider);
        router.register(
            config.default_provider.clone(),
            Arc::new(build_provider(&config.default_provider, &base_url, &api_key)),
        );
    }

    router
}

fn build_provider(name: &str, base_url: &str, api_key: &str) -> OpenAiCompatProvider {
    OpenAiCompatProvider::new(name, base_url, api_key).with_json_mode(supports_json_mode(name))
}

/// Endpoints known to honour `response_format: json_object`.
fn supports_json_mode(provider_name: &str) -> bool {
    matches!(provider_name, "openai" | "openrouter" | "ollama" | "deepseek" | "groq")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
