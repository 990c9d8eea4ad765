//! The `process()` entry point.
//!
//! One request runs end to end per call: both extractors (concurrently in
//! auto mode), arbitration, then optional validation. Nothing is shared
//! between calls except the injected backend.

use partspec_config::AppConfig;
use partspec_core::{Candidate, ExtractionError, ExtractionMode, ParameterSet, Result};
use partspec_extract::{LlmExtractor, RuleExtractor, resolve};
use partspec_geometry::ValidatedParameterSet;
use partspec_providers::build_from_config;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Providers that run locally and need no API key.
const LOCAL_PROVIDERS: &[&str] = &["ollama", "vllm"];

/// The outcome of [`Pipeline::process`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Processed {
    Validated(ValidatedParameterSet),
    Unvalidated(ParameterSet),
}

impl Processed {
    pub fn parameters(&self) -> &ParameterSet {
        match self {
            Processed::Validated(v) => v.parameters(),
            Processed::Unvalidated(p) => p,
        }
    }

    pub fn is_validated(&self) -> bool {
        matches!(self, Processed::Validated(_))
    }

    pub fn into_parameters(self) -> ParameterSet {
        match self {
            Processed::Validated(v) => v.into_inner(),
            Processed::Unvalidated(p) => p,
        }
    }

    /// The interchange JSON; identical for both variants.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Text-to-parameters pipeline.
pub struct Pipeline {
    rule: RuleExtractor,
    llm: Option<LlmExtractor>,
}

impl Pipeline {
    /// A pipeline with only the rule-based path.
    pub fn new(rule: RuleExtractor) -> Self {
        Self { rule, llm: None }
    }

    pub fn with_llm(mut self, llm: LlmExtractor) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Build from configuration. The LLM path is attached only when it is
    /// enabled and the default provider has credentials (or runs locally).
    pub fn from_config(config: &AppConfig) -> Self {
        let rule = RuleExtractor::new().with_strict_units(config.extraction.strict_units);
        let pipeline = Self::new(rule);

        if !config.extraction.llm_enabled {
            info!("LLM extraction disabled; using rule-based extraction only");
            return pipeline;
        }
        if !backend_configured(config) {
            info!(
                provider = %config.default_provider,
                "No API key for LLM backend; using rule-based extraction only"
            );
            return pipeline;
        }

        let router = build_from_config(config);
        debug!(providers = ?router.names(), "Built provider router");
        match router.resolve(&config.default_provider) {
            Some(provider) => {
                let model = config.model_for(&config.default_provider);
                debug!(model, "Attaching LLM extractor");
                pipeline.with_llm(LlmExtractor::new(provider, model).with_settings(&config.extraction))
            }
            None => {
                warn!(provider = %config.default_provider, "Unknown LLM provider");
                pipeline
            }
        }
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    /// Run the extractors that `mode` needs and arbitrate.
    pub async fn extract(
        &self,
        text: &str,
        mode: ExtractionMode,
    ) -> std::result::Result<ParameterSet, ExtractionError> {
        let (rule, llm) = match mode {
            ExtractionMode::ForceRule => (self.rule.extract(text), Candidate::none()),
            ExtractionMode::ForceLlm => (Candidate::none(), self.llm_candidate(text).await),
            ExtractionMode::Auto => {
                tokio::join!(async { self.rule.extract(text) }, self.llm_candidate(text))
            }
        };
        debug!(
            rule_confidence = rule.confidence,
            llm_confidence = llm.confidence,
            "Extractors finished"
        );
        resolve(rule, llm, mode)
    }

    /// Extract, then validate when asked to.
    pub async fn process(&self, text: &str, mode: ExtractionMode, validate: bool) -> Result<Processed> {
        info!(%mode, validate, llm = self.has_llm(), "Processing description");
        let set = self.extract(text, mode).await?;
        if !validate {
            return Ok(Processed::Unvalidated(set));
        }
        Ok(Processed::Validated(partspec_geometry::validate(set)?))
    }

    async fn llm_candidate(&self, text: &str) -> Candidate {
        match &self.llm {
            Some(llm) => llm.extract(text).await,
            None => {
                debug!("No LLM backend attached");
                Candidate::none()
            }
        }
    }
}

fn backend_configured(config: &AppConfig) -> bool {
    let name = config.default_provider.as_str();
    config.has_api_key()
        || config
            .providers
            .get(name)
            .is_some_and(|p| p.api_key.is_some())
        || LOCAL_PROVIDERS.contains(&name)
        || name.starts_with("custom:")
}
