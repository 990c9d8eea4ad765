//! LLM extractor.
//!
//! Sends the description to an injected [`Provider`] with a fixed schema
//! prompt and reads back a single JSON block. Model output is untrusted:
//! anything that fails to decode or does not match the draft schema turns
//! into the null candidate, as do backend errors, timeouts and
//! cancellation.

use crate::normalizer::parse_measurement;
use crate::patterns::{self, HolePattern, MAX_PATTERN_COUNT};
use partspec_config::ExtractionConfig;
use partspec_core::{
    Candidate, Message, ParameterSet, Provider, ProviderRequest, SchemaError, ShapeArchetype,
    Source,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Confidence multiplier applied when the JSON block needed repair.
pub const REPAIR_PENALTY: f64 = 0.8;

const INSTRUCTIONS: &str = "You are a CAD parameter extraction system. \
Read the part description and return EXACTLY ONE JSON object that matches the schema below, \
with no additional text, explanation, or examples. \
All lengths are millimetres; convert other units. \
Only include dimensions that the description states. Never guess a missing value; omit it instead.";

/// The JSON Schema the model's draft must satisfy.
pub fn draft_schema() -> Value {
    let archetypes: Vec<&str> = ShapeArchetype::ALL.iter().map(|a| a.as_str()).collect();
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "PartDraft",
        "type": "object",
        "required": ["archetype", "dimensions"],
        "properties": {
            "archetype": { "type": "string", "enum": archetypes },
            "dimensions": {
                "type": "object",
                "additionalProperties": { "type": ["number", "string", "null"] }
            },
            "hole_patterns": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["layout", "diameter"],
                    "properties": {
                        "layout": {
                            "type": "string",
                            "enum": ["center", "corners", "pitch_circle", "offset"]
                        },
                        "count": { "type": ["integer", "null"], "minimum": 1, "maximum": MAX_PATTERN_COUNT },
                        "diameter": { "type": "number", "exclusiveMinimum": 0 },
                        "offset": { "type": ["number", "null"] },
                        "pitch_diameter": { "type": ["number", "null"], "exclusiveMinimum": 0 },
                        "dx": { "type": ["number", "null"] },
                        "dy": { "type": ["number", "null"] }
                    }
                }
            }
        }
    })
}

fn vocabulary() -> String {
    ShapeArchetype::ALL
        .iter()
        .map(|a| {
            format!(
                "- {}: required {}; optional {}",
                a,
                a.required_dimensions().join(", "),
                a.optional_dimensions().join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The language-model-backed extractor.
pub struct LlmExtractor {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl LlmExtractor {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        let defaults = ExtractionConfig::default();
        Self {
            provider,
            model: model.into(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            timeout: defaults.llm_timeout(),
        }
    }

    /// Take sampling settings and the call timeout from configuration.
    pub fn with_settings(mut self, settings: &ExtractionConfig) -> Self {
        self.temperature = settings.temperature;
        self.max_tokens = settings.max_tokens;
        self.timeout = settings.llm_timeout();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn request(&self, text: &str) -> ProviderRequest {
        let schema = draft_schema();
        let schema_text =
            serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string());
        ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(format!(
                    "{INSTRUCTIONS}\n\nArchetypes and their dimensions:\n{}\n\nJSON Schema:\n{schema_text}",
                    vocabulary()
                )),
                Message::user(format!("Description: {text}\n\nJSON:")),
            ],
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            stop: Vec::new(),
        }
    }

    /// Ask the backend for a candidate, bounded by the configured timeout.
    pub async fn extract(&self, text: &str) -> Candidate {
        let provider = self.provider.name().to_string();
        debug!(provider = %provider, model = %self.model, "Requesting LLM extraction");

        match tokio::time::timeout(self.timeout, self.provider.complete(self.request(text))).await
        {
            Ok(Ok(response)) => self.interpret(text, &response.message.content),
            Ok(Err(e)) => {
                warn!(provider = %provider, error = %e, "LLM backend failed");
                Candidate::none()
            }
            Err(_) => {
                warn!(
                    provider = %provider,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "LLM extraction timed out"
                );
                Candidate::none()
            }
        }
    }

    /// Like [`extract`](Self::extract), but gives up as soon as `cancel`
    /// completes.
    pub async fn extract_until<F>(&self, text: &str, cancel: F) -> Candidate
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            candidate = self.extract(text) => candidate,
            () = cancel => {
                info!(provider = %self.provider.name(), "LLM extraction cancelled");
                Candidate::none()
            }
        }
    }

    /// Turn raw model output into a candidate.
    pub fn interpret(&self, text: &str, output: &str) -> Candidate {
        match parse_response(text, output) {
            Ok(set) => {
                debug!(
                    archetype = %set.archetype,
                    confidence = set.metadata.confidence,
                    "LLM candidate"
                );
                Candidate::found(set)
            }
            Err(e) => {
                warn!(error = %e, "Model output rejected");
                Candidate::none()
            }
        }
    }
}

/// Decode model output into a parameter set for `raw_text`.
pub fn parse_response(raw_text: &str, output: &str) -> Result<ParameterSet, SchemaError> {
    let block = find_block(output).ok_or(SchemaError::NoBlock)?;
    let (value, repaired) = decode_lenient(block)?;

    let errors = collect_validation_errors(&draft_schema(), &value);
    if !errors.is_empty() {
        return Err(SchemaError::Mismatch(errors));
    }

    let draft: Draft =
        serde_json::from_value(value).map_err(|e| SchemaError::Decode(e.to_string()))?;
    draft.into_parameters(raw_text, repaired)
}

fn collect_validation_errors(schema: &Value, instance: &Value) -> Vec<String> {
    match jsonschema::Validator::new(schema) {
        Ok(validator) => validator
            .iter_errors(instance)
            .map(|error| format!("At path '{}': {}", error.instance_path, error))
            .collect(),
        Err(e) => vec![format!("Schema compilation error: {e}")],
    }
}

#[derive(Debug, Deserialize)]
struct Draft {
    archetype: String,
    #[serde(default)]
    dimensions: BTreeMap<String, Option<DraftValue>>,
    #[serde(default)]
    hole_patterns: Vec<HolePattern>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DraftValue {
    Number(f64),
    Text(String),
}

impl Draft {
    fn into_parameters(self, raw_text: &str, repaired: bool) -> Result<ParameterSet, SchemaError> {
        let archetype: ShapeArchetype = self
            .archetype
            .parse()
            .map_err(|e: String| SchemaError::Mismatch(vec![e]))?;
        let mut set = ParameterSet::new(archetype, Source::Llm, raw_text);

        for (name, value) in self.dimensions {
            let Some(value) = value else { continue };
            if !archetype.accepts_dimension(&name) {
                debug!(dimension = %name, %archetype, "Ignoring dimension the archetype does not use");
                continue;
            }
            let mm = match value {
                DraftValue::Number(v) => v,
                DraftValue::Text(s) => parse_measurement(&s)
                    .map_err(|e| SchemaError::Mismatch(vec![format!("dimension '{name}': {e}")]))?,
            };
            set.set_dimension(name, mm);
        }

        let mut required = archetype.required_dimensions().len();
        let mut unresolved: BTreeSet<String> =
            set.missing_required().iter().map(|s| s.to_string()).collect();
        let mut missing = unresolved.len();

        for pattern in &self.hole_patterns {
            required += 2;
            if let Err(field) = patterns::expand(pattern, &mut set) {
                missing += 1;
                unresolved.insert(field.to_string());
            }
        }

        let mut confidence = (required - missing) as f64 / required as f64;
        if repaired {
            confidence *= REPAIR_PENALTY;
        }
        set.metadata.confidence = confidence;
        set.metadata.unresolved = unresolved.into_iter().collect();
        Ok(set)
    }
}

/// The first balanced `{...}` block, honouring string literals.
pub fn find_block(output: &str) -> Option<&str> {
    let start = output.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in output[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&output[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode strictly, falling back to [`repair`]. The flag reports whether
/// repair was needed.
fn decode_lenient(block: &str) -> Result<(Value, bool), SchemaError> {
    match serde_json::from_str(block) {
        Ok(value) => Ok((value, false)),
        Err(strict) => {
            let repaired = repair(block);
            if repaired == block {
                return Err(SchemaError::Decode(strict.to_string()));
            }
            serde_json::from_str(&repaired)
                .map(|value| (value, true))
                .map_err(|_| SchemaError::Decode(strict.to_string()))
        }
    }
}

/// Drop trailing commas and rewrite `True`/`False`/`None` outside strings.
fn repair(block: &str) -> String {
    let chars: Vec<char> = block.chars().collect();
    let mut out = String::with_capacity(block.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            i += 1;
            continue;
        }

        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if !matches!(next, Some('}') | Some(']')) {
                out.push(c);
            }
            i += 1;
        } else if c.is_ascii_alphabetic() {
            let end = chars[i..]
                .iter()
                .position(|c| !c.is_ascii_alphanumeric() && *c != '_')
                .map_or(chars.len(), |p| i + p);
            let word: String = chars[i..end].iter().collect();
            out.push_str(match word.as_str() {
                "True" => "true",
                "False" => "false",
                "None" => "null",
                other => other,
            });
            i = end;
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}
