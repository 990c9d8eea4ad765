//! Error types for the partspec domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each stage of the pipeline has its own error type; only
//! [`ExtractionError`] and [`GeometryError`] are meant to reach callers,
//! the rest are recovered inside the extractors.

use thiserror::Error;

/// The top-level error type for all partspec operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Extraction stages ---
    #[error("Unit error: {0}")]
    Unit(#[from] UnitError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    // --- Validation ---
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    // --- Backend ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Stage errors ---

/// A measurement whose unit could not be determined.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("unrecognised unit '{unit}' in '{token}'")]
    UnknownUnit { token: String, unit: String },

    #[error("measurement {value} in '{context}' has no unit")]
    MissingUnit { value: f64, context: String },

    #[error("not a number: '{0}'")]
    InvalidNumber(String),
}

/// Model output that does not decode into the parameter schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("no structured data block found in model output")]
    NoBlock,

    #[error("structured data block failed to decode: {0}")]
    Decode(String),

    #[error("decoded data does not match schema: {}", .0.join("; "))]
    Mismatch(Vec<String>),
}

/// No usable candidate remained after arbitration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    #[error("forced {path} extraction produced no candidate")]
    ForcedUnavailable { path: String },

    #[error("neither extractor produced a candidate for the description")]
    NoCandidate,
}

/// The validator rule that rejected a parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryRule {
    /// Rule 1: required dimensions present and strictly positive.
    RequiredDimensions,
    /// Rule 2: plate material bounds and hole overlap.
    PlateBounds,
    /// Rule 3: flange diameters and pitch circle spacing.
    FlangeGeometry,
    /// Rule 4: pattern group counts and angle lists.
    PatternGroups,
}

impl GeometryRule {
    pub fn number(self) -> u8 {
        match self {
            GeometryRule::RequiredDimensions => 1,
            GeometryRule::PlateBounds => 2,
            GeometryRule::FlangeGeometry => 3,
            GeometryRule::PatternGroups => 4,
        }
    }
}

impl std::fmt::Display for GeometryRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GeometryRule::RequiredDimensions => "required dimensions",
            GeometryRule::PlateBounds => "plate bounds",
            GeometryRule::FlangeGeometry => "flange geometry",
            GeometryRule::PatternGroups => "pattern groups",
        };
        write!(f, "rule {} ({name})", self.number())
    }
}

/// A parameter set that violates a geometric rule.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{rule}: {reason}")]
pub struct GeometryError {
    pub rule: GeometryRule,
    pub reason: String,
}

impl GeometryError {
    pub fn new(rule: GeometryRule, reason: impl Into<String>) -> Self {
        Self {
            rule,
            reason: reason.into(),
        }
    }
}

/// Failures talking to a language-model backend.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_error_names_rule_and_reason() {
        let err = Error::Geometry(GeometryError::new(
            GeometryRule::FlangeGeometry,
            "inner ≥ outer: inner_diameter 250 must be less than outer_diameter 200",
        ));
        let text = err.to_string();
        assert!(text.contains("rule 3"));
        assert!(text.contains("inner ≥ outer"));
    }

    #[test]
    fn schema_mismatch_joins_messages() {
        let err = SchemaError::Mismatch(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "decoded data does not match schema: a; b");
    }

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }
}
