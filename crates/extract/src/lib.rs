//! # partspec Extract
//!
//! Turns a free-text part description into candidate [`ParameterSet`]s.
//!
//! - [`normalizer`] rewrites measurements as canonical millimetres
//! - [`rule`] is the deterministic, pattern-driven extractor
//! - [`llm`] asks a language-model backend for a schema-checked draft
//! - [`arbitration`] picks or merges the two candidates
//!
//! [`ParameterSet`]: partspec_core::ParameterSet

pub mod arbitration;
pub mod grammar;
pub mod llm;
pub mod normalizer;
pub mod patterns;
pub mod rule;

pub use arbitration::resolve;
pub use llm::LlmExtractor;
pub use normalizer::{Normalized, normalize, parse_measurement};
pub use patterns::{HolePattern, Layout};
pub use rule::RuleExtractor;
