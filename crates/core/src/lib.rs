//! # partspec Core
//!
//! Domain types, traits, and error definitions for the partspec
//! text-to-geometry pipeline. This crate has **no I/O** — it defines the
//! parameter model that every other crate produces, revises, or checks.
//!
//! ## Layout
//!
//! - [`model`] — archetypes, dimensions, hole features, parameter sets
//! - [`error`] — the error taxonomy shared by extraction and validation
//! - [`provider`] — the language-model backend capability
//! - [`message`] — chat messages exchanged with a backend

pub mod error;
pub mod message;
pub mod model;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{
    Error, ExtractionError, GeometryError, GeometryRule, ProviderError, Result, SchemaError,
    UnitError,
};
pub use message::{Message, Role};
pub use model::{
    Anchor, Candidate, Dimension, ExtractionMode, HoleFeature, HoleGroup, Metadata,
    ParameterSet, Placement, ShapeArchetype, Source,
};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
