//! # partspec Pipeline
//!
//! The caller-facing surface: [`Pipeline::process`] turns a description
//! into a (optionally validated) parameter set, and [`DesignSession`]
//! keeps the revision history of a part being refined.

pub mod pipeline;
pub mod session;

pub use pipeline::{Pipeline, Processed};
pub use session::{DesignSession, Feedback, Revision};
