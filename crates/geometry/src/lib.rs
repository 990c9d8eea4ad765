//! # partspec Geometry
//!
//! The geometric validator. [`validate`] checks a [`ParameterSet`] against
//! four ordered rules and returns a [`ValidatedParameterSet`] on success:
//!
//! 1. required dimensions present and positive; nothing unresolved
//! 2. plates and brackets: corner offsets, holes inside the outline, no overlap
//! 3. flanges: ring diameters, pitch circle placement and bolt spacing
//! 4. declared hole groups match their members
//!
//! [`ParameterSet`]: partspec_core::ParameterSet

mod outline;
mod validated;
mod validator;

pub use outline::{Outline, Point, resolve_centers};
pub use validated::ValidatedParameterSet;
pub use validator::{check, validate};
