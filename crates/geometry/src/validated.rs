use crate::outline::{Point, resolve_centers};
use partspec_core::ParameterSet;
use serde::Serialize;
use std::ops::Deref;

/// A parameter set that passed every geometric rule.
///
/// Only [`validate`](crate::validate) constructs one, so drawing emission
/// can require this type and never see an unchecked set. Serializes exactly
/// like the wrapped [`ParameterSet`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidatedParameterSet(ParameterSet);

impl ValidatedParameterSet {
    pub(crate) fn new(set: ParameterSet) -> Self {
        Self(set)
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.0
    }

    pub fn into_inner(self) -> ParameterSet {
        self.0
    }

    /// Absolute hole centres for drawing emission.
    pub fn hole_centers(&self) -> Vec<Point> {
        resolve_centers(&self.0).unwrap_or_default()
    }

    pub fn to_json(&self) -> partspec_core::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse the interchange form and validate it again.
    pub fn from_json(json: &str) -> partspec_core::Result<Self> {
        let set = ParameterSet::from_json(json)?;
        Ok(crate::validate(set)?)
    }
}

impl Deref for ValidatedParameterSet {
    type Target = ParameterSet;

    fn deref(&self) -> &ParameterSet {
        &self.0
    }
}
