//! Parameter model — the structured description of a 2D part.
//!
//! A [`ParameterSet`] is produced by an extractor, possibly merged by the
//! arbitration layer, then handed to the geometric validator. All lengths
//! are millimetres.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Closed set of supported part shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeArchetype {
    RectangularPlate,
    SquarePlate,
    CircularFlange,
    LBracket,
    TBracket,
    TriangularPlate,
}

const DIMS_RECTANGULAR: &[&str] = &["width", "height"];
const DIMS_SQUARE: &[&str] = &["side"];
const DIMS_FLANGE: &[&str] = &["outer_diameter", "inner_diameter"];
const DIMS_BRACKET: &[&str] = &["width", "height", "thickness"];
const DIMS_TRIANGULAR: &[&str] = &["base", "height"];

const OPTIONAL_PLATE: &[&str] = &["thickness", "fillet_radius", "chamfer"];
const OPTIONAL_FLANGE: &[&str] = &["pitch_diameter", "thickness", "fillet_radius", "chamfer"];
const OPTIONAL_BRACKET: &[&str] = &["fillet_radius", "chamfer"];

impl ShapeArchetype {
    pub const ALL: [ShapeArchetype; 6] = [
        ShapeArchetype::RectangularPlate,
        ShapeArchetype::SquarePlate,
        ShapeArchetype::CircularFlange,
        ShapeArchetype::LBracket,
        ShapeArchetype::TBracket,
        ShapeArchetype::TriangularPlate,
    ];

    /// The interchange tag (`"rectangular_plate"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            ShapeArchetype::RectangularPlate => "rectangular_plate",
            ShapeArchetype::SquarePlate => "square_plate",
            ShapeArchetype::CircularFlange => "circular_flange",
            ShapeArchetype::LBracket => "l_bracket",
            ShapeArchetype::TBracket => "t_bracket",
            ShapeArchetype::TriangularPlate => "triangular_plate",
        }
    }

    /// Dimensions that must be present and strictly positive.
    pub fn required_dimensions(self) -> &'static [&'static str] {
        match self {
            ShapeArchetype::RectangularPlate => DIMS_RECTANGULAR,
            ShapeArchetype::SquarePlate => DIMS_SQUARE,
            ShapeArchetype::CircularFlange => DIMS_FLANGE,
            ShapeArchetype::LBracket | ShapeArchetype::TBracket => DIMS_BRACKET,
            ShapeArchetype::TriangularPlate => DIMS_TRIANGULAR,
        }
    }

    /// Dimensions that may appear but are not required.
    pub fn optional_dimensions(self) -> &'static [&'static str] {
        match self {
            ShapeArchetype::CircularFlange => OPTIONAL_FLANGE,
            ShapeArchetype::LBracket | ShapeArchetype::TBracket => OPTIONAL_BRACKET,
            _ => OPTIONAL_PLATE,
        }
    }

    /// Whether `name` is meaningful for this archetype.
    pub fn accepts_dimension(self, name: &str) -> bool {
        self.required_dimensions().contains(&name) || self.optional_dimensions().contains(&name)
    }

    /// Dimensions allowed to be exactly zero (e.g. "no chamfer").
    pub fn is_zero_permitted(self, name: &str) -> bool {
        name == "chamfer"
    }

    pub fn is_flange(self) -> bool {
        matches!(self, ShapeArchetype::CircularFlange)
    }
}

impl std::fmt::Display for ShapeArchetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShapeArchetype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "rectangular_plate" | "rectangular" => Ok(ShapeArchetype::RectangularPlate),
            "square_plate" | "square" => Ok(ShapeArchetype::SquarePlate),
            "circular_flange" | "flange" => Ok(ShapeArchetype::CircularFlange),
            "l_bracket" => Ok(ShapeArchetype::LBracket),
            "t_bracket" => Ok(ShapeArchetype::TBracket),
            "triangular_plate" | "triangular" => Ok(ShapeArchetype::TriangularPlate),
            other => Err(format!("unknown archetype '{other}'")),
        }
    }
}

/// A scalar measurement in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dimension(f64);

impl Dimension {
    pub fn mm(value: f64) -> Self {
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Reference point for an offset placement.
///
/// Corner anchors measure `dx`/`dy` inward from that corner; the centre
/// anchor measures signed offsets from the part centre.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    #[default]
    Center,
    BottomLeft,
    BottomRight,
    TopRight,
    TopLeft,
}

impl Anchor {
    pub const CORNERS: [Anchor; 4] = [
        Anchor::BottomLeft,
        Anchor::BottomRight,
        Anchor::TopRight,
        Anchor::TopLeft,
    ];

    pub fn is_center(&self) -> bool {
        matches!(self, Anchor::Center)
    }
}

/// Where a hole sits on its parent shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Placement {
    /// Cartesian offset from an anchor.
    Offset {
        #[serde(default, skip_serializing_if = "Anchor::is_center")]
        from: Anchor,
        dx: f64,
        dy: f64,
    },
    /// Polar position about the part centre; `angle` in degrees.
    Polar { radius: f64, angle: f64 },
}

/// A single through-hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleFeature {
    pub diameter: f64,
    pub placement: Placement,
    #[serde(default)]
    pub group_id: Option<String>,
}

impl HoleFeature {
    /// A hole at the part centre.
    pub fn center(diameter: f64) -> Self {
        Self {
            diameter,
            placement: Placement::Offset {
                from: Anchor::Center,
                dx: 0.0,
                dy: 0.0,
            },
            group_id: None,
        }
    }

    /// A hole `offset` inward from `corner` on both axes.
    pub fn at_corner(diameter: f64, corner: Anchor, offset: f64) -> Self {
        Self {
            diameter,
            placement: Placement::Offset {
                from: corner,
                dx: offset,
                dy: offset,
            },
            group_id: None,
        }
    }

    pub fn polar(diameter: f64, radius: f64, angle: f64) -> Self {
        Self {
            diameter,
            placement: Placement::Polar { radius, angle },
            group_id: None,
        }
    }

    pub fn in_group(mut self, id: impl Into<String>) -> Self {
        self.group_id = Some(id.into());
        self
    }

    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }
}

/// A declared repeated hole pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleGroup {
    pub id: String,
    pub count: u32,
    /// Explicit pitch angles in degrees, one per hole.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angles: Option<Vec<f64>>,
}

/// Which extraction path produced a parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[serde(rename = "rule-based")]
    RuleBased,
    Llm,
    Merged,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Source::RuleBased => "rule-based",
            Source::Llm => "llm",
            Source::Merged => "merged",
        })
    }
}

/// Provenance of a parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub source: Source,
    pub confidence: f64,
    pub raw_text: String,
    /// Required fields the extractor could not capture.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<String>,
}

/// The root aggregate handed from extraction to validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub archetype: ShapeArchetype,
    #[serde(default)]
    pub dimensions: BTreeMap<String, Dimension>,
    #[serde(default)]
    pub holes: Vec<HoleFeature>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<HoleGroup>,
    pub metadata: Metadata,
}

impl ParameterSet {
    /// An empty set for `archetype`; confidence starts at zero.
    pub fn new(archetype: ShapeArchetype, source: Source, raw_text: impl Into<String>) -> Self {
        Self {
            archetype,
            dimensions: BTreeMap::new(),
            holes: Vec::new(),
            groups: Vec::new(),
            metadata: Metadata {
                source,
                confidence: 0.0,
                raw_text: raw_text.into(),
                unresolved: Vec::new(),
            },
        }
    }

    /// Dimension value in millimetres.
    pub fn dimension(&self, name: &str) -> Option<f64> {
        self.dimensions.get(name).map(|d| d.value())
    }

    pub fn set_dimension(&mut self, name: impl Into<String>, value_mm: f64) {
        self.dimensions.insert(name.into(), Dimension::mm(value_mm));
    }

    pub fn with_dimension(mut self, name: impl Into<String>, value_mm: f64) -> Self {
        self.set_dimension(name, value_mm);
        self
    }

    pub fn with_hole(mut self, hole: HoleFeature) -> Self {
        self.holes.push(hole);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.metadata.confidence = confidence;
        self
    }

    /// Required dimensions for the archetype that are absent.
    pub fn missing_required(&self) -> Vec<&'static str> {
        self.archetype
            .required_dimensions()
            .iter()
            .copied()
            .filter(|name| !self.dimensions.contains_key(*name))
            .collect()
    }

    pub fn holes_in_group<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a HoleFeature> + 'a {
        self.holes
            .iter()
            .filter(move |h| h.group_id.as_deref() == Some(id))
    }

    /// Pretty JSON interchange form.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// How the arbitration layer picks between candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    #[default]
    Auto,
    ForceRule,
    ForceLlm,
}

impl std::fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ExtractionMode::Auto => "auto",
            ExtractionMode::ForceRule => "force_rule",
            ExtractionMode::ForceLlm => "force_llm",
        })
    }
}

impl FromStr for ExtractionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(ExtractionMode::Auto),
            "force_rule" | "rule" => Ok(ExtractionMode::ForceRule),
            "force_llm" | "llm" => Ok(ExtractionMode::ForceLlm),
            other => Err(format!(
                "unknown mode '{other}' (expected auto, force_rule, or force_llm)"
            )),
        }
    }
}

/// An extractor's output: an optional parameter set plus its confidence.
///
/// `parameters == None` is the null-candidate signal; its confidence is 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub parameters: Option<ParameterSet>,
    pub confidence: f64,
}

impl Candidate {
    pub fn none() -> Self {
        Self {
            parameters: None,
            confidence: 0.0,
        }
    }

    /// Wrap a set, taking the confidence recorded in its metadata.
    pub fn found(parameters: ParameterSet) -> Self {
        let confidence = parameters.metadata.confidence;
        Self {
            parameters: Some(parameters),
            confidence,
        }
    }

    pub fn is_some(&self) -> bool {
        self.parameters.is_some()
    }
}
