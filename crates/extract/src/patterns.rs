//! Hole-pattern expansion shared by both extractors.
//!
//! Extractors describe holes as patterns ("4 holes at 20mm from the
//! corners", "8 holes on a 150mm pitch circle"); expansion turns a pattern
//! into concrete [`HoleFeature`]s plus the declared [`HoleGroup`].

use partspec_core::{Anchor, HoleFeature, HoleGroup, ParameterSet, Placement};
use serde::{Deserialize, Serialize};

/// Group id used for a four-corner pattern.
pub const CORNER_GROUP: &str = "corners";
/// Group id used for a pitch-circle pattern.
pub const PITCH_GROUP: &str = "pitch_circle";
/// Upper bound on holes generated from one pattern.
pub const MAX_PATTERN_COUNT: u32 = 360;

/// Field name recorded when a pattern's placement cannot be resolved.
pub const PLACEMENT_FIELD: &str = "hole_placement";

/// How the holes of a pattern are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Center,
    Corners,
    PitchCircle,
    Offset,
}

/// A hole pattern before expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolePattern {
    pub layout: Layout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    pub diameter: f64,
    /// Inward offset from each corner (corners layout).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_diameter: Option<f64>,
    /// Offset from the part centre (offset layout).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dy: Option<f64>,
}

impl HolePattern {
    pub fn new(layout: Layout, diameter: f64) -> Self {
        Self {
            layout,
            count: None,
            diameter,
            offset: None,
            pitch_diameter: None,
            dx: None,
            dy: None,
        }
    }
}

/// Evenly distributed angles in degrees, starting at 0°.
pub fn pitch_angles(count: u32) -> Vec<f64> {
    (0..count)
        .map(|i| f64::from(i) * 360.0 / f64::from(count))
        .collect()
}

/// Expand `pattern` into `set`.
///
/// On failure nothing is added and the unresolved field name is returned.
pub fn expand(pattern: &HolePattern, set: &mut ParameterSet) -> Result<(), &'static str> {
    let diameter = pattern.diameter;

    match pattern.layout {
        Layout::Center => {
            single(pattern.count)?;
            set.holes.push(HoleFeature::center(diameter));
        }
        Layout::Offset => {
            single(pattern.count)?;
            let (Some(dx), Some(dy)) = (pattern.dx, pattern.dy) else {
                return Err(PLACEMENT_FIELD);
            };
            set.holes.push(HoleFeature {
                diameter,
                placement: Placement::Offset {
                    from: Anchor::Center,
                    dx,
                    dy,
                },
                group_id: None,
            });
        }
        Layout::Corners => {
            if pattern.count.is_some_and(|n| n != 4) {
                return Err(PLACEMENT_FIELD);
            }
            let offset = pattern.offset.ok_or(PLACEMENT_FIELD)?;
            let id = unique_group_id(set, CORNER_GROUP);
            for corner in Anchor::CORNERS {
                set.holes
                    .push(HoleFeature::at_corner(diameter, corner, offset).in_group(&id));
            }
            set.groups.push(HoleGroup {
                id,
                count: 4,
                angles: None,
            });
        }
        Layout::PitchCircle => {
            let count = pattern
                .count
                .filter(|n| (1..=MAX_PATTERN_COUNT).contains(n))
                .ok_or(PLACEMENT_FIELD)?;
            let pitch_diameter = pattern.pitch_diameter.ok_or(PLACEMENT_FIELD)?;
            let angles = pitch_angles(count);
            let id = unique_group_id(set, PITCH_GROUP);
            for angle in &angles {
                set.holes
                    .push(HoleFeature::polar(diameter, pitch_diameter / 2.0, *angle).in_group(&id));
            }
            set.groups.push(HoleGroup {
                id,
                count,
                angles: Some(angles),
            });
            if set.archetype.is_flange() && set.dimension("pitch_diameter").is_none() {
                set.set_dimension("pitch_diameter", pitch_diameter);
            }
        }
    }
    Ok(())
}

fn single(count: Option<u32>) -> Result<(), &'static str> {
    match count {
        None | Some(1) => Ok(()),
        Some(_) => Err(PLACEMENT_FIELD),
    }
}

fn unique_group_id(set: &ParameterSet, base: &str) -> String {
    let taken = |id: &str| set.groups.iter().any(|g| g.id == id);
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|id| !taken(id))
        .unwrap_or_else(|| base.to_string())
}
