//! Geometric consistency rules.
//!
//! Rules run in a fixed order and the first violation is returned, so the
//! caller always gets a single actionable reason.

use crate::outline::{Outline, Point};
use crate::validated::ValidatedParameterSet;
use partspec_core::{Anchor, GeometryError, GeometryRule, HoleFeature, ParameterSet, Placement};
use std::collections::BTreeSet;
use std::f64::consts::PI;
use tracing::debug;

/// Tolerance when comparing declared pitch angles with member placements.
const ANGLE_TOLERANCE: f64 = 1e-6;
/// Tolerance (mm) between a pitch group's circle and the declared `pitch_diameter`.
const PITCH_TOLERANCE: f64 = 1e-6;

/// Check `set` and tag it as validated.
pub fn validate(set: ParameterSet) -> Result<ValidatedParameterSet, GeometryError> {
    match check(&set) {
        Ok(()) => {
            debug!(
                archetype = %set.archetype,
                holes = set.holes.len(),
                "Parameter set validated"
            );
            Ok(ValidatedParameterSet::new(set))
        }
        Err(e) => {
            debug!(archetype = %set.archetype, rule = e.rule.number(), reason = %e.reason, "Validation failed");
            Err(e)
        }
    }
}

/// Run every rule in order without consuming the set.
pub fn check(set: &ParameterSet) -> Result<(), GeometryError> {
    required_dimensions(set)?;
    let Some(outline) = Outline::of(set) else {
        return Err(GeometryError::new(
            GeometryRule::RequiredDimensions,
            format!("incomplete outline for {}", set.archetype),
        ));
    };
    if set.archetype.is_flange() {
        flange_geometry(set, outline)?;
    } else {
        plate_bounds(set, outline)?;
    }
    pattern_groups(set)
}

// ── Rule 1 ─────────────────────────────────────────────────────────

fn required_dimensions(set: &ParameterSet) -> Result<(), GeometryError> {
    let fail = |reason: String| Err(GeometryError::new(GeometryRule::RequiredDimensions, reason));
    let archetype = set.archetype;

    if !set.metadata.unresolved.is_empty() {
        return fail(format!(
            "unresolved fields: {}",
            set.metadata.unresolved.join(", ")
        ));
    }

    for name in archetype.required_dimensions() {
        match set.dimension(name) {
            None => return fail(format!("missing required dimension '{name}' for {archetype}")),
            Some(v) if !v.is_finite() || v <= 0.0 => {
                return fail(format!("{name} must be positive, got {v}"));
            }
            Some(_) => {}
        }
    }

    for (name, dim) in &set.dimensions {
        let v = dim.value();
        if !archetype.accepts_dimension(name) {
            return fail(format!("dimension '{name}' does not apply to {archetype}"));
        }
        if !v.is_finite() {
            return fail(format!("{name} is not a finite number"));
        }
        if archetype.is_zero_permitted(name) {
            if v < 0.0 {
                return fail(format!("{name} must not be negative, got {v}"));
            }
        } else if v <= 0.0 {
            return fail(format!("{name} must be positive, got {v}"));
        }
    }

    for (i, hole) in set.holes.iter().enumerate() {
        if !hole.diameter.is_finite() || hole.diameter <= 0.0 {
            return fail(format!("hole {i} diameter must be positive, got {}", hole.diameter));
        }
        let finite = match hole.placement {
            Placement::Offset { dx, dy, .. } => dx.is_finite() && dy.is_finite(),
            Placement::Polar { radius, angle } => {
                radius.is_finite() && angle.is_finite() && radius >= 0.0
            }
        };
        if !finite {
            return fail(format!("hole {i} has an invalid placement"));
        }
    }
    Ok(())
}

// ── Rule 2 ─────────────────────────────────────────────────────────

fn plate_bounds(set: &ParameterSet, outline: Outline) -> Result<(), GeometryError> {
    let fail = |reason: String| Err(GeometryError::new(GeometryRule::PlateBounds, reason));
    let (w, h) = outline.extent();
    let half = w.min(h) / 2.0;

    if let Outline::LShape { thickness, .. } | Outline::TShape { thickness, .. } = outline {
        if thickness >= w.min(h) {
            return fail(format!(
                "thickness {thickness} must be less than the shorter leg {}",
                w.min(h)
            ));
        }
    }
    if let Some(fillet) = set.dimension("fillet_radius") {
        if fillet > half {
            return fail(format!(
                "fillet_radius {fillet} exceeds half the smaller side ({half})"
            ));
        }
    }

    let mut centers = Vec::with_capacity(set.holes.len());
    for (i, hole) in set.holes.iter().enumerate() {
        if let Placement::Offset { from, dx, dy } = hole.placement {
            if from != Anchor::Center {
                for offset in [dx, dy] {
                    if offset >= half {
                        return fail(format!(
                            "hole {i} corner offset {offset} must be less than half the smaller side ({half})"
                        ));
                    }
                    if offset <= hole.radius() {
                        return fail(format!(
                            "hole {i} corner offset {offset} must exceed its radius {}",
                            hole.radius()
                        ));
                    }
                }
            }
        }
        let p = locate(outline, hole, i, GeometryRule::PlateBounds)?;
        if !outline.contains_circle(p, hole.radius()) {
            return fail(format!(
                "hole {i} (diameter {}) at ({}, {}) extends outside the {}",
                hole.diameter, p.x, p.y, set.archetype
            ));
        }
        centers.push(p);
    }

    no_overlap(set, &centers, GeometryRule::PlateBounds)
}

// ── Rule 3 ─────────────────────────────────────────────────────────

fn flange_geometry(set: &ParameterSet, outline: Outline) -> Result<(), GeometryError> {
    let fail = |reason: String| Err(GeometryError::new(GeometryRule::FlangeGeometry, reason));
    let Outline::Annulus { inner, outer } = outline else {
        return Ok(());
    };
    let (id, od) = (inner * 2.0, outer * 2.0);

    if id >= od {
        return fail(format!(
            "inner ≥ outer: inner_diameter {id} must be less than outer_diameter {od}"
        ));
    }
    if let Some(pcd) = set.dimension("pitch_diameter") {
        if pcd <= id || pcd >= od {
            return fail(format!(
                "pitch_diameter {pcd} must lie between inner_diameter {id} and outer_diameter {od}"
            ));
        }
    }
    if let Some(fillet) = set.dimension("fillet_radius") {
        if fillet > (od - id) / 4.0 {
            return fail(format!(
                "fillet_radius {fillet} exceeds half the ring width ({})",
                (od - id) / 4.0
            ));
        }
    }

    for (i, hole) in set.holes.iter().enumerate() {
        if let Placement::Polar { radius, .. } = hole.placement {
            if radius <= inner || radius >= outer {
                return fail(format!(
                    "hole {i} pitch diameter {} must lie between inner_diameter {id} and outer_diameter {od}",
                    radius * 2.0
                ));
            }
        }
    }

    let declared_pcd = set.dimension("pitch_diameter");
    for group in &set.groups {
        for hole in set.holes_in_group(&group.id) {
            let Placement::Polar { radius, .. } = hole.placement else {
                continue;
            };
            if let Some(pcd) = declared_pcd {
                if (radius * 2.0 - pcd).abs() > PITCH_TOLERANCE {
                    return fail(format!(
                        "group '{}' holes sit on a {} circle but pitch_diameter is {pcd}",
                        group.id,
                        radius * 2.0
                    ));
                }
            }
        }

        let n = group.count;
        if n < 2 {
            continue;
        }
        for hole in set.holes_in_group(&group.id) {
            if let Placement::Polar { radius, .. } = hole.placement {
                let pcd = declared_pcd.unwrap_or(radius * 2.0);
                let chord = pcd * (PI / f64::from(n)).sin();
                if chord <= hole.diameter {
                    return fail(format!(
                        "group '{}': {n} holes of diameter {} overlap on pitch diameter {pcd} (spacing {chord:.3})",
                        group.id, hole.diameter
                    ));
                }
            }
        }
    }

    let mut centers = Vec::with_capacity(set.holes.len());
    for (i, hole) in set.holes.iter().enumerate() {
        let p = locate(outline, hole, i, GeometryRule::FlangeGeometry)?;
        if !outline.contains_circle(p, hole.radius()) {
            return fail(format!(
                "hole {i} (diameter {}) at ({}, {}) is not inside the flange ring",
                hole.diameter, p.x, p.y
            ));
        }
        centers.push(p);
    }

    no_overlap(set, &centers, GeometryRule::FlangeGeometry)
}

// ── Rule 4 ─────────────────────────────────────────────────────────

fn pattern_groups(set: &ParameterSet) -> Result<(), GeometryError> {
    let fail = |reason: String| Err(GeometryError::new(GeometryRule::PatternGroups, reason));
    let mut seen = BTreeSet::new();

    for group in &set.groups {
        if !seen.insert(group.id.as_str()) {
            return fail(format!("group '{}' is declared more than once", group.id));
        }
        if group.count < 1 {
            return fail(format!("group '{}' hole count must be at least 1", group.id));
        }
        let members: Vec<&HoleFeature> = set.holes_in_group(&group.id).collect();
        if members.len() != group.count as usize {
            return fail(format!(
                "group '{}' declares {} holes but has {}",
                group.id,
                group.count,
                members.len()
            ));
        }
        let Some(angles) = &group.angles else {
            continue;
        };
        if angles.len() != group.count as usize {
            return fail(format!(
                "group '{}' lists {} angles for {} holes",
                group.id,
                angles.len(),
                group.count
            ));
        }
        for (hole, declared) in members.iter().zip(angles) {
            let matches = match hole.placement {
                Placement::Polar { angle, .. } => angle_eq(angle, *declared),
                Placement::Offset { .. } => false,
            };
            if !matches {
                return fail(format!(
                    "group '{}' member placement does not match declared angle {declared}",
                    group.id
                ));
            }
        }
    }
    Ok(())
}

// ── Internal ───────────────────────────────────────────────────────

fn locate(
    outline: Outline,
    hole: &HoleFeature,
    index: usize,
    rule: GeometryRule,
) -> Result<Point, GeometryError> {
    outline.locate(&hole.placement).ok_or_else(|| {
        GeometryError::new(
            rule,
            format!("hole {index} uses a corner anchor, which a circular part does not have"),
        )
    })
}

fn no_overlap(
    set: &ParameterSet,
    centers: &[Point],
    rule: GeometryRule,
) -> Result<(), GeometryError> {
    for i in 0..centers.len() {
        for j in i + 1..centers.len() {
            let gap = centers[i].distance(centers[j]);
            let needed = set.holes[i].radius() + set.holes[j].radius();
            if gap < needed {
                return Err(GeometryError::new(
                    rule,
                    format!("holes {i} and {j} overlap: centre distance {gap:.3} < {needed}"),
                ));
            }
        }
    }
    Ok(())
}

fn angle_eq(a: f64, b: f64) -> bool {
    let diff = (a - b).rem_euclid(360.0);
    diff < ANGLE_TOLERANCE || 360.0 - diff < ANGLE_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use partspec_core::{HoleGroup, ShapeArchetype, Source};

    fn square_with_center_hole() -> ParameterSet {
        ParameterSet::new(ShapeArchetype::SquarePlate, Source::RuleBased, "square")
            .with_dimension("side", 150.0)
            .with_hole(HoleFeature::center(30.0))
            .with_confidence(1.0)
    }

    fn plate_with_corner_holes(offset: f64) -> ParameterSet {
        let mut set = ParameterSet::new(ShapeArchetype::RectangularPlate, Source::RuleBased, "plate")
            .with_dimension("width", 200.0)
            .with_dimension("height", 100.0);
        for corner in Anchor::CORNERS {
            set.holes
                .push(HoleFeature::at_corner(10.0, corner, offset).in_group("corners"));
        }
        set.groups.push(HoleGroup {
            id: "corners".into(),
            count: 4,
            angles: None,
        });
        set
    }

    fn flange(inner: f64) -> ParameterSet {
        let mut set = ParameterSet::new(ShapeArchetype::CircularFlange, Source::RuleBased, "flange")
            .with_dimension("outer_diameter", 200.0)
            .with_dimension("inner_diameter", inner)
            .with_dimension("pitch_diameter", 150.0);
        let angles: Vec<f64> = (0..8).map(|i| f64::from(i) * 45.0).collect();
        for angle in &angles {
            set.holes
                .push(HoleFeature::polar(15.0, 75.0, *angle).in_group("pitch_circle"));
        }
        set.groups.push(HoleGroup {
            id: "pitch_circle".into(),
            count: 8,
            angles: Some(angles),
        });
        set
    }

    fn rule_of(set: ParameterSet) -> GeometryRule {
        validate(set).unwrap_err().rule
    }

    #[test]
    fn accepts_square_with_center_hole() {
        let validated = validate(square_with_center_hole()).unwrap();
        assert_eq!(validated.hole_centers(), vec![Point::new(75.0, 75.0)]);
    }

    #[test]
    fn accepts_corner_holes_inside_half_width() {
        assert!(validate(plate_with_corner_holes(20.0)).is_ok());
    }

    #[test]
    fn corner_offsets_across_the_bound() {
        for offset in [6.0, 15.0, 30.0, 40.0] {
            assert!(validate(plate_with_corner_holes(offset)).is_ok(), "offset {offset}");
        }
        for offset in [50.0, 60.0, 120.0] {
            let err = validate(plate_with_corner_holes(offset)).unwrap_err();
            assert_eq!(err.rule, GeometryRule::PlateBounds, "offset {offset}");
            assert!(err.reason.contains("half the smaller side"));
        }
    }

    #[test]
    fn corner_hole_must_clear_the_edge() {
        let err = validate(plate_with_corner_holes(4.0)).unwrap_err();
        assert!(err.reason.contains("must exceed its radius"));
    }

    #[test]
    fn overlapping_holes_are_rejected() {
        let set = square_with_center_hole().with_hole(HoleFeature {
            diameter: 20.0,
            placement: Placement::Offset {
                from: Anchor::Center,
                dx: 20.0,
                dy: 0.0,
            },
            group_id: None,
        });
        let err = validate(set).unwrap_err();
        assert_eq!(err.rule, GeometryRule::PlateBounds);
        assert!(err.reason.contains("overlap"));
    }

    #[test]
    fn unresolved_fields_fail_rule_one() {
        let mut set = square_with_center_hole();
        set.metadata.unresolved = vec!["hole_placement".into()];
        let err = validate(set).unwrap_err();
        assert_eq!(err.rule, GeometryRule::RequiredDimensions);
        assert!(err.reason.contains("hole_placement"));
    }

    #[test]
    fn missing_and_non_positive_dimensions_fail_rule_one() {
        let set = ParameterSet::new(ShapeArchetype::RectangularPlate, Source::Llm, "p")
            .with_dimension("width", 200.0);
        let err = validate(set).unwrap_err();
        assert!(err.reason.contains("'height'"));

        let set = ParameterSet::new(ShapeArchetype::SquarePlate, Source::Llm, "p")
            .with_dimension("side", 0.0);
        assert_eq!(rule_of(set), GeometryRule::RequiredDimensions);

        let set = ParameterSet::new(ShapeArchetype::SquarePlate, Source::Llm, "p")
            .with_dimension("side", f64::NAN);
        assert_eq!(rule_of(set), GeometryRule::RequiredDimensions);
    }

    #[test]
    fn zero_chamfer_is_permitted_but_zero_fillet_is_not() {
        let set = square_with_center_hole().with_dimension("chamfer", 0.0);
        assert!(validate(set).is_ok());
        let set = square_with_center_hole().with_dimension("fillet_radius", 0.0);
        assert_eq!(rule_of(set), GeometryRule::RequiredDimensions);
    }

    #[test]
    fn dimension_foreign_to_archetype_is_rejected() {
        let set = square_with_center_hole().with_dimension("outer_diameter", 40.0);
        let err = validate(set).unwrap_err();
        assert!(err.reason.contains("does not apply"));
    }

    #[test]
    fn oversized_fillet_is_rejected() {
        let set = square_with_center_hole().with_dimension("fillet_radius", 80.0);
        assert_eq!(rule_of(set), GeometryRule::PlateBounds);
    }

    #[test]
    fn accepts_flange_with_bolt_circle() {
        let validated = validate(flange(100.0)).unwrap();
        assert_eq!(validated.hole_centers().len(), 8);
    }

    #[test]
    fn inner_not_less_than_outer_is_rejected() {
        for inner in [200.0, 250.0] {
            let err = validate(flange(inner)).unwrap_err();
            assert_eq!(err.rule, GeometryRule::FlangeGeometry);
            assert!(err.reason.starts_with("inner ≥ outer"), "{}", err.reason);
        }
        let err = validate(flange(250.0)).unwrap_err();
        assert_eq!(
            err.reason,
            "inner ≥ outer: inner_diameter 250 must be less than outer_diameter 200"
        );
    }

    #[test]
    fn pitch_diameter_must_sit_in_the_ring() {
        let set = flange(100.0).with_dimension("pitch_diameter", 90.0);
        let err = validate(set).unwrap_err();
        assert!(err.reason.contains("pitch_diameter 90"));
    }

    #[test]
    fn crowded_bolt_circle_is_rejected() {
        let mut set = flange(100.0);
        for hole in &mut set.holes {
            hole.diameter = 60.0;
        }
        let err = validate(set).unwrap_err();
        assert_eq!(err.rule, GeometryRule::FlangeGeometry);
        assert!(err.reason.contains("overlap on pitch diameter"));
    }

    #[test]
    fn corner_anchor_on_flange_is_rejected() {
        let set = flange(100.0).with_hole(HoleFeature::at_corner(5.0, Anchor::TopLeft, 10.0));
        let err = validate(set).unwrap_err();
        assert!(err.reason.contains("corner anchor"));
    }

    #[test]
    fn group_member_count_must_match() {
        let mut set = plate_with_corner_holes(20.0);
        set.holes.pop();
        let err = validate(set).unwrap_err();
        assert_eq!(err.rule, GeometryRule::PatternGroups);
        assert!(err.reason.contains("declares 4 holes but has 3"));
    }

    #[test]
    fn zero_count_group_is_rejected() {
        let mut set = square_with_center_hole();
        set.groups.push(HoleGroup {
            id: "empty".into(),
            count: 0,
            angles: None,
        });
        assert_eq!(rule_of(set), GeometryRule::PatternGroups);
    }

    #[test]
    fn angle_list_length_must_match_count() {
        let mut set = flange(100.0);
        if let Some(angles) = set.groups[0].angles.as_mut() {
            angles.pop();
        }
        let err = validate(set).unwrap_err();
        assert_eq!(err.rule, GeometryRule::PatternGroups);
        assert!(err.reason.contains("lists 7 angles for 8 holes"));
    }

    #[test]
    fn pitch_group_must_sit_on_declared_pitch_diameter() {
        let set = flange(100.0).with_dimension("pitch_diameter", 180.0);
        let err = validate(set).unwrap_err();
        assert_eq!(err.rule, GeometryRule::FlangeGeometry);
        assert!(err.reason.contains("150 circle but pitch_diameter is 180"));

        let mut undeclared = flange(100.0);
        undeclared.dimensions.remove("pitch_diameter");
        assert!(validate(undeclared).is_ok());
    }

    #[test]
    fn angle_list_must_match_members() {
        let mut set = flange(100.0);
        if let Some(angles) = set.groups[0].angles.as_mut() {
            angles[3] = 140.0;
        }
        assert_eq!(rule_of(set), GeometryRule::PatternGroups);
    }

    #[test]
    fn l_bracket_thickness_below_shorter_leg() {
        let bracket = |t| {
            ParameterSet::new(ShapeArchetype::LBracket, Source::RuleBased, "b")
                .with_dimension("width", 100.0)
                .with_dimension("height", 80.0)
                .with_dimension("thickness", t)
        };
        assert!(validate(bracket(5.0)).is_ok());
        assert_eq!(rule_of(bracket(80.0)), GeometryRule::PlateBounds);
    }

    #[test]
    fn t_bracket_holes_must_sit_in_flange_or_web() {
        let bracket = |hole: HoleFeature| {
            ParameterSet::new(ShapeArchetype::TBracket, Source::RuleBased, "t")
                .with_dimension("width", 120.0)
                .with_dimension("height", 90.0)
                .with_dimension("thickness", 20.0)
                .with_hole(hole)
        };
        assert!(validate(bracket(HoleFeature::center(8.0))).is_ok());
        assert!(validate(bracket(HoleFeature::at_corner(6.0, Anchor::TopLeft, 10.0))).is_ok());

        let err = validate(bracket(HoleFeature::at_corner(6.0, Anchor::BottomLeft, 15.0))).unwrap_err();
        assert_eq!(err.rule, GeometryRule::PlateBounds);
        assert!(err.reason.contains("extends outside the t_bracket"));

        let thick = bracket(HoleFeature::center(8.0)).with_dimension("thickness", 95.0);
        assert_eq!(rule_of(thick), GeometryRule::PlateBounds);
    }

    #[test]
    fn hole_outside_triangle_is_rejected() {
        let set = ParameterSet::new(ShapeArchetype::TriangularPlate, Source::RuleBased, "t")
            .with_dimension("base", 120.0)
            .with_dimension("height", 90.0)
            .with_hole(HoleFeature::at_corner(6.0, Anchor::TopLeft, 10.0));
        let err = validate(set).unwrap_err();
        assert!(err.reason.contains("extends outside"));
    }

    #[test]
    fn angle_comparison_wraps() {
        assert!(angle_eq(0.0, 360.0));
        assert!(angle_eq(-45.0, 315.0));
        assert!(!angle_eq(10.0, 11.0));
    }
}
