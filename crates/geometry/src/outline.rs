//! Part outlines and absolute hole centres.
//!
//! Plates, brackets and triangles use a lower-left origin with +x right
//! and +y up; flanges are centred on the origin. These coordinates are what
//! a drawing emitter consumes, so resolution is deterministic.

use partspec_core::{Anchor, HoleFeature, ParameterSet, Placement, ShapeArchetype};
use serde::{Deserialize, Serialize};

/// An absolute position in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// The material region of a part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outline {
    Rect { width: f64, height: f64 },
    /// Isosceles, apex above the middle of the base.
    Triangle { base: f64, height: f64 },
    /// Horizontal leg along the bottom edge, vertical leg along the left.
    LShape { width: f64, height: f64, thickness: f64 },
    /// Flange across the top edge, web centred below it.
    TShape { width: f64, height: f64, thickness: f64 },
    Annulus { inner: f64, outer: f64 },
}

impl Outline {
    /// The outline described by a set's dimensions, if they are all present.
    pub fn of(set: &ParameterSet) -> Option<Self> {
        let d = |name| set.dimension(name);
        Some(match set.archetype {
            ShapeArchetype::RectangularPlate => Outline::Rect {
                width: d("width")?,
                height: d("height")?,
            },
            ShapeArchetype::SquarePlate => {
                let side = d("side")?;
                Outline::Rect {
                    width: side,
                    height: side,
                }
            }
            ShapeArchetype::TriangularPlate => Outline::Triangle {
                base: d("base")?,
                height: d("height")?,
            },
            ShapeArchetype::LBracket => Outline::LShape {
                width: d("width")?,
                height: d("height")?,
                thickness: d("thickness")?,
            },
            ShapeArchetype::TBracket => Outline::TShape {
                width: d("width")?,
                height: d("height")?,
                thickness: d("thickness")?,
            },
            ShapeArchetype::CircularFlange => Outline::Annulus {
                inner: d("inner_diameter")? / 2.0,
                outer: d("outer_diameter")? / 2.0,
            },
        })
    }

    /// Bounding box size.
    pub fn extent(self) -> (f64, f64) {
        match self {
            Outline::Rect { width, height }
            | Outline::LShape { width, height, .. }
            | Outline::TShape { width, height, .. } => (width, height),
            Outline::Triangle { base, height } => (base, height),
            Outline::Annulus { outer, .. } => (outer * 2.0, outer * 2.0),
        }
    }

    /// The point centre-anchored and polar placements are measured from.
    pub fn center(self) -> Point {
        match self {
            Outline::Rect { width, height }
            | Outline::LShape { width, height, .. }
            | Outline::TShape { width, height, .. } => Point::new(width / 2.0, height / 2.0),
            Outline::Triangle { base, height } => Point::new(base / 2.0, height / 3.0),
            Outline::Annulus { .. } => Point::new(0.0, 0.0),
        }
    }

    /// Absolute centre of a hole, or `None` for a corner anchor on a flange.
    pub fn locate(self, placement: &Placement) -> Option<Point> {
        let center = self.center();
        match *placement {
            Placement::Polar { radius, angle } => {
                let (sin, cos) = angle.to_radians().sin_cos();
                Some(Point::new(center.x + radius * cos, center.y + radius * sin))
            }
            Placement::Offset { from, dx, dy } => {
                if let Outline::Annulus { .. } = self {
                    return (from == Anchor::Center).then(|| Point::new(dx, dy));
                }
                let (w, h) = self.extent();
                Some(match from {
                    Anchor::Center => Point::new(center.x + dx, center.y + dy),
                    Anchor::BottomLeft => Point::new(dx, dy),
                    Anchor::BottomRight => Point::new(w - dx, dy),
                    Anchor::TopRight => Point::new(w - dx, h - dy),
                    Anchor::TopLeft => Point::new(dx, h - dy),
                })
            }
        }
    }

    /// Whether a circle of `radius` at `p` lies strictly inside the material.
    pub fn contains_circle(self, p: Point, radius: f64) -> bool {
        match self {
            Outline::Rect { width, height } => inside_rect(p, radius, 0.0, 0.0, width, height),
            Outline::LShape {
                width,
                height,
                thickness,
            } => {
                // Must fit within one leg.
                inside_rect(p, radius, 0.0, 0.0, width, thickness)
                    || inside_rect(p, radius, 0.0, 0.0, thickness, height)
            }
            Outline::TShape {
                width,
                height,
                thickness,
            } => {
                let web = (width - thickness) / 2.0;
                inside_rect(p, radius, 0.0, height - thickness, width, height)
                    || inside_rect(p, radius, web, 0.0, web + thickness, height)
            }
            Outline::Triangle { base, height } => {
                let vertices = [
                    Point::new(0.0, 0.0),
                    Point::new(base, 0.0),
                    Point::new(base / 2.0, height),
                ];
                (0..3).all(|i| {
                    let a = vertices[i];
                    let b = vertices[(i + 1) % 3];
                    // Counter-clockwise winding, so the interior is on the left.
                    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
                    cross / a.distance(b) > radius
                })
            }
            Outline::Annulus { inner, outer } => {
                let d = p.distance(Point::new(0.0, 0.0));
                d - radius > inner && d + radius < outer
            }
        }
    }
}

fn inside_rect(p: Point, r: f64, x0: f64, y0: f64, x1: f64, y1: f64) -> bool {
    p.x - r > x0 && p.x + r < x1 && p.y - r > y0 && p.y + r < y1
}

/// Absolute centres of every hole in `set`, in hole order.
///
/// `None` when the outline is incomplete or a placement cannot be located.
pub fn resolve_centers(set: &ParameterSet) -> Option<Vec<Point>> {
    let outline = Outline::of(set)?;
    set.holes
        .iter()
        .map(|hole: &HoleFeature| outline.locate(&hole.placement))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use partspec_core::Source;

    fn close(a: Point, b: Point) -> bool {
        a.distance(b) < 1e-9
    }

    #[test]
    fn corner_anchors_measure_inward() {
        let outline = Outline::Rect {
            width: 200.0,
            height: 100.0,
        };
        let at = |from| {
            outline
                .locate(&Placement::Offset {
                    from,
                    dx: 20.0,
                    dy: 10.0,
                })
                .unwrap()
        };
        assert_eq!(at(Anchor::BottomLeft), Point::new(20.0, 10.0));
        assert_eq!(at(Anchor::BottomRight), Point::new(180.0, 10.0));
        assert_eq!(at(Anchor::TopRight), Point::new(180.0, 90.0));
        assert_eq!(at(Anchor::TopLeft), Point::new(20.0, 90.0));
        assert_eq!(at(Anchor::Center), Point::new(120.0, 60.0));
    }

    #[test]
    fn flange_centres_on_origin() {
        let outline = Outline::Annulus {
            inner: 50.0,
            outer: 100.0,
        };
        let p = outline
            .locate(&Placement::Polar {
                radius: 75.0,
                angle: 90.0,
            })
            .unwrap();
        assert!(close(p, Point::new(0.0, 75.0)));
        assert!(
            outline
                .locate(&Placement::Offset {
                    from: Anchor::TopLeft,
                    dx: 1.0,
                    dy: 1.0
                })
                .is_none()
        );
    }

    #[test]
    fn triangle_containment() {
        let outline = Outline::Triangle {
            base: 120.0,
            height: 90.0,
        };
        assert!(outline.contains_circle(outline.center(), 10.0));
        assert!(!outline.contains_circle(Point::new(10.0, 80.0), 1.0));
        assert!(!outline.contains_circle(Point::new(60.0, 2.0), 5.0));
    }

    #[test]
    fn l_shape_excludes_inner_corner_region() {
        let outline = Outline::LShape {
            width: 100.0,
            height: 80.0,
            thickness: 20.0,
        };
        assert!(outline.contains_circle(Point::new(70.0, 10.0), 5.0));
        assert!(outline.contains_circle(Point::new(10.0, 60.0), 5.0));
        assert!(!outline.contains_circle(Point::new(60.0, 50.0), 5.0));
    }

    #[test]
    fn t_shape_keeps_holes_in_flange_or_web() {
        let outline = Outline::TShape {
            width: 120.0,
            height: 90.0,
            thickness: 20.0,
        };
        assert_eq!(outline.center(), Point::new(60.0, 45.0));
        assert!(outline.contains_circle(outline.center(), 5.0));
        assert!(outline.contains_circle(Point::new(15.0, 80.0), 5.0));
        assert!(outline.contains_circle(Point::new(60.0, 10.0), 5.0));
        // below the flange, beside the web
        assert!(!outline.contains_circle(Point::new(15.0, 10.0), 5.0));
        assert!(!outline.contains_circle(Point::new(45.0, 30.0), 5.0));
    }

    #[test]
    fn annulus_containment() {
        let outline = Outline::Annulus {
            inner: 50.0,
            outer: 100.0,
        };
        assert!(outline.contains_circle(Point::new(75.0, 0.0), 7.5));
        assert!(!outline.contains_circle(Point::new(52.0, 0.0), 7.5));
        assert!(!outline.contains_circle(Point::new(0.0, 97.0), 7.5));
    }

    #[test]
    fn resolve_centers_needs_complete_outline() {
        let set = ParameterSet::new(ShapeArchetype::RectangularPlate, Source::RuleBased, "t")
            .with_dimension("width", 200.0)
            .with_hole(HoleFeature::center(10.0));
        assert_eq!(resolve_centers(&set), None);

        let set = set.with_dimension("height", 100.0);
        assert_eq!(resolve_centers(&set), Some(vec![Point::new(100.0, 50.0)]));
    }
}
