use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{EPSILON, Point, segment_intersection};

use super::{SiblingWireProvider, WireId, WireSegment};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossingMode {
    /// Wires simply cross.
    #[default]
    Off,
    /// One of the two wires hops over the other with a small arc.
    Bumps,
}

/// A hop drawn where this wire crosses another one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bump {
    /// Index of the segment (in stored order) the bump sits on.
    pub segment: usize,
    pub at: Point,
    pub radius: f64,
}

pub trait CrossingResolver {
    /// Crossing decorations for `points` against every other wire.
    fn resolve(&self, wire: &WireId, points: &[Point], siblings: &dyn SiblingWireProvider) -> Vec<Bump>;
}

/// Overall heading of a polyline in degrees, from its first point to its last.
pub fn wire_angle(points: &[Point]) -> f64 {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return 0.0;
    };
    let dx = last.x - first.x;
    let dy = last.y - first.y;
    if dx.abs() < EPSILON {
        return if dy >= 0.0 { 90.0 } else { -90.0 };
    }
    (dy / dx).atan().to_degrees()
}

/// The flatter wire takes the bump at each crossing. Equal headings go to the wire with
/// the smaller id so exactly one of the pair draws it.
#[derive(Debug, Clone, Copy)]
pub struct BumpResolver {
    pub radius: f64,
}

impl BumpResolver {
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }

    fn owns_crossing(&self, wire: &WireId, angle: f64, other: &WireId, other_angle: f64) -> bool {
        let (mine, theirs) = (angle.abs(), other_angle.abs());
        if (mine - theirs).abs() > EPSILON {
            return mine < theirs;
        }
        wire < other
    }
}

impl CrossingResolver for BumpResolver {
    fn resolve(&self, wire: &WireId, points: &[Point], siblings: &dyn SiblingWireProvider) -> Vec<Bump> {
        if self.radius <= 0.0 || points.len() < 2 {
            return Vec::new();
        }
        let angle = wire_angle(points);
        let mut by_wire: BTreeMap<WireId, Vec<WireSegment>> = BTreeMap::new();
        for segment in siblings.crossing_segments(wire) {
            by_wire.entry(segment.wire.clone()).or_default().push(segment);
        }

        let mut bumps = Vec::new();
        for (other, segments) in &by_wire {
            let mut outline: Vec<Point> = segments.iter().map(|s| s.start).collect();
            if let Some(last) = segments.last() {
                outline.push(last.end);
            }
            if !self.owns_crossing(wire, angle, other, wire_angle(&outline)) {
                continue;
            }
            for (index, w) in points.windows(2).enumerate() {
                for segment in segments {
                    let Some((at, t1, t2)) = segment_intersection(w[0], w[1], segment.start, segment.end)
                    else {
                        continue;
                    };
                    // Shared endpoints and T-junctions are not crossings.
                    let interior = |t: f64| t > EPSILON && t < 1.0 - EPSILON;
                    if interior(t1) && interior(t2) {
                        bumps.push(Bump {
                            segment: index,
                            at,
                            radius: self.radius,
                        });
                    }
                }
            }
        }

        bumps.sort_by(|a, b| {
            a.segment.cmp(&b.segment).then_with(|| {
                let start = points[a.segment];
                start.distance(a.at).total_cmp(&start.distance(b.at))
            })
        });
        bumps.dedup_by(|a, b| a.segment == b.segment && a.at.distance(b.at) < 2.0 * self.radius);
        bumps
    }
}
