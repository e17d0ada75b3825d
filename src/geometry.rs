use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Coordinates closer than this are treated as equal.
pub const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn approx_eq(self, other: Point) -> bool {
        (self.x - other.x).abs() <= EPSILON && (self.y - other.y).abs() <= EPSILON
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance(self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Axis-aligned rectangle in scene coordinates (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }

    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Bounding box of two points.
    pub fn around(a: Point, b: Point) -> Self {
        Self::new(a.x, a.y, b.x, b.y)
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// Grows the rect by `amount` on every side. Negative amounts shrink it.
    pub fn expanded(&self, amount: f64) -> Self {
        Self {
            left: self.left - amount,
            top: self.top - amount,
            right: self.right + amount,
            bottom: self.bottom + amount,
        }
    }

    pub fn union(&self, other: &Rect) -> Self {
        Self {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.top && p.y <= self.bottom
    }

    pub fn contains_strict(&self, p: Point) -> bool {
        p.x > self.left + EPSILON
            && p.x < self.right - EPSILON
            && p.y > self.top + EPSILON
            && p.y < self.bottom - EPSILON
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.left <= other.right
            && other.left <= self.right
            && self.top <= other.bottom
            && other.top <= self.bottom
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.right.is_finite()
            && self.bottom.is_finite()
    }
}

/// Side of a component a pin protrudes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom];

    /// Unit vector pointing away from the component.
    pub fn normal(self) -> (f64, f64) {
        match self {
            Edge::Left => (-1.0, 0.0),
            Edge::Right => (1.0, 0.0),
            Edge::Top => (0.0, -1.0),
            Edge::Bottom => (0.0, 1.0),
        }
    }

    /// True for the left and right sides, whose wires leave horizontally.
    pub fn is_vertical(self) -> bool {
        matches!(self, Edge::Left | Edge::Right)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Edge::Left => "left",
            Edge::Right => "right",
            Edge::Top => "top",
            Edge::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown edge `{0}`, expected left, right, top or bottom")]
pub struct ParseEdgeError(pub String);

impl FromStr for Edge {
    type Err = ParseEdgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Edge::Left),
            "right" => Ok(Edge::Right),
            "top" => Ok(Edge::Top),
            "bottom" => Ok(Edge::Bottom),
            _ => Err(ParseEdgeError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
    /// Both ends coincide.
    Point,
    Diagonal,
}

impl Orientation {
    pub fn of(a: Point, b: Point, tol: f64) -> Self {
        let flat_x = (b.x - a.x).abs() <= tol;
        let flat_y = (b.y - a.y).abs() <= tol;
        match (flat_x, flat_y) {
            (true, true) => Orientation::Point,
            (false, true) => Orientation::Horizontal,
            (true, false) => Orientation::Vertical,
            (false, false) => Orientation::Diagonal,
        }
    }
}

pub type Segment = (Point, Point);

pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    fn orient(a: Point, b: Point, c: Point) -> f64 {
        (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
    }
    fn on_segment(a: Point, b: Point, c: Point) -> bool {
        c.x >= a.x.min(b.x) - EPSILON
            && c.x <= a.x.max(b.x) + EPSILON
            && c.y >= a.y.min(b.y) - EPSILON
            && c.y <= a.y.max(b.y) + EPSILON
    }
    let o1 = orient(a, b, c);
    let o2 = orient(a, b, d);
    let o3 = orient(c, d, a);
    let o4 = orient(c, d, b);
    if (o1 > 0.0 && o2 < 0.0 || o1 < 0.0 && o2 > 0.0)
        && (o3 > 0.0 && o4 < 0.0 || o3 < 0.0 && o4 > 0.0)
    {
        return true;
    }
    (o1.abs() <= EPSILON && on_segment(a, b, c))
        || (o2.abs() <= EPSILON && on_segment(a, b, d))
        || (o3.abs() <= EPSILON && on_segment(c, d, a))
        || (o4.abs() <= EPSILON && on_segment(c, d, b))
}

/// Intersection point of two segments with the parameter along each, or `None` when
/// they miss each other or are parallel (a near-zero determinant is not an error).
pub fn segment_intersection(a: Point, b: Point, c: Point, d: Point) -> Option<(Point, f64, f64)> {
    let v1 = (b.x - a.x, b.y - a.y);
    let v2 = (d.x - c.x, d.y - c.y);
    let det = v1.0 * v2.1 - v1.1 * v2.0;
    if det.abs() < 1e-10 {
        return None;
    }
    let dx = c.x - a.x;
    let dy = c.y - a.y;
    let t1 = (dx * v2.1 - dy * v2.0) / det;
    let t2 = (dx * v1.1 - dy * v1.0) / det;
    if (0.0..=1.0).contains(&t1) && (0.0..=1.0).contains(&t2) {
        Some((Point::new(a.x + t1 * v1.0, a.y + t1 * v1.1), t1, t2))
    } else {
        None
    }
}

/// Liang-Barsky clip of segment `a -> b` against `rect`, returning the parameter range
/// inside it.
pub fn clip_segment(a: Point, b: Point, rect: &Rect) -> Option<(f64, f64)> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    let checks = [
        (-dx, a.x - rect.left),
        (dx, rect.right - a.x),
        (-dy, a.y - rect.top),
        (dy, rect.bottom - a.y),
    ];
    for (p, q) in checks {
        if p.abs() < 1e-12 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some((t0, t1))
}

/// True when the segment passes through the open interior of `rect`. Running along the
/// boundary is allowed.
pub fn segment_crosses_interior(a: Point, b: Point, rect: &Rect) -> bool {
    let inner = rect.expanded(-EPSILON);
    if inner.width() <= 0.0 || inner.height() <= 0.0 {
        return false;
    }
    clip_segment(a, b, &inner).is_some()
}

/// Overlap interval of two axis-aligned segments lying on the same track, measured on
/// the varying coordinate. Segments that only touch (overlap no longer than `tol`) do
/// not count.
pub fn colinear_overlap(a1: Point, a2: Point, b1: Point, b2: Point, tol: f64) -> Option<(f64, f64)> {
    let horizontal = (a1.y - a2.y).abs() < tol
        && (b1.y - b2.y).abs() < tol
        && (a1.y - b1.y).abs() < tol
        && (a2.y - b2.y).abs() < tol;
    let vertical = (a1.x - a2.x).abs() < tol
        && (b1.x - b2.x).abs() < tol
        && (a1.x - b1.x).abs() < tol
        && (a2.x - b2.x).abs() < tol;
    let (a_lo, a_hi, b_lo, b_hi) = if horizontal && !vertical {
        (a1.x.min(a2.x), a1.x.max(a2.x), b1.x.min(b2.x), b1.x.max(b2.x))
    } else if vertical && !horizontal {
        (a1.y.min(a2.y), a1.y.max(a2.y), b1.y.min(b2.y), b1.y.max(b2.y))
    } else {
        return None;
    };
    let start = a_lo.max(b_lo);
    let end = a_hi.min(b_hi);
    if end - start > tol { Some((start, end)) } else { None }
}

pub fn path_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

pub fn path_bend_count(points: &[Point]) -> usize {
    if points.len() < 3 {
        return 0;
    }
    let mut bends = 0usize;
    for idx in 1..points.len() - 1 {
        let p0 = points[idx - 1];
        let p1 = points[idx];
        let p2 = points[idx + 1];
        let dx1 = p1.x - p0.x;
        let dy1 = p1.y - p0.y;
        let dx2 = p2.x - p1.x;
        let dy2 = p2.y - p1.y;
        if (dx1.abs() <= EPSILON && dy1.abs() <= EPSILON) || (dx2.abs() <= EPSILON && dy2.abs() <= EPSILON) {
            continue;
        }
        let cross = dx1 * dy2 - dy1 * dx2;
        if cross.abs() > EPSILON {
            bends += 1;
        }
    }
    bends
}

/// No segment of the polyline is diagonal.
pub fn is_rectilinear(points: &[Point]) -> bool {
    points
        .windows(2)
        .all(|w| Orientation::of(w[0], w[1], EPSILON) != Orientation::Diagonal)
}

fn colinear(a: Point, b: Point, c: Point) -> bool {
    ((a.y - b.y).abs() <= EPSILON && (b.y - c.y).abs() <= EPSILON)
        || ((a.x - b.x).abs() <= EPSILON && (b.x - c.x).abs() <= EPSILON)
}

/// Drops repeated points and interior points sitting on a straight run. The first and
/// last points and every index listed in `protected` survive.
pub fn simplify_path(points: &[Point], protected: &[usize]) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let last = points.len() - 1;
    let mut out: Vec<(Point, bool)> = Vec::with_capacity(points.len());
    for (idx, &point) in points.iter().enumerate() {
        let keep = idx == 0 || idx == last || protected.contains(&idx);
        if let Some(prev) = out.last_mut()
            && prev.0.approx_eq(point)
        {
            prev.1 |= keep;
            continue;
        }
        out.push((point, keep));
        while out.len() >= 3 {
            let n = out.len();
            let (a, b, c) = (out[n - 3], out[n - 2], out[n - 1]);
            if b.1 || !colinear(a.0, b.0, c.0) {
                break;
            }
            out.remove(n - 2);
        }
    }
    out.into_iter().map(|(p, _)| p).collect()
}
