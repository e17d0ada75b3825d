use std::collections::{BTreeMap, BTreeSet};

use crate::geometry::{EPSILON, Edge, Orientation, Point, Rect, Segment, colinear_overlap};

use super::{FanOutEntry, PinId, RouteContext, SiblingWireProvider, WireId};

/// Which coordinate a track is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackAxis {
    /// A horizontal track, keyed by its y.
    Horizontal,
    /// A vertical track, keyed by its x.
    Vertical,
}

/// Lane shifts assigned to the tracks of one wire. A horizontal track moves by `dy`, a
/// vertical one by `dx`. The first assignment for a track wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaneOffsets {
    horizontal: BTreeMap<i64, f64>,
    vertical: BTreeMap<i64, f64>,
}

/// Track coordinates are compared on a 1/1024 grid so float noise does not split a track.
fn track_key(coord: f64) -> i64 {
    (coord * 1024.0).round() as i64
}

impl LaneOffsets {
    pub fn dy_for(&self, y: f64) -> f64 {
        self.horizontal.get(&track_key(y)).copied().unwrap_or(0.0)
    }

    pub fn dx_for(&self, x: f64) -> f64 {
        self.vertical.get(&track_key(x)).copied().unwrap_or(0.0)
    }

    pub fn is_assigned(&self, axis: TrackAxis, coord: f64) -> bool {
        self.map(axis).contains_key(&track_key(coord))
    }

    pub fn len(&self) -> usize {
        self.horizontal.len() + self.vertical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(axis, track coordinate, offset)` for every assigned track.
    pub fn tracks(&self) -> Vec<(TrackAxis, f64, f64)> {
        let horizontal = self
            .horizontal
            .iter()
            .map(|(key, offset)| (TrackAxis::Horizontal, *key as f64 / 1024.0, *offset));
        let vertical = self
            .vertical
            .iter()
            .map(|(key, offset)| (TrackAxis::Vertical, *key as f64 / 1024.0, *offset));
        horizontal.chain(vertical).collect()
    }

    fn map(&self, axis: TrackAxis) -> &BTreeMap<i64, f64> {
        match axis {
            TrackAxis::Horizontal => &self.horizontal,
            TrackAxis::Vertical => &self.vertical,
        }
    }

    fn assign(&mut self, axis: TrackAxis, coord: f64, offset: f64) -> bool {
        let map = match axis {
            TrackAxis::Horizontal => &mut self.horizontal,
            TrackAxis::Vertical => &mut self.vertical,
        };
        let key = track_key(coord);
        if map.contains_key(&key) {
            return false;
        }
        map.insert(key, offset);
        true
    }
}

/// Offset of slot `index` out of `count` lanes centred on the shared track.
fn centered_offset(index: usize, count: usize, spacing: f64) -> f64 {
    (index as f64 - (count as f64 - 1.0) / 2.0) * spacing
}

fn segment_axis(a: Point, b: Point, tol: f64) -> Option<TrackAxis> {
    match Orientation::of(a, b, tol) {
        Orientation::Horizontal => Some(TrackAxis::Horizontal),
        Orientation::Vertical => Some(TrackAxis::Vertical),
        Orientation::Point | Orientation::Diagonal => None,
    }
}

fn track_coord(axis: TrackAxis, point: Point) -> f64 {
    match axis {
        TrackAxis::Horizontal => point.y,
        TrackAxis::Vertical => point.x,
    }
}

fn along_coord(axis: TrackAxis, point: Point) -> f64 {
    match axis {
        TrackAxis::Horizontal => point.x,
        TrackAxis::Vertical => point.y,
    }
}

/// Base polylines of the wire being routed and of its siblings, as segments per wire.
type WireTracks = BTreeMap<WireId, Vec<Segment>>;

/// Shifts the tracks of `track` (start approach point to end approach point) that share
/// a line with sibling wires into parallel lanes. `base` is the same track with the pin
/// points attached, as the siblings see it.
pub(super) fn apply_lanes(
    ctx: &RouteContext<'_>,
    track: &[Point],
    base: &[Point],
    siblings: &dyn SiblingWireProvider,
) -> (Vec<Point>, LaneOffsets) {
    let mut lanes = LaneOffsets::default();
    if track.len() < 2 {
        return (track.to_vec(), lanes);
    }
    let tol = ctx.config.overlap_tolerance;
    let spacing = ctx.config.lane_spacing;

    let mut wires: WireTracks = BTreeMap::new();
    for segment in siblings.segments_of_other_wires(ctx.wire) {
        wires
            .entry(segment.wire)
            .or_default()
            .push((segment.start, segment.end));
    }
    wires.insert(
        ctx.wire.clone(),
        base.windows(2).map(|w| (w[0], w[1])).collect(),
    );

    for w in base.windows(2) {
        let Some(axis) = segment_axis(w[0], w[1], tol) else {
            continue;
        };
        let coord = track_coord(axis, w[0]);
        if lanes.is_assigned(axis, coord) {
            continue;
        }
        let group = SharedTrack::collect(&wires, ctx.wire, axis, coord, tol);
        if group.members.len() < 2 {
            continue;
        }
        let order = lane_order(ctx, &group, siblings);
        let Some(index) = order.iter().position(|wire| wire == ctx.wire) else {
            continue;
        };
        let bias = lane_bias(ctx, &group, &order, &wires);
        let offset = centered_offset(index, order.len(), spacing) + bias;
        if lanes.assign(axis, coord, offset) {
            tracing::trace!(
                wire = %ctx.wire,
                ?axis,
                coord,
                offset,
                bias,
                shared_with = order.len() - 1,
                "lane assigned"
            );
        }
    }

    if lanes.is_empty() {
        return (track.to_vec(), lanes);
    }
    (apply_offsets(track, &lanes, ctx.start.edge, ctx.end.edge), lanes)
}

/// Every wire connected to the routed one through overlaps on a single line. Each member
/// computes the same group, so slots never collide along a chain of overlaps.
struct SharedTrack<'a> {
    axis: TrackAxis,
    coord: f64,
    /// Sorted by wire id.
    members: Vec<&'a WireId>,
    /// Extent of the members' segments along the line.
    span: (f64, f64),
}

impl<'a> SharedTrack<'a> {
    fn collect(wires: &'a WireTracks, wire: &WireId, axis: TrackAxis, coord: f64, tol: f64) -> Self {
        let on_line: BTreeMap<&WireId, Vec<Segment>> = wires
            .iter()
            .filter_map(|(id, segments)| {
                let segments: Vec<Segment> = segments
                    .iter()
                    .copied()
                    .filter(|&(a, b)| {
                        segment_axis(a, b, tol) == Some(axis)
                            && (track_coord(axis, a) - coord).abs() < tol
                    })
                    .collect();
                (!segments.is_empty()).then_some((id, segments))
            })
            .collect();

        let mut members: BTreeSet<&WireId> = BTreeSet::new();
        let mut queue: Vec<&WireId> = Vec::new();
        if let Some((id, _)) = on_line.get_key_value(wire) {
            members.insert(*id);
            queue.push(*id);
        }
        while let Some(current) = queue.pop() {
            let Some(current_segments) = on_line.get(current) else {
                continue;
            };
            for (id, segments) in &on_line {
                if members.contains(id) {
                    continue;
                }
                let overlaps = current_segments.iter().any(|&(a, b)| {
                    segments
                        .iter()
                        .any(|&(c, d)| colinear_overlap(a, b, c, d, tol).is_some())
                });
                if overlaps {
                    members.insert(*id);
                    queue.push(*id);
                }
            }
        }

        let span = members
            .iter()
            .filter_map(|id| on_line.get(*id))
            .flatten()
            .flat_map(|&(a, b)| [along_coord(axis, a), along_coord(axis, b)])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

        Self {
            axis,
            coord,
            members: members.into_iter().collect(),
            span,
        }
    }
}

/// Slot order of a shared track. When every member leaves the same pin, wires are ranked
/// by where they are headed so they fan out without crossing; otherwise by wire id.
fn lane_order(
    ctx: &RouteContext<'_>,
    group: &SharedTrack<'_>,
    siblings: &dyn SiblingWireProvider,
) -> Vec<WireId> {
    let mut pins: Vec<(&PinId, Point, Point)> = Vec::with_capacity(2);
    if let Some(pin) = &ctx.start.pin {
        pins.push((pin, ctx.start_approach, ctx.end.position));
    }
    if let Some(pin) = &ctx.end.pin {
        pins.push((pin, ctx.end_approach, ctx.start.position));
    }
    pins.sort_by(|a, b| a.0.cmp(b.0));

    for (pin, origin, far_end) in pins {
        let mut entries = siblings.fan_out(pin, ctx.wire);
        entries.retain(|entry| entry.wire != *ctx.wire && group.members.contains(&&entry.wire));
        entries.sort_by(|a, b| a.wire.cmp(&b.wire));
        entries.dedup_by(|a, b| a.wire == b.wire);
        if entries.len() + 1 != group.members.len() {
            continue;
        }
        entries.push(FanOutEntry {
            wire: ctx.wire.clone(),
            far_end,
        });
        rank_fan_out(&mut entries, group.axis, origin);
        return entries.into_iter().map(|entry| entry.wire).collect();
    }
    group.members.iter().map(|wire| (*wire).clone()).collect()
}

/// Ranks wires leaving one pin by which side of the track their far end lies on. Among
/// wires turning the same way, the one turning off first takes the lane nearest that
/// side.
fn rank_fan_out(entries: &mut [FanOutEntry], axis: TrackAxis, origin: Point) {
    let rank = |entry: &FanOutEntry| {
        let across = track_coord(axis, entry.far_end) - track_coord(axis, origin);
        let along = (along_coord(axis, entry.far_end) - along_coord(axis, origin)).abs();
        let side = if across > 0.0 {
            1.0
        } else if across < 0.0 {
            -1.0
        } else {
            0.0
        };
        (side, -along * side)
    };
    entries.sort_by(|a, b| {
        let (a0, a1) = rank(a);
        let (b0, b1) = rank(b);
        a0.total_cmp(&b0)
            .then(a1.total_cmp(&b1))
            .then_with(|| a.wire.cmp(&b.wire))
    });
}

/// Shift applied to every slot of a shared track. Zero unless centring the lanes would
/// push one into a component's clearance zone or shorten a member's pin stub below half
/// the approach clearance.
fn lane_bias(ctx: &RouteContext<'_>, group: &SharedTrack<'_>, order: &[WireId], wires: &WireTracks) -> f64 {
    let spacing = ctx.config.lane_spacing;
    let count = order.len();
    let half = centered_offset(count - 1, count, spacing);
    let min_stub = ctx.config.approach_clearance / 2.0;
    let tol = ctx.config.overlap_tolerance;
    let mut lo = f64::NEG_INFINITY;
    let mut hi = f64::INFINITY;

    for (index, wire) in order.iter().enumerate() {
        let slot = centered_offset(index, count, spacing);
        let Some(segments) = wires.get(wire) else {
            continue;
        };
        let stubs = segments
            .first()
            .copied()
            .into_iter()
            .chain(segments.last().map(|&(a, b)| (b, a)));
        for (pin, approach) in stubs {
            if segment_axis(pin, approach, tol).is_none_or(|axis| axis == group.axis)
                || (track_coord(group.axis, approach) - group.coord).abs() >= tol
            {
                continue;
            }
            let outward = track_coord(group.axis, approach) - track_coord(group.axis, pin);
            let slack = (outward.abs() - min_stub).max(0.0);
            if outward > 0.0 {
                lo = lo.max(-slack - slot);
            } else {
                hi = hi.min(slack - slot);
            }
        }
    }

    if let Some(provider) = ctx.obstacles {
        let clearance = ctx.config.clearance;
        let (start, end) = group.span;
        let (a, b) = match group.axis {
            TrackAxis::Horizontal => (Point::new(start, group.coord), Point::new(end, group.coord)),
            TrackAxis::Vertical => (Point::new(group.coord, start), Point::new(group.coord, end)),
        };
        let query = Rect::around(a, b).expanded(clearance + half + spacing);
        for obstacle in provider.rects_near(query) {
            let zone = obstacle.rect.expanded(clearance);
            let (along_lo, along_hi, across_lo, across_hi) = match group.axis {
                TrackAxis::Horizontal => (zone.left, zone.right, zone.top, zone.bottom),
                TrackAxis::Vertical => (zone.top, zone.bottom, zone.left, zone.right),
            };
            if end <= along_lo + EPSILON || start >= along_hi - EPSILON {
                continue;
            }
            if group.coord <= across_lo + EPSILON {
                hi = hi.min(across_lo - group.coord - half);
            } else if group.coord >= across_hi - EPSILON {
                lo = lo.max(across_hi - group.coord + half);
            }
        }
    }

    if lo <= hi {
        0.0_f64.max(lo).min(hi)
    } else {
        tracing::debug!(
            wire = %ctx.wire,
            axis = ?group.axis,
            coord = group.coord,
            lo,
            hi,
            "no lane bias satisfies every clearance"
        );
        (lo + hi) / 2.0
    }
}

/// Moves every point onto its lane. A lane running along a pin's stub moves the approach
/// point itself; a lane across it steps over after the stub so the wire still meets the
/// pin straight on. Edge-less ends keep their point and step both ways.
fn apply_offsets(
    track: &[Point],
    lanes: &LaneOffsets,
    start_edge: Option<Edge>,
    end_edge: Option<Edge>,
) -> Vec<Point> {
    let n = track.len();
    let mut out = Vec::with_capacity(n + 4);
    out.extend(stub_transition(track[0], lanes, start_edge, Edge::Left));
    for &point in &track[1..n - 1] {
        out.push(point.offset(lanes.dx_for(point.x), lanes.dy_for(point.y)));
    }
    let mut tail = stub_transition(track[n - 1], lanes, end_edge, Edge::Right);
    tail.reverse();
    out.extend(tail);
    out
}

/// Points leading from an approach point onto its lanes, in the direction leaving the pin.
fn stub_transition(approach: Point, lanes: &LaneOffsets, edge: Option<Edge>, fallback: Edge) -> Vec<Point> {
    let dx = lanes.dx_for(approach.x);
    let dy = lanes.dy_for(approach.y);
    let leaves_horizontally = edge.unwrap_or(fallback).is_vertical();
    let along = if leaves_horizontally {
        approach.offset(dx, 0.0)
    } else {
        approach.offset(0.0, dy)
    };

    let mut points = Vec::with_capacity(3);
    if edge.is_none() && along != approach {
        points.push(approach);
    }
    points.push(along);
    let full = approach.offset(dx, dy);
    if full != along {
        points.push(full);
    }
    points
}
