use crate::geometry::{Edge, Point, Rect, segment_crosses_interior};

use super::RouteContext;

/// First-cut track between the two approach points: an L when one of its corners is
/// usable, a U around both components otherwise. The result starts at the start approach
/// point and ends at the end approach point.
pub(super) fn basic_path(ctx: &RouteContext<'_>) -> Vec<Point> {
    let sa = ctx.start_approach;
    let ea = ctx.end_approach;
    let (Some(start_edge), Some(end_edge)) = (ctx.start.edge, ctx.end.edge) else {
        tracing::debug!(wire = %ctx.wire, "pin edge unknown, using a midpoint dogleg");
        return midpoint_path(sa, ea);
    };

    if faces_away(ctx, start_edge, end_edge) {
        return u_shape(ctx, start_edge, end_edge, &[]);
    }

    let mut blockers = Vec::new();
    let mut best: Option<(usize, Vec<Point>)> = None;
    for corner in [Point::new(ea.x, sa.y), Point::new(sa.x, ea.y)] {
        let covering: Vec<Rect> = ctx
            .foreign_obstacles(Rect::around(corner, corner))
            .into_iter()
            .filter(|obstacle| obstacle.rect.contains(corner))
            .map(|obstacle| obstacle.rect)
            .collect();
        if !covering.is_empty() {
            blockers.extend(covering);
            continue;
        }
        let candidate = vec![sa, corner, ea];
        if crosses_owner(ctx, &candidate) {
            continue;
        }
        let hits = obstacle_hits(ctx, &candidate);
        if best.as_ref().is_none_or(|(best_hits, _)| hits < *best_hits) {
            best = Some((hits, candidate));
        }
    }

    match best {
        Some((_, path)) => path,
        None => u_shape(ctx, start_edge, end_edge, &blockers),
    }
}

/// Both pins sit on opposite sides and point away from each other, so any L would have
/// to cut back through a component.
fn faces_away(ctx: &RouteContext<'_>, start_edge: Edge, end_edge: Edge) -> bool {
    let (snx, sny) = start_edge.normal();
    let (enx, eny) = end_edge.normal();
    if snx != -enx || sny != -eny {
        return false;
    }
    let s = ctx.start.position;
    let e = ctx.end.position;
    (e.x - s.x) * snx + (e.y - s.y) * sny <= 0.0 && (s.x - e.x) * enx + (s.y - e.y) * eny <= 0.0
}

fn u_shape(ctx: &RouteContext<'_>, start_edge: Edge, end_edge: Edge, blockers: &[Rect]) -> Vec<Point> {
    let sa = ctx.start_approach;
    let ea = ctx.end_approach;
    let extent = ctx
        .owner_rects()
        .chain(blockers.iter().copied())
        .fold(Rect::around(sa, ea), |acc, rect| acc.union(&rect));
    let clearance = ctx.config.clearance;
    let edges = [start_edge, end_edge];

    let vertical_line = matches!(
        (start_edge, end_edge),
        (Edge::Top, Edge::Bottom) | (Edge::Bottom, Edge::Top)
    );
    if vertical_line {
        let left = extent.left - clearance;
        let right = extent.right + clearance;
        let x = edges
            .into_iter()
            .find_map(|edge| match edge {
                Edge::Left => Some(left),
                Edge::Right => Some(right),
                _ => None,
            })
            .unwrap_or_else(|| nearer(left, right, sa.x, ea.x));
        tracing::debug!(wire = %ctx.wire, x, "U-shape around the side");
        vec![sa, Point::new(x, sa.y), Point::new(x, ea.y), ea]
    } else {
        let above = extent.top - clearance;
        let below = extent.bottom + clearance;
        let y = edges
            .into_iter()
            .find_map(|edge| match edge {
                Edge::Top => Some(above),
                Edge::Bottom => Some(below),
                _ => None,
            })
            .unwrap_or_else(|| nearer(above, below, sa.y, ea.y));
        tracing::debug!(wire = %ctx.wire, y, "U-shape over the top or bottom");
        vec![sa, Point::new(sa.x, y), Point::new(ea.x, y), ea]
    }
}

/// Offset line with the shorter total leg length. Ties go to `first`.
fn nearer(first: f64, second: f64, a: f64, b: f64) -> f64 {
    let first_cost = (a - first).abs() + (b - first).abs();
    let second_cost = (a - second).abs() + (b - second).abs();
    if first_cost <= second_cost { first } else { second }
}

fn midpoint_path(sa: Point, ea: Point) -> Vec<Point> {
    let mid_x = (sa.x + ea.x) / 2.0;
    vec![sa, Point::new(mid_x, sa.y), Point::new(mid_x, ea.y), ea]
}

fn crosses_owner(ctx: &RouteContext<'_>, points: &[Point]) -> bool {
    points.windows(2).any(|w| {
        ctx.owner_rects()
            .any(|rect| segment_crosses_interior(w[0], w[1], &rect))
    })
}

fn obstacle_hits(ctx: &RouteContext<'_>, points: &[Point]) -> usize {
    let clearance = ctx.config.clearance;
    points
        .windows(2)
        .map(|w| {
            let query = Rect::around(w[0], w[1]).expanded(clearance);
            ctx.foreign_obstacles(query)
                .iter()
                .filter(|obstacle| {
                    segment_crosses_interior(w[0], w[1], &obstacle.rect.expanded(clearance))
                })
                .count()
        })
        .sum()
}
