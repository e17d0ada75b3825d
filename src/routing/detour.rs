use std::cmp::Ordering;

use crate::geometry::{EPSILON, Orientation, Point, Rect, segment_crosses_interior};

use super::{Obstacle, ObstacleProvider, RouteContext};

/// Bends the track around every foreign component it passes through. Each pass handles
/// the obstacles hit by the current segments; new detour legs are checked on the next
/// pass.
pub(super) fn avoid_obstacles(
    ctx: &RouteContext<'_>,
    track: Vec<Point>,
    obstacles: &dyn ObstacleProvider,
) -> Vec<Point> {
    let passes = ctx.config.max_detour_passes.max(1);
    let mut points = track;
    for pass in 0..passes {
        let (next, changed) = detour_pass(ctx, &points, obstacles);
        points = next;
        if !changed {
            return points;
        }
        tracing::trace!(wire = %ctx.wire, pass, points = points.len(), "detour pass");
    }
    if detour_pass(ctx, &points, obstacles).1 {
        tracing::warn!(
            wire = %ctx.wire,
            passes,
            "wire still crosses a component after the last detour pass"
        );
    }
    points
}

fn detour_pass(
    ctx: &RouteContext<'_>,
    points: &[Point],
    obstacles: &dyn ObstacleProvider,
) -> (Vec<Point>, bool) {
    let clearance = ctx.config.clearance;
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    let mut changed = false;
    if let Some(&first) = points.first() {
        out.push(first);
    }
    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        let mut from = a;
        for obstacle in blocking_obstacles(ctx, a, b, obstacles) {
            // An earlier detour on this segment may already have cleared it.
            if !blocks(from, b, &obstacle.rect, clearance) {
                continue;
            }
            let Some(legs) = detour_around(from, b, &obstacle.rect, clearance) else {
                continue;
            };
            tracing::debug!(wire = %ctx.wire, obstacle = %obstacle.id, "detour");
            for leg in legs {
                push_distinct(&mut out, leg);
            }
            if let Some(&last) = out.last() {
                from = last;
            }
            changed = true;
        }
        push_distinct(&mut out, b);
    }
    (out, changed)
}

/// Foreign obstacles whose clearance zone the segment enters, nearest first along the
/// direction of travel.
fn blocking_obstacles(
    ctx: &RouteContext<'_>,
    a: Point,
    b: Point,
    provider: &dyn ObstacleProvider,
) -> Vec<Obstacle> {
    let clearance = ctx.config.clearance;
    let query = Rect::around(a, b).expanded(clearance);
    let mut hits: Vec<Obstacle> = provider
        .rects_near(query)
        .into_iter()
        .filter(|obstacle| !ctx.is_owner(obstacle))
        .filter(|obstacle| blocks(a, b, &obstacle.rect, clearance))
        .collect();
    let key = |rect: &Rect| -> f64 {
        match Orientation::of(a, b, EPSILON) {
            Orientation::Horizontal if b.x >= a.x => rect.left,
            Orientation::Horizontal => -rect.right,
            _ if b.y >= a.y => rect.top,
            _ => -rect.bottom,
        }
    };
    hits.sort_by(|x, y| {
        key(&x.rect)
            .partial_cmp(&key(&y.rect))
            .unwrap_or(Ordering::Equal)
            .then_with(|| x.id.cmp(&y.id))
    });
    hits
}

/// True when `a -> b` enters the clearance zone around `rect`. A segment that already
/// starts or ends inside the zone only has to stay out of the rect itself.
fn blocks(a: Point, b: Point, rect: &Rect, clearance: f64) -> bool {
    let zone = rect.expanded(clearance);
    if zone.contains_strict(a) || zone.contains_strict(b) {
        segment_crosses_interior(a, b, rect)
    } else {
        segment_crosses_interior(a, b, &zone)
    }
}

/// Four-point bypass of `rect` for the axis-aligned segment `a -> b`. The legs run on the
/// clearance boundary and the last point lies back on the segment's own line. Ends that
/// already sit inside the clearance zone are used as they are.
fn detour_around(a: Point, b: Point, rect: &Rect, clearance: f64) -> Option<Vec<Point>> {
    let zone = rect.expanded(clearance);
    match Orientation::of(a, b, EPSILON) {
        Orientation::Vertical => {
            let x = a.x;
            let down = b.y >= a.y;
            let side = if (rect.left - x).abs() <= (rect.right - x).abs() {
                zone.left
            } else {
                zone.right
            };
            let (entry, exit) = if down {
                (zone.top, zone.bottom)
            } else {
                (zone.bottom, zone.top)
            };
            let p1 = if (a.y - entry) * (b.y - a.y) < 0.0 { entry } else { a.y };
            let p3 = if (b.y - exit) * (b.y - a.y) > 0.0 { exit } else { b.y };
            Some(vec![
                Point::new(x, p1),
                Point::new(side, p1),
                Point::new(side, p3),
                Point::new(x, p3),
            ])
        }
        Orientation::Horizontal => {
            let y = a.y;
            let right = b.x >= a.x;
            let side = if (rect.top - y).abs() <= (rect.bottom - y).abs() {
                zone.top
            } else {
                zone.bottom
            };
            let (entry, exit) = if right {
                (zone.left, zone.right)
            } else {
                (zone.right, zone.left)
            };
            let p1 = if (a.x - entry) * (b.x - a.x) < 0.0 { entry } else { a.x };
            let p3 = if (b.x - exit) * (b.x - a.x) > 0.0 { exit } else { b.x };
            Some(vec![
                Point::new(p1, y),
                Point::new(p1, side),
                Point::new(p3, side),
                Point::new(p3, y),
            ])
        }
        Orientation::Point | Orientation::Diagonal => None,
    }
}

fn push_distinct(points: &mut Vec<Point>, point: Point) {
    if points.last().is_some_and(|last| last.approx_eq(point)) {
        return;
    }
    points.push(point);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::geometry::{Edge, is_rectilinear};
    use crate::routing::{Endpoint, WireId, approach_point};

    fn detour(track: Vec<Point>, obstacles: &Vec<Obstacle>) -> Vec<Point> {
        let config = RouterConfig::default();
        let wire = WireId::from("w");
        let start = Endpoint::free(track[0]);
        let end = Endpoint::free(track[track.len() - 1]);
        let ctx = RouteContext {
            wire: &wire,
            start: &start,
            end: &end,
            start_approach: approach_point(&start, config.approach_clearance),
            end_approach: approach_point(&end, config.approach_clearance),
            config: &config,
            obstacles: Some(obstacles),
        };
        avoid_obstacles(&ctx, track, obstacles)
    }

    fn obstacle(id: &str, left: f64, top: f64, right: f64, bottom: f64) -> Obstacle {
        Obstacle {
            id: id.into(),
            rect: Rect::new(left, top, right, bottom),
        }
    }

    #[test]
    fn horizontal_segment_bypasses_on_the_nearer_side() {
        let obstacles = vec![obstacle("u", 150.0, 0.0, 250.0, 80.0)];
        let path = detour(vec![Point::new(0.0, 50.0), Point::new(400.0, 50.0)], &obstacles);
        assert_eq!(
            path,
            vec![
                Point::new(0.0, 50.0),
                Point::new(120.0, 50.0),
                Point::new(120.0, 110.0),
                Point::new(280.0, 110.0),
                Point::new(280.0, 50.0),
                Point::new(400.0, 50.0),
            ]
        );
    }

    #[test]
    fn vertical_segment_ties_go_left() {
        let obstacles = vec![obstacle("u", 260.0, 30.0, 300.0, 70.0)];
        let path = detour(vec![Point::new(280.0, -30.0), Point::new(280.0, 250.0)], &obstacles);
        assert_eq!(
            path,
            vec![
                Point::new(280.0, -30.0),
                Point::new(280.0, 0.0),
                Point::new(230.0, 0.0),
                Point::new(230.0, 100.0),
                Point::new(280.0, 100.0),
                Point::new(280.0, 250.0),
            ]
        );
    }

    #[test]
    fn chained_obstacles_are_bypassed_in_travel_order() {
        let obstacles = vec![
            obstacle("far", 300.0, 40.0, 340.0, 100.0),
            obstacle("near", 100.0, 40.0, 140.0, 100.0),
        ];
        let path = detour(vec![Point::new(400.0, 50.0), Point::new(0.0, 50.0)], &obstacles);
        assert!(is_rectilinear(&path));
        assert_eq!(path[1], Point::new(370.0, 50.0));
        assert_eq!(path[2], Point::new(370.0, 10.0));
        assert_eq!(path[5], Point::new(170.0, 50.0));
        for w in path.windows(2) {
            for o in &obstacles {
                assert!(!segment_crosses_interior(w[0], w[1], &o.rect.expanded(30.0)));
            }
        }
        assert_eq!(*path.last().unwrap(), Point::new(0.0, 50.0));
    }

    #[test]
    fn segment_starting_inside_the_zone_is_clamped() {
        let obstacles = vec![obstacle("u", 100.0, 0.0, 200.0, 100.0)];
        let path = detour(vec![Point::new(150.0, -20.0), Point::new(150.0, 300.0)], &obstacles);
        assert_eq!(
            path,
            vec![
                Point::new(150.0, -20.0),
                Point::new(70.0, -20.0),
                Point::new(70.0, 130.0),
                Point::new(150.0, 130.0),
                Point::new(150.0, 300.0),
            ]
        );
    }

    #[test]
    fn ending_in_the_zone_clear_of_the_body_stays_straight() {
        let obstacles = vec![obstacle("u", 100.0, 0.0, 200.0, 100.0)];
        let track = vec![Point::new(0.0, 40.0), Point::new(90.0, 40.0)];
        assert_eq!(detour(track.clone(), &obstacles), track);
    }

    #[test]
    fn owners_are_never_detoured() {
        let owner = Rect::new(0.0, 0.0, 100.0, 100.0);
        let config = RouterConfig::default();
        let wire = WireId::from("w");
        let start = Endpoint::on_edge(Point::new(100.0, 50.0), Edge::Right)
            .with_owner(Some("a".into()), owner);
        let end = Endpoint::free(Point::new(300.0, 50.0));
        let obstacles = vec![obstacle("a", 0.0, 0.0, 100.0, 100.0)];
        let ctx = RouteContext {
            wire: &wire,
            start: &start,
            end: &end,
            start_approach: approach_point(&start, config.approach_clearance),
            end_approach: end.position,
            config: &config,
            obstacles: Some(&obstacles),
        };
        let track = vec![Point::new(120.0, 50.0), Point::new(300.0, 50.0)];
        assert_eq!(avoid_obstacles(&ctx, track.clone(), &obstacles), track);
    }
}
