use std::path::Path;

use wirepath::geometry::{Segment, colinear_overlap, is_rectilinear, segment_crosses_interior};
use wirepath::routing::{CrossingMode, Route};
use wirepath::{HasEdgeAndRect, PinId, Point, Router, RouterConfig, Scene, WireId, parse_scene};

fn load_fixture(rel: &str) -> Scene {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(rel);
    assert!(path.exists(), "fixture missing: {}", rel);
    let input = std::fs::read_to_string(&path).expect("fixture read failed");
    parse_scene(&input).expect("parse failed")
}

fn routed(rel: &str, router: &Router) -> Scene {
    let mut scene = load_fixture(rel);
    scene.route_all(router).expect("routing failed");
    scene
}

fn route<'a>(scene: &'a Scene, wire: &str) -> &'a Route {
    scene
        .route(&WireId::from(wire))
        .unwrap_or_else(|| panic!("wire {wire} has no route"))
}

fn pts(raw: &[(f64, f64)]) -> Vec<Point> {
    raw.iter().map(|&p| p.into()).collect()
}

/// Checks that hold for every wire in every scene.
fn assert_well_formed(scene: &Scene, config: &RouterConfig, fixture: &str) {
    for wire in scene.wires() {
        let wire_route = route(scene, wire.id.as_str());
        let polyline = wire_route.polyline();
        let from = scene.placed_pin(&wire.from).unwrap();
        let to = scene.placed_pin(&wire.to).unwrap();
        let tag = format!("{fixture}/{}", wire.id);

        assert_eq!(polyline.first(), Some(&scene.pin_position(&wire.from).unwrap()), "{tag}: start");
        assert_eq!(polyline.last(), Some(&scene.pin_position(&wire.to).unwrap()), "{tag}: end");
        assert!(is_rectilinear(&wire_route.points), "{tag}: diagonal segment");
        assert!(is_rectilinear(&wire_route.base), "{tag}: diagonal base segment");

        let n = polyline.len();
        for (edge, pin, next) in [
            (from.edge(), polyline[0], polyline[1]),
            (to.edge(), polyline[n - 1], polyline[n - 2]),
        ] {
            let Some(edge) = edge else { continue };
            let (nx, ny) = edge.normal();
            let (dx, dy) = (next.x - pin.x, next.y - pin.y);
            assert!(dx * nx + dy * ny > 0.0, "{tag}: stub does not leave along the normal");
            assert!((dx * ny - dy * nx).abs() < 1e-9, "{tag}: stub is not perpendicular");
        }

        let owners: Vec<_> = [from.owner_id(), to.owner_id()]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        for component in scene.components() {
            // Owners only have to stay out of their body; everything else keeps its margin.
            let zone = if owners.contains(&component.id) {
                component.rect
            } else {
                component.rect.expanded(config.clearance - 1e-6)
            };
            for w in wire_route.points.windows(2) {
                assert!(
                    !segment_crosses_interior(w[0], w[1], &zone),
                    "{tag}: enters the space of component {}",
                    component.id
                );
            }
        }
    }
    assert_lanes_separated(scene, config, fixture);
}

/// Base segments between the two approach points. Stubs at pins with an edge are left
/// out since every wire on a pin shares them.
fn track_segments(scene: &Scene, from: &PinId, to: &PinId, route: &Route) -> Vec<Segment> {
    let (first, last) = if route.swapped { (to, from) } else { (from, to) };
    let has_edge = |pin: &PinId| scene.placed_pin(pin).is_ok_and(|placed| placed.edge().is_some());
    let mut segments: Vec<Segment> = route.base.windows(2).map(|w| (w[0], w[1])).collect();
    if has_edge(last) {
        segments.pop();
    }
    if has_edge(first) && !segments.is_empty() {
        segments.remove(0);
    }
    segments
}

/// Wires sharing a track before jogging end up at least one lane apart.
fn assert_lanes_separated(scene: &Scene, config: &RouterConfig, fixture: &str) {
    let tracks: Vec<(&Route, Vec<Segment>)> = scene
        .wires()
        .map(|wire| {
            let wire_route = route(scene, wire.id.as_str());
            (wire_route, track_segments(scene, &wire.from, &wire.to, wire_route))
        })
        .collect();
    for (i, (a, a_track)) in tracks.iter().enumerate() {
        for (b, b_track) in &tracks[i + 1..] {
            for &(a1, a2) in a_track {
                for &(b1, b2) in b_track {
                    if colinear_overlap(a1, a2, b1, b2, config.overlap_tolerance).is_none() {
                        continue;
                    }
                    let (a_off, b_off) = if (a1.y - a2.y).abs() < 1e-9 {
                        (a.lanes.dy_for(a1.y), b.lanes.dy_for(b1.y))
                    } else {
                        (a.lanes.dx_for(a1.x), b.lanes.dx_for(b1.x))
                    };
                    assert!(
                        (a_off - b_off).abs() >= config.lane_spacing - 1e-9,
                        "{fixture}: {} and {} share a track {a_off} / {b_off} apart",
                        a.wire,
                        b.wire
                    );
                }
            }
        }
    }
}

#[test]
fn route_all_fixtures() {
    // Keep this list explicit so new scenes must be added intentionally.
    let candidates = [
        "straight.json5",
        "u_shape.json5",
        "fan_out.json5",
        "detour.json5",
        "no_edge.json5",
        "crossings.json5",
        "chained.json5",
        "shared_detour.json5",
        "wide_fan_out.json5",
    ];
    let router = Router::default();
    for rel in candidates {
        let scene = routed(rel, &router);
        assert!(scene.wires().count() > 0, "{rel}: no wires");
        assert_well_formed(&scene, router.config(), rel);
    }
}

#[test]
fn routing_is_deterministic() {
    let router = Router::new(RouterConfig {
        crossings: CrossingMode::Bumps,
        ..RouterConfig::default()
    });
    for rel in [
        "fan_out.json5",
        "detour.json5",
        "crossings.json5",
        "shared_detour.json5",
        "wide_fan_out.json5",
    ] {
        let first = routed(rel, &router);
        let second = routed(rel, &router);
        let a: Vec<&Route> = first.routes().collect();
        let b: Vec<&Route> = second.routes().collect();
        assert_eq!(a, b, "{rel}: routes differ between runs");
    }
}

#[test]
fn facing_pins_route_straight() {
    let scene = routed("straight.json5", &Router::default());
    let w = route(&scene, "w");
    assert_eq!(w.points, pts(&[(100.0, 50.0), (120.0, 50.0), (280.0, 50.0), (300.0, 50.0)]));
    assert_eq!(w.bend_count(), 0);
    assert!(!w.swapped);

    let r = route(&scene, "r");
    assert!(r.swapped);
    assert_eq!(r.points[0], Point::new(100.0, 80.0));
    assert_eq!(r.polyline()[0], Point::new(300.0, 80.0));
}

#[test]
fn outward_pins_wrap_over_the_top() {
    let scene = routed("u_shape.json5", &Router::default());
    assert_eq!(
        route(&scene, "u").points,
        pts(&[
            (0.0, 50.0),
            (-20.0, 50.0),
            (-20.0, -30.0),
            (420.0, -30.0),
            (420.0, 60.0),
            (400.0, 60.0),
        ])
    );
}

#[test]
fn fan_out_wires_get_separate_lanes() {
    let scene = routed("fan_out.json5", &Router::default());
    let offsets: Vec<f64> = ["f1", "f2", "f3"]
        .iter()
        .map(|wire| route(&scene, wire).lanes.dy_for(150.0))
        .collect();
    // The wire turning down first runs on the lowest lane.
    assert_eq!(offsets, vec![10.0, 0.0, -10.0]);
    assert_eq!(
        route(&scene, "f1").points,
        pts(&[
            (60.0, 150.0),
            (80.0, 150.0),
            (80.0, 160.0),
            (200.0, 160.0),
            (200.0, 280.0),
            (200.0, 300.0),
        ])
    );
    // Lanes never change the base tracks the wires were laid on.
    for wire in ["f1", "f2", "f3"] {
        assert_eq!(route(&scene, wire).base[2].y, 150.0);
    }
}

#[test]
fn blocked_line_detours_around_the_component() {
    let mut scene = routed("detour.json5", &Router::default());
    assert_eq!(
        route(&scene, "w").points,
        pts(&[
            (100.0, 50.0),
            (120.0, 50.0),
            (220.0, 50.0),
            (220.0, -10.0),
            (340.0, -10.0),
            (340.0, 50.0),
            (480.0, 50.0),
            (500.0, 50.0),
        ])
    );

    // Moving the blocker away lets the wire run straight again.
    scene.move_component(&"c".into(), 0.0, 300.0).unwrap();
    scene.route_all(&Router::default()).unwrap();
    assert_eq!(route(&scene, "w").bend_count(), 0);
    assert_eq!(route(&scene, "w").points.len(), 4);
}

#[test]
fn free_pins_use_a_midpoint_dogleg() {
    let scene = routed("no_edge.json5", &Router::default());
    assert_eq!(
        route(&scene, "n").points,
        pts(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (200.0, 100.0)])
    );
}

#[test]
fn crossing_bump_goes_on_the_horizontal_wire() {
    let router = Router::new(RouterConfig {
        crossings: CrossingMode::Bumps,
        ..RouterConfig::default()
    });
    let scene = routed("crossings.json5", &router);
    let w = route(&scene, "w");
    assert_eq!(w.bumps.len(), 1);
    assert_eq!(w.bumps[0].at, Point::new(200.0, 50.0));
    assert_eq!(w.bumps[0].segment, 1);
    assert!(route(&scene, "v").bumps.is_empty());

    let plain = routed("crossings.json5", &Router::default());
    assert!(plain.routes().all(|route| route.bumps.is_empty()));
}

#[test]
fn chained_overlaps_take_distinct_lanes() {
    let scene = routed("chained.json5", &Router::default());
    let offsets: Vec<f64> = ["a", "b", "c"]
        .iter()
        .map(|wire| route(&scene, wire).lanes.dy_for(100.0))
        .collect();
    // a and c never touch, but both overlap b, so all three get their own lane.
    assert_eq!(offsets, vec![-10.0, 0.0, 10.0]);
    assert_eq!(
        route(&scene, "a").points,
        pts(&[(0.0, 100.0), (0.0, 90.0), (200.0, 90.0), (200.0, 100.0)])
    );
}

#[test]
fn shared_detour_lanes_stay_outside_the_clearance() {
    let scene = routed("shared_detour.json5", &Router::default());
    let w1 = route(&scene, "w1");
    let w2 = route(&scene, "w2");
    // Both wires bend over the block; the lanes spread away from it.
    assert_eq!((w1.lanes.dx_for(220.0), w2.lanes.dx_for(220.0)), (-10.0, 0.0));
    assert_eq!((w1.lanes.dy_for(-10.0), w2.lanes.dy_for(-10.0)), (-10.0, 0.0));
    assert_eq!((w1.lanes.dx_for(340.0), w2.lanes.dx_for(340.0)), (0.0, 10.0));
    assert_eq!(
        w1.points,
        pts(&[
            (100.0, 50.0),
            (120.0, 50.0),
            (210.0, 50.0),
            (210.0, -20.0),
            (340.0, -20.0),
            (340.0, 50.0),
            (480.0, 50.0),
            (500.0, 50.0),
        ])
    );
    assert_eq!(
        w2.points,
        pts(&[
            (100.0, 60.0),
            (120.0, 60.0),
            (220.0, 60.0),
            (220.0, -10.0),
            (350.0, -10.0),
            (350.0, 60.0),
            (480.0, 60.0),
            (500.0, 60.0),
        ])
    );
}

#[test]
fn wide_fan_out_keeps_every_stub() {
    let scene = routed("wide_fan_out.json5", &Router::default());
    let offsets: Vec<f64> = ["f0", "f1", "f2", "f3", "f4"]
        .iter()
        .map(|wire| route(&scene, wire).lanes.dy_for(80.0))
        .collect();
    // Centred lanes would fold the last stub back onto the pin; the set moves outward.
    assert_eq!(offsets, vec![-30.0, -20.0, -10.0, 0.0, 10.0]);
    assert_eq!(
        route(&scene, "f4").points,
        pts(&[(100.0, 100.0), (100.0, 90.0), (580.0, 90.0), (580.0, 0.0), (600.0, 0.0)])
    );
}
