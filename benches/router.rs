use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use wirepath::geometry::{Edge, Point, Rect};
use wirepath::routing::{CrossingMode, Endpoint};
use wirepath::scene::{Component, Pin, WireSpec};
use wirepath::{Router, RouterConfig, Scene, compute_path};

/// A `cols` x `rows` grid of components, each wired to its right and lower neighbours.
fn grid_scene(cols: usize, rows: usize) -> Scene {
    let mut scene = Scene::new();
    let id = |c: usize, r: usize| format!("c{c}_{r}");
    for r in 0..rows {
        for c in 0..cols {
            let name = id(c, r);
            let rect = Rect::from_xywh(c as f64 * 200.0, r as f64 * 160.0, 80.0, 60.0);
            scene
                .add_component(Component::new(name.as_str(), rect))
                .expect("component");
            for (edge, suffix) in [
                (Edge::Left, "w"),
                (Edge::Right, "e"),
                (Edge::Top, "n"),
                (Edge::Bottom, "s"),
            ] {
                let length = if edge.is_vertical() { 60.0 } else { 80.0 };
                scene
                    .add_pin(Pin::on_edge(format!("{name}.{suffix}"), name.as_str(), edge, length / 2.0))
                    .expect("pin");
            }
        }
    }
    for r in 0..rows {
        for c in 0..cols {
            if c + 1 < cols {
                scene
                    .add_wire(WireSpec::new(
                        format!("h{c}_{r}"),
                        format!("{}.e", id(c, r)),
                        format!("{}.w", id(c + 1, r)),
                    ))
                    .expect("wire");
            }
            if r + 1 < rows {
                scene
                    .add_wire(WireSpec::new(
                        format!("v{c}_{r}"),
                        format!("{}.s", id(c, r)),
                        format!("{}.n", id(c, r + 1)),
                    ))
                    .expect("wire");
            }
            // Long diagonal runs that have to weave through the grid.
            if c + 2 < cols && r + 1 < rows {
                scene
                    .add_wire(WireSpec::new(
                        format!("d{c}_{r}"),
                        format!("{}.e", id(c, r)),
                        format!("{}.n", id(c + 2, r + 1)),
                    ))
                    .expect("wire");
            }
        }
    }
    scene
}

fn bench_route_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_all");
    let plain = Router::default();
    let bumps = Router::new(RouterConfig {
        crossings: CrossingMode::Bumps,
        ..RouterConfig::default()
    });
    for (cols, rows) in [(4usize, 3usize), (8, 6), (12, 10)] {
        let name = format!("grid_{cols}x{rows}");
        let scene = grid_scene(cols, rows);
        group.bench_with_input(BenchmarkId::new("plain", &name), &scene, |b, scene| {
            b.iter(|| {
                let mut scene = scene.clone();
                scene.route_all(&plain).expect("route");
                black_box(scene.routes().count());
            });
        });
        group.bench_with_input(BenchmarkId::new("bumps", &name), &scene, |b, scene| {
            b.iter(|| {
                let mut scene = scene.clone();
                scene.route_all(&bumps).expect("route");
                black_box(scene.routes().count());
            });
        });
    }
    group.finish();
}

fn bench_single_path(c: &mut Criterion) {
    let owner_a = Rect::from_xywh(0.0, 0.0, 100.0, 100.0);
    let owner_b = Rect::from_xywh(300.0, 20.0, 100.0, 100.0);
    let start = Endpoint::on_edge(Point::new(0.0, 50.0), Edge::Left).with_owner(Some("a".into()), owner_a);
    let end = Endpoint::on_edge(Point::new(400.0, 60.0), Edge::Right).with_owner(Some("b".into()), owner_b);
    c.bench_function("compute_path_u_shape", |b| {
        b.iter(|| {
            let path = compute_path(black_box(&start), black_box(&end), None, None, 30.0, 20.0, 10.0);
            black_box(path.len());
        });
    });
}

criterion_group!(benches, bench_route_all, bench_single_path);
criterion_main!(benches);
