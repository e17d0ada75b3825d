use crate::routing::{Bump, TrackAxis};
use crate::scene::Scene;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct RouteDump {
    pub components: Vec<ComponentDump>,
    pub wires: Vec<WireDump>,
}

#[derive(Debug, Serialize)]
pub struct ComponentDump {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Serialize)]
pub struct WireDump {
    pub id: String,
    pub from: String,
    pub to: String,
    /// Endpoints were exchanged so the path runs left to right.
    pub swapped: bool,
    pub points: Vec<[f64; 2]>,
    pub base: Vec<[f64; 2]>,
    pub length: f64,
    pub bends: usize,
    pub lanes: Vec<LaneDump>,
    pub bumps: Vec<Bump>,
}

#[derive(Debug, Serialize)]
pub struct LaneDump {
    pub axis: &'static str,
    pub track: f64,
    pub offset: f64,
}

impl RouteDump {
    pub fn from_scene(scene: &Scene) -> Self {
        let components = scene
            .components()
            .map(|c| ComponentDump {
                id: c.id.to_string(),
                x: c.rect.left,
                y: c.rect.top,
                width: c.rect.width(),
                height: c.rect.height(),
            })
            .collect();

        let wires = scene
            .wires()
            .filter_map(|spec| {
                let route = scene.route(&spec.id)?;
                Some(WireDump {
                    id: spec.id.to_string(),
                    from: spec.from.to_string(),
                    to: spec.to.to_string(),
                    swapped: route.swapped,
                    points: route.points.iter().map(|p| [p.x, p.y]).collect(),
                    base: route.base.iter().map(|p| [p.x, p.y]).collect(),
                    length: route.length(),
                    bends: route.bend_count(),
                    lanes: route
                        .lanes
                        .tracks()
                        .into_iter()
                        .map(|(axis, track, offset)| LaneDump {
                            axis: match axis {
                                TrackAxis::Horizontal => "horizontal",
                                TrackAxis::Vertical => "vertical",
                            },
                            track,
                            offset,
                        })
                        .collect(),
                    bumps: route.bumps.clone(),
                })
            })
            .collect();

        RouteDump { components, wires }
    }
}

/// Writes the routed scene as pretty JSON, to stdout when `output` is `None`.
pub fn write_route_dump(scene: &Scene, output: Option<&Path>) -> anyhow::Result<()> {
    let dump = RouteDump::from_scene(scene);
    match output {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &dump)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}
