use serde::Deserialize;

use crate::error::ParseError;
use crate::geometry::{Edge, Point, Rect};
use crate::scene::{Component, Pin, PinPlacement, Scene, WireSpec};

#[derive(Debug, Default, Deserialize)]
struct SceneFile {
    #[serde(default)]
    components: Vec<ComponentDef>,
    #[serde(default)]
    pins: Vec<PinDef>,
    #[serde(default)]
    wires: Vec<WireDef>,
}

#[derive(Debug, Deserialize)]
struct ComponentDef {
    id: String,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    label: Option<String>,
    /// Pins listed inline belong to this component.
    #[serde(default)]
    pins: Vec<PinDef>,
}

#[derive(Debug, Deserialize)]
struct PinDef {
    id: String,
    component: Option<String>,
    edge: Option<Edge>,
    offset: Option<f64>,
    x: Option<f64>,
    y: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireDef {
    id: String,
    from: String,
    to: String,
}

/// Parses a JSON5 scene description:
///
/// ```json5
/// {
///   components: [{ id: "r1", x: 0, y: 0, width: 60, height: 20,
///                  pins: [{ id: "r1.a", edge: "left" }] }],
///   pins: [{ id: "gnd", x: 200, y: 100 }],
///   wires: [{ id: "n1", from: "r1.a", to: "gnd" }],
/// }
/// ```
pub fn parse_scene(input: &str) -> Result<Scene, ParseError> {
    let file: SceneFile = json5::from_str(input)?;
    let mut scene = Scene::new();
    let mut pins = Vec::new();

    for def in file.components {
        let rect = Rect::from_xywh(def.x, def.y, def.width, def.height);
        for pin in def.pins {
            pins.push((Some(def.id.clone()), pin));
        }
        scene.add_component(Component {
            id: def.id.into(),
            rect,
            label: def.label,
        })?;
    }
    pins.extend(file.pins.into_iter().map(|pin| (None, pin)));

    for (owner, def) in pins {
        let pin = resolve_pin(&scene, owner, def)?;
        scene.add_pin(pin)?;
    }
    for def in file.wires {
        scene.add_wire(WireSpec::new(def.id, def.from, def.to))?;
    }
    tracing::debug!(
        components = scene.components().count(),
        pins = scene.pins().count(),
        wires = scene.wires().count(),
        "parsed scene"
    );
    Ok(scene)
}

fn resolve_pin(scene: &Scene, owner: Option<String>, def: PinDef) -> Result<Pin, ParseError> {
    let component = def.component.or(owner);
    let pin_error = |message: &str| ParseError::Pin {
        pin: def.id.clone(),
        message: message.to_string(),
    };
    let rect = match &component {
        Some(id) => match scene.component(&id.as_str().into()) {
            Some(c) => Some(c.rect),
            None => return Err(pin_error(&format!("unknown component `{id}`"))),
        },
        None => None,
    };

    let placement = match (def.edge, rect) {
        (Some(edge), Some(rect)) => {
            let length = if edge.is_vertical() {
                rect.height()
            } else {
                rect.width()
            };
            let offset = def.offset.unwrap_or(length / 2.0);
            if !(0.0..=length).contains(&offset) {
                return Err(pin_error("offset lies outside the edge"));
            }
            PinPlacement::OnEdge { edge, offset }
        }
        (Some(_), None) => return Err(pin_error("an edge pin needs a component")),
        (None, rect) => match (def.x, def.y, rect) {
            (Some(x), Some(y), _) => PinPlacement::Fixed(Point::new(x, y)),
            (None, None, Some(rect)) => PinPlacement::Fixed(Point::new(rect.width() / 2.0, rect.height() / 2.0)),
            _ => return Err(pin_error("a pin without an edge needs both x and y")),
        },
    };

    Ok(Pin {
        id: def.id.into(),
        component: component.map(Into::into),
        placement,
    })
}
