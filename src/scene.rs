use std::collections::BTreeMap;

use crate::error::SceneError;
use crate::geometry::{Edge, Point, Rect};
use crate::routing::{
    ComponentId, Endpoint, FanOutEntry, HasEdgeAndRect, Obstacle, ObstacleProvider, PinId, Route,
    RouteRequest, Router, SiblingWireProvider, WireId, WireSegment,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub id: ComponentId,
    pub rect: Rect,
    pub label: Option<String>,
}

impl Component {
    pub fn new(id: impl Into<ComponentId>, rect: Rect) -> Self {
        Self {
            id: id.into(),
            rect,
            label: None,
        }
    }
}

/// Where a pin sits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PinPlacement {
    /// On a side of the owning component, `offset` units from its top or left corner.
    OnEdge { edge: Edge, offset: f64 },
    /// Relative to the owner's top-left corner, or absolute for a free pin. Wires treat
    /// such pins as having no edge.
    Fixed(Point),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    pub id: PinId,
    pub component: Option<ComponentId>,
    pub placement: PinPlacement,
}

impl Pin {
    pub fn on_edge(id: impl Into<PinId>, component: impl Into<ComponentId>, edge: Edge, offset: f64) -> Self {
        Self {
            id: id.into(),
            component: Some(component.into()),
            placement: PinPlacement::OnEdge { edge, offset },
        }
    }

    pub fn free(id: impl Into<PinId>, at: Point) -> Self {
        Self {
            id: id.into(),
            component: None,
            placement: PinPlacement::Fixed(at),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WireSpec {
    pub id: WireId,
    pub from: PinId,
    pub to: PinId,
}

impl WireSpec {
    pub fn new(id: impl Into<WireId>, from: impl Into<PinId>, to: impl Into<PinId>) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn touches(&self, pin: &PinId) -> bool {
        self.from == *pin || self.to == *pin
    }
}

/// A pin resolved against its owning component.
pub struct PlacedPin<'a> {
    pin: &'a Pin,
    owner: Option<&'a Component>,
}

impl HasEdgeAndRect for PlacedPin<'_> {
    fn connection_point(&self) -> Point {
        let origin = self.owner.map(|c| Point::new(c.rect.left, c.rect.top));
        match (self.pin.placement, self.owner) {
            (PinPlacement::OnEdge { edge, offset }, Some(owner)) => {
                let r = owner.rect;
                match edge {
                    Edge::Left => Point::new(r.left, r.top + offset),
                    Edge::Right => Point::new(r.right, r.top + offset),
                    Edge::Top => Point::new(r.left + offset, r.top),
                    Edge::Bottom => Point::new(r.left + offset, r.bottom),
                }
            }
            // Rejected by `Scene::add_pin`.
            (PinPlacement::OnEdge { .. }, None) => Point::default(),
            (PinPlacement::Fixed(at), _) => match origin {
                Some(origin) => origin.offset(at.x, at.y),
                None => at,
            },
        }
    }

    fn edge(&self) -> Option<Edge> {
        match (self.pin.placement, self.owner) {
            (PinPlacement::OnEdge { edge, .. }, Some(_)) => Some(edge),
            _ => None,
        }
    }

    fn owner_rect(&self) -> Option<Rect> {
        self.owner.map(|c| c.rect)
    }

    fn owner_id(&self) -> Option<&ComponentId> {
        self.owner.map(|c| &c.id)
    }

    fn pin_id(&self) -> Option<&PinId> {
        Some(&self.pin.id)
    }
}

/// Components, pins and wires of a schematic, with the current route of every wire.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    components: BTreeMap<ComponentId, Component>,
    pins: BTreeMap<PinId, Pin>,
    wires: BTreeMap<WireId, WireSpec>,
    routes: BTreeMap<WireId, Route>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_component(&mut self, component: Component) -> Result<(), SceneError> {
        let r = component.rect;
        if !r.is_finite() || r.width() < 0.0 || r.height() < 0.0 {
            return Err(SceneError::InvalidRect(component.id));
        }
        if self.components.contains_key(&component.id) {
            return Err(SceneError::DuplicateComponent(component.id));
        }
        self.components.insert(component.id.clone(), component);
        Ok(())
    }

    pub fn add_pin(&mut self, pin: Pin) -> Result<(), SceneError> {
        if pin.component.is_none() && matches!(pin.placement, PinPlacement::OnEdge { .. }) {
            return Err(SceneError::DetachedEdgePin(pin.id));
        }
        if let Some(component) = &pin.component
            && !self.components.contains_key(component)
        {
            return Err(SceneError::UnknownComponent(component.clone()));
        }
        if self.pins.contains_key(&pin.id) {
            return Err(SceneError::DuplicatePin(pin.id));
        }
        self.pins.insert(pin.id.clone(), pin);
        Ok(())
    }

    pub fn add_wire(&mut self, wire: WireSpec) -> Result<(), SceneError> {
        if self.wires.contains_key(&wire.id) {
            return Err(SceneError::DuplicateWire(wire.id));
        }
        for pin in [&wire.from, &wire.to] {
            if !self.pins.contains_key(pin) {
                return Err(SceneError::UnknownPin(pin.clone()));
            }
        }
        if wire.from == wire.to {
            return Err(SceneError::SelfConnection {
                pin: wire.from.clone(),
                wire: wire.id,
            });
        }
        self.wires.insert(wire.id.clone(), wire);
        Ok(())
    }

    /// Removes the wire and its route.
    pub fn remove_wire(&mut self, id: &WireId) -> Result<WireSpec, SceneError> {
        self.routes.remove(id);
        self.wires
            .remove(id)
            .ok_or_else(|| SceneError::UnknownWire(id.clone()))
    }

    /// Moves a component with its pins and returns the wires attached to it, which need
    /// a reroute.
    pub fn move_component(&mut self, id: &ComponentId, dx: f64, dy: f64) -> Result<Vec<WireId>, SceneError> {
        let component = self
            .components
            .get_mut(id)
            .ok_or_else(|| SceneError::UnknownComponent(id.clone()))?;
        component.rect = component.rect.translated(dx, dy);
        Ok(self.wires_of_component(id))
    }

    pub fn wires_of_component(&self, id: &ComponentId) -> Vec<WireId> {
        self.wires
            .values()
            .filter(|wire| {
                [&wire.from, &wire.to].into_iter().any(|pin| {
                    self.pins
                        .get(pin)
                        .is_some_and(|p| p.component.as_ref() == Some(id))
                })
            })
            .map(|wire| wire.id.clone())
            .collect()
    }

    pub fn component(&self, id: &ComponentId) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn pin(&self, id: &PinId) -> Option<&Pin> {
        self.pins.get(id)
    }

    pub fn wire(&self, id: &WireId) -> Option<&WireSpec> {
        self.wires.get(id)
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn pins(&self) -> impl Iterator<Item = &Pin> {
        self.pins.values()
    }

    pub fn wires(&self) -> impl Iterator<Item = &WireSpec> {
        self.wires.values()
    }

    pub fn route(&self, id: &WireId) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn placed_pin(&self, id: &PinId) -> Result<PlacedPin<'_>, SceneError> {
        let pin = self
            .pins
            .get(id)
            .ok_or_else(|| SceneError::UnknownPin(id.clone()))?;
        let owner = match &pin.component {
            Some(component) => Some(
                self.components
                    .get(component)
                    .ok_or_else(|| SceneError::UnknownComponent(component.clone()))?,
            ),
            None => None,
        };
        Ok(PlacedPin { pin, owner })
    }

    pub fn pin_position(&self, id: &PinId) -> Result<Point, SceneError> {
        Ok(self.placed_pin(id)?.connection_point())
    }

    pub fn endpoint(&self, id: &PinId) -> Result<Endpoint, SceneError> {
        Ok(Endpoint::from_pin(&self.placed_pin(id)?))
    }

    pub fn request(&self, id: &WireId) -> Result<RouteRequest, SceneError> {
        let wire = self
            .wires
            .get(id)
            .ok_or_else(|| SceneError::UnknownWire(id.clone()))?;
        Ok(RouteRequest::new(
            wire.id.clone(),
            self.endpoint(&wire.from)?,
            self.endpoint(&wire.to)?,
        ))
    }

    /// Stores a route computed elsewhere, e.g. by the background dispatcher.
    pub fn set_route(&mut self, route: Route) -> Result<(), SceneError> {
        if !self.wires.contains_key(&route.wire) {
            return Err(SceneError::UnknownWire(route.wire));
        }
        self.routes.insert(route.wire.clone(), route);
        Ok(())
    }

    /// Routes every wire. The first pass lays out base tracks, the second assigns lanes
    /// against them, and a third resolves crossings against the final geometry.
    pub fn route_all(&mut self, router: &Router) -> Result<(), SceneError> {
        let ids: Vec<WireId> = self.wires.keys().cloned().collect();
        self.reroute(router, &ids)
    }

    /// Retracks `wires` and refreshes lanes and crossings for the whole scene.
    pub fn reroute(&mut self, router: &Router, wires: &[WireId]) -> Result<(), SceneError> {
        let base = {
            let scene: &Scene = self;
            wires
                .iter()
                .map(|id| Ok(router.route(&scene.request(id)?, Some(scene), None)))
                .collect::<Result<Vec<_>, SceneError>>()?
        };
        for route in base {
            self.routes.insert(route.wire.clone(), route);
        }

        let finished = {
            let scene: &Scene = self;
            scene
                .wires
                .keys()
                .map(|id| Ok(router.route(&scene.request(id)?, Some(scene), Some(scene))))
                .collect::<Result<Vec<_>, SceneError>>()?
        };
        for route in finished {
            self.routes.insert(route.wire.clone(), route);
        }

        let bumps: Vec<_> = {
            let scene: &Scene = self;
            scene
                .routes
                .values()
                .map(|route| router.resolve_crossings(&route.wire, &route.points, scene))
                .collect()
        };
        for (route, bumps) in self.routes.values_mut().zip(bumps) {
            route.bumps = bumps;
        }
        tracing::debug!(wires = self.wires.len(), retracked = wires.len(), "scene routed");
        Ok(())
    }

    /// Smallest rect holding every component and route.
    pub fn bounds(&self) -> Option<Rect> {
        let rects = self.components.values().map(|c| c.rect);
        let points = self
            .routes
            .values()
            .flat_map(|route| route.points.iter().map(|p| Rect::around(*p, *p)));
        rects.chain(points).reduce(|acc, rect| acc.union(&rect))
    }
}

impl ObstacleProvider for Scene {
    fn rects_near(&self, query: Rect) -> Vec<Obstacle> {
        self.components
            .values()
            .filter(|c| c.rect.intersects(&query))
            .map(|c| Obstacle {
                id: c.id.clone(),
                rect: c.rect,
            })
            .collect()
    }
}

fn segments_of(wire: &WireId, points: &[Point]) -> Vec<WireSegment> {
    points
        .windows(2)
        .map(|w| WireSegment {
            wire: wire.clone(),
            start: w[0],
            end: w[1],
        })
        .collect()
}

impl SiblingWireProvider for Scene {
    fn segments_of_other_wires(&self, excluding: &WireId) -> Vec<WireSegment> {
        self.routes
            .values()
            .filter(|route| route.wire != *excluding)
            .flat_map(|route| segments_of(&route.wire, &route.base))
            .collect()
    }

    fn fan_out(&self, pin: &PinId, excluding: &WireId) -> Vec<FanOutEntry> {
        self.wires
            .values()
            .filter(|wire| wire.id != *excluding && wire.touches(pin))
            .filter_map(|wire| {
                let far = if wire.from == *pin { &wire.to } else { &wire.from };
                let far_end = self.pin_position(far).ok()?;
                Some(FanOutEntry {
                    wire: wire.id.clone(),
                    far_end,
                })
            })
            .collect()
    }

    fn crossing_segments(&self, excluding: &WireId) -> Vec<WireSegment> {
        self.routes
            .values()
            .filter(|route| route.wire != *excluding)
            .flat_map(|route| segments_of(&route.wire, &route.points))
            .collect()
    }
}
