//! Orthogonal wire routing between component pins.
//!
//! A route is built in phases: canonical ordering, perpendicular approach stubs, a basic
//! L/U template, obstacle detours, lane jogs against sibling wires and finally crossing
//! bumps. Each phase lives in its own submodule and only sees a [`RouteContext`].

mod approach;
mod crossing;
mod detour;
mod lanes;
mod path;
mod template;

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::RouterConfig;
use crate::error::RouteError;
use crate::geometry::{Edge, Point, Rect, Segment, path_bend_count, path_length, simplify_path};

pub use approach::approach_point;
pub use crossing::{Bump, BumpResolver, CrossingMode, CrossingResolver, wire_angle};
pub use lanes::{LaneOffsets, TrackAxis};
pub use path::PathCommand;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifies a component placed in the scene.
    ComponentId
);
string_id!(PinId);
string_id!(
    /// Identifies a wire. Lane ranking orders wires by this id, so it has to be stable
    /// across reroutes.
    WireId
);

#[derive(Debug, Clone, PartialEq)]
pub struct Owner {
    pub id: Option<ComponentId>,
    pub rect: Rect,
}

/// One end of a wire as the router sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub position: Point,
    /// Side of the owner the pin sits on. `None` for free points.
    pub edge: Option<Edge>,
    pub owner: Option<Owner>,
    pub pin: Option<PinId>,
}

impl Endpoint {
    pub fn free(position: Point) -> Self {
        Self {
            position,
            edge: None,
            owner: None,
            pin: None,
        }
    }

    pub fn on_edge(position: Point, edge: Edge) -> Self {
        Self {
            edge: Some(edge),
            ..Self::free(position)
        }
    }

    pub fn with_owner(mut self, id: Option<ComponentId>, rect: Rect) -> Self {
        self.owner = Some(Owner { id, rect });
        self
    }

    pub fn with_pin(mut self, pin: impl Into<PinId>) -> Self {
        self.pin = Some(pin.into());
        self
    }

    pub fn from_pin(pin: &impl HasEdgeAndRect) -> Self {
        Self {
            position: pin.connection_point(),
            edge: pin.edge(),
            owner: pin.owner_rect().map(|rect| Owner {
                id: pin.owner_id().cloned(),
                rect,
            }),
            pin: pin.pin_id().cloned(),
        }
    }

    /// True when `obstacle` is the component this endpoint belongs to.
    pub(crate) fn owns(&self, obstacle: &Obstacle) -> bool {
        match &self.owner {
            Some(Owner { id: Some(id), .. }) => *id == obstacle.id,
            Some(Owner { id: None, rect }) => *rect == obstacle.rect,
            None => false,
        }
    }
}

/// Anything that can act as a wire endpoint: a pin with a connection point, the side it
/// sits on and the rect of the component that owns it.
pub trait HasEdgeAndRect {
    fn connection_point(&self) -> Point;
    fn edge(&self) -> Option<Edge>;
    fn owner_rect(&self) -> Option<Rect>;

    fn owner_id(&self) -> Option<&ComponentId> {
        None
    }

    fn pin_id(&self) -> Option<&PinId> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub id: ComponentId,
    pub rect: Rect,
}

/// Spatial query over the components a wire must not pass through.
pub trait ObstacleProvider {
    /// Every obstacle whose rect intersects `query`.
    fn rects_near(&self, query: Rect) -> Vec<Obstacle>;
}

impl ObstacleProvider for [Obstacle] {
    fn rects_near(&self, query: Rect) -> Vec<Obstacle> {
        self.iter()
            .filter(|obstacle| obstacle.rect.intersects(&query))
            .cloned()
            .collect()
    }
}

impl ObstacleProvider for Vec<Obstacle> {
    fn rects_near(&self, query: Rect) -> Vec<Obstacle> {
        self.as_slice().rects_near(query)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WireSegment {
    pub wire: WireId,
    pub start: Point,
    pub end: Point,
}

/// Another wire leaving the same pin, with the position of its opposite end.
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutEntry {
    pub wire: WireId,
    pub far_end: Point,
}

/// Read access to the other wires of the scene.
///
/// `segments_of_other_wires` should report the un-jogged tracks (see [`Route::base`]) so
/// that lane assignment does not depend on the order in which wires were routed.
pub trait SiblingWireProvider {
    fn segments_of_other_wires(&self, excluding: &WireId) -> Vec<WireSegment>;

    /// Other wires with an endpoint on `pin`.
    fn fan_out(&self, _pin: &PinId, _excluding: &WireId) -> Vec<FanOutEntry> {
        Vec::new()
    }

    /// Final geometry of the other wires, used for crossing detection.
    fn crossing_segments(&self, excluding: &WireId) -> Vec<WireSegment> {
        self.segments_of_other_wires(excluding)
    }
}

impl SiblingWireProvider for [WireSegment] {
    fn segments_of_other_wires(&self, excluding: &WireId) -> Vec<WireSegment> {
        self.iter()
            .filter(|segment| segment.wire != *excluding)
            .cloned()
            .collect()
    }
}

impl SiblingWireProvider for Vec<WireSegment> {
    fn segments_of_other_wires(&self, excluding: &WireId) -> Vec<WireSegment> {
        self.as_slice().segments_of_other_wires(excluding)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub wire: WireId,
    pub start: Endpoint,
    pub end: Endpoint,
}

impl RouteRequest {
    pub fn new(wire: impl Into<WireId>, start: Endpoint, end: Endpoint) -> Self {
        Self {
            wire: wire.into(),
            start,
            end,
        }
    }
}

/// Ordered waypoints in the caller's start-to-end order.
pub type Path = Vec<Point>;

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub wire: WireId,
    /// Final polyline in canonical (stored) order, pin points included.
    pub points: Vec<Point>,
    /// The same route before lane jogs were applied.
    pub base: Vec<Point>,
    /// Endpoints were swapped so the stored order runs left to right.
    pub swapped: bool,
    pub bumps: Vec<Bump>,
    pub lanes: LaneOffsets,
}

impl Route {
    /// Waypoints in the order the request gave its endpoints.
    pub fn polyline(&self) -> Path {
        let mut points = self.points.clone();
        if self.swapped {
            points.reverse();
        }
        points
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.points.windows(2).map(|w| (w[0], w[1])).collect()
    }

    pub fn base_segments(&self) -> Vec<Segment> {
        self.base.windows(2).map(|w| (w[0], w[1])).collect()
    }

    pub fn length(&self) -> f64 {
        path_length(&self.points)
    }

    pub fn bend_count(&self) -> usize {
        path_bend_count(&self.points)
    }
}

/// Everything a routing phase needs to know about the wire being routed. Endpoints are
/// already in canonical order.
pub(crate) struct RouteContext<'a> {
    pub(crate) wire: &'a WireId,
    pub(crate) start: &'a Endpoint,
    pub(crate) end: &'a Endpoint,
    pub(crate) start_approach: Point,
    pub(crate) end_approach: Point,
    pub(crate) config: &'a RouterConfig,
    pub(crate) obstacles: Option<&'a dyn ObstacleProvider>,
}

impl RouteContext<'_> {
    pub(crate) fn is_owner(&self, obstacle: &Obstacle) -> bool {
        self.start.owns(obstacle) || self.end.owns(obstacle)
    }

    pub(crate) fn owner_rects(&self) -> impl Iterator<Item = Rect> + '_ {
        [&self.start.owner, &self.end.owner]
            .into_iter()
            .flatten()
            .map(|owner| owner.rect)
    }

    /// Obstacles near `query`, minus the two components the wire connects.
    pub(crate) fn foreign_obstacles(&self, query: Rect) -> Vec<Obstacle> {
        let Some(provider) = self.obstacles else {
            return Vec::new();
        };
        provider
            .rects_near(query)
            .into_iter()
            .filter(|obstacle| !self.is_owner(obstacle))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Router {
    config: RouterConfig,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Routes one wire. Without obstacles the detour phase is skipped, without siblings
    /// the lane and crossing phases are.
    pub fn route(
        &self,
        request: &RouteRequest,
        obstacles: Option<&dyn ObstacleProvider>,
        siblings: Option<&dyn SiblingWireProvider>,
    ) -> Route {
        let swapped =
            self.config.canonical_order && request.start.position.x > request.end.position.x;
        let (start, end) = if swapped {
            (&request.end, &request.start)
        } else {
            (&request.start, &request.end)
        };
        let ctx = RouteContext {
            wire: &request.wire,
            start,
            end,
            start_approach: approach_point(start, self.config.approach_clearance),
            end_approach: approach_point(end, self.config.approach_clearance),
            config: &self.config,
            obstacles,
        };

        let mut track = template::basic_path(&ctx);
        if let Some(obstacles) = obstacles {
            track = detour::avoid_obstacles(&ctx, track, obstacles);
        }
        let last = track.len().saturating_sub(1);
        let track = simplify_path(&track, &[0, last]);
        let base = assemble(start.position, &track, end.position);

        let (jogged, lanes) = match siblings {
            Some(siblings) => lanes::apply_lanes(&ctx, &track, &base, siblings),
            None => (track, LaneOffsets::default()),
        };
        let points = assemble(start.position, &jogged, end.position);

        let bumps = match siblings {
            Some(siblings) => self.resolve_crossings(&request.wire, &points, siblings),
            None => Vec::new(),
        };

        tracing::debug!(
            wire = %request.wire,
            points = points.len(),
            swapped,
            lanes = lanes.len(),
            bumps = bumps.len(),
            "routed wire"
        );

        Route {
            wire: request.wire.clone(),
            points,
            base,
            swapped,
            bumps,
            lanes,
        }
    }

    /// Like [`Router::route`] but rejects requests whose geometry is not finite.
    pub fn try_route(
        &self,
        request: &RouteRequest,
        obstacles: Option<&dyn ObstacleProvider>,
        siblings: Option<&dyn SiblingWireProvider>,
    ) -> Result<Route, RouteError> {
        for (end, endpoint) in [("start", &request.start), ("end", &request.end)] {
            if !endpoint.position.is_finite() {
                return Err(RouteError::NonFinitePoint {
                    wire: request.wire.clone(),
                    end,
                    x: endpoint.position.x,
                    y: endpoint.position.y,
                });
            }
            if let Some(owner) = &endpoint.owner
                && !owner.rect.is_finite()
            {
                return Err(RouteError::NonFiniteOwner {
                    wire: request.wire.clone(),
                    end,
                });
            }
        }
        Ok(self.route(request, obstacles, siblings))
    }

    /// Crossing bumps for `points` (stored order) against the final geometry of the
    /// other wires. Empty unless bumps are enabled.
    pub fn resolve_crossings(
        &self,
        wire: &WireId,
        points: &[Point],
        siblings: &dyn SiblingWireProvider,
    ) -> Vec<Bump> {
        match self.config.crossings {
            CrossingMode::Off => Vec::new(),
            CrossingMode::Bumps => {
                BumpResolver::new(self.config.bump_size).resolve(wire, points, siblings)
            }
        }
    }
}

/// Joins the pin points to the track and drops redundant waypoints. The approach points
/// are kept so the stubs stay perpendicular to their edges.
fn assemble(start: Point, track: &[Point], end: Point) -> Vec<Point> {
    let mut points = Vec::with_capacity(track.len() + 2);
    points.push(start);
    points.extend_from_slice(track);
    points.push(end);
    let last = points.len() - 1;
    simplify_path(&points, &[1, last - 1])
}

/// Routes a single wire with explicit clearances and returns its waypoints in the
/// caller's start-to-end order.
pub fn compute_path(
    start: &Endpoint,
    end: &Endpoint,
    obstacles: Option<&dyn ObstacleProvider>,
    siblings: Option<&dyn SiblingWireProvider>,
    clearance: f64,
    approach_clearance: f64,
    lane_spacing: f64,
) -> Path {
    let router = Router::new(RouterConfig {
        clearance,
        approach_clearance,
        lane_spacing,
        ..RouterConfig::default()
    });
    let request = RouteRequest::new(WireId::default(), start.clone(), end.clone());
    router.route(&request, obstacles, siblings).polyline()
}
