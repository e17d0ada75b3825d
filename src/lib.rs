#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod parser;
pub mod render;
pub mod route_dump;
pub mod routing;
pub mod scene;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, RenderConfig, RouterConfig};
pub use dispatch::{RouteDispatcher, RouteInbox, RouteOutcome};
pub use error::{DispatchError, ParseError, RouteError, SceneError};
pub use geometry::{Edge, Point, Rect};
pub use parser::parse_scene;
pub use routing::{
    ComponentId, CrossingMode, Endpoint, HasEdgeAndRect, ObstacleProvider, PinId, Route, RouteRequest, Router,
    SiblingWireProvider, WireId, compute_path,
};
pub use scene::Scene;
