use thiserror::Error;

use crate::routing::{ComponentId, PinId, WireId};

#[derive(Debug, Error, PartialEq)]
pub enum RouteError {
    #[error("wire `{wire}`: {end} endpoint has a non-finite position ({x}, {y})")]
    NonFinitePoint {
        wire: WireId,
        end: &'static str,
        x: f64,
        y: f64,
    },
    #[error("wire `{wire}`: {end} endpoint has a non-finite owner rect")]
    NonFiniteOwner { wire: WireId, end: &'static str },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("component `{0}` already exists")]
    DuplicateComponent(ComponentId),
    #[error("pin `{0}` already exists")]
    DuplicatePin(PinId),
    #[error("wire `{0}` already exists")]
    DuplicateWire(WireId),
    #[error("unknown component `{0}`")]
    UnknownComponent(ComponentId),
    #[error("unknown pin `{0}`")]
    UnknownPin(PinId),
    #[error("unknown wire `{0}`")]
    UnknownWire(WireId),
    #[error("wire `{wire}` connects pin `{pin}` to itself")]
    SelfConnection { wire: WireId, pin: PinId },
    #[error("pin `{0}` sits on an edge but has no component")]
    DetachedEdgePin(PinId),
    #[error("component `{0}` has a non-finite or negative size")]
    InvalidRect(ComponentId),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid scene file: {0}")]
    Syntax(#[from] json5::Error),
    #[error("pin `{pin}`: {message}")]
    Pin { pin: String, message: String },
    #[error(transparent)]
    Scene(#[from] SceneError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to start routing workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("wire `{0}` was cancelled")]
    Cancelled(WireId),
}
