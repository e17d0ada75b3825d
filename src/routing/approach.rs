use crate::geometry::Point;

use super::Endpoint;

/// Point `clearance` units out from the pin along its edge normal. Free endpoints have no
/// stub and return their own position.
pub fn approach_point(endpoint: &Endpoint, clearance: f64) -> Point {
    match endpoint.edge {
        Some(edge) => {
            let (nx, ny) = edge.normal();
            endpoint.position.offset(nx * clearance, ny * clearance)
        }
        None => endpoint.position,
    }
}
