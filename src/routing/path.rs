use crate::geometry::Point;

use super::{Bump, Route};

/// Drawing instruction for a routed wire, in the caller's start-to-end order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo { ctrl: Point, to: Point },
}

impl Route {
    /// Polyline commands with a pair of quadratic arcs at every bump.
    pub fn commands(&self) -> Vec<PathCommand> {
        let n = self.points.len();
        let Some(first) = (if self.swapped { self.points.last() } else { self.points.first() }) else {
            return Vec::new();
        };
        let mut commands = vec![PathCommand::MoveTo(*first)];
        let order: Vec<usize> = if self.swapped {
            (0..n - 1).rev().collect()
        } else {
            (0..n - 1).collect()
        };
        for index in order {
            let (from, to) = if self.swapped {
                (self.points[index + 1], self.points[index])
            } else {
                (self.points[index], self.points[index + 1])
            };
            let mut hops: Vec<&Bump> = self.bumps.iter().filter(|b| b.segment == index).collect();
            hops.sort_by(|a, b| from.distance(a.at).total_cmp(&from.distance(b.at)));
            let length = from.distance(to);
            let mut cleared = 0.0;
            for bump in hops {
                let along = from.distance(bump.at);
                // Hops that would spill past a corner or into the previous hop are dropped.
                if along - bump.radius < cleared || along + bump.radius > length {
                    continue;
                }
                push_hop(&mut commands, from, to, bump);
                cleared = along + bump.radius;
            }
            commands.push(PathCommand::LineTo(to));
        }
        commands
    }

    /// SVG `d` attribute for [`Route::commands`].
    pub fn svg_path_data(&self) -> String {
        let mut d = String::new();
        for command in self.commands() {
            if !d.is_empty() {
                d.push(' ');
            }
            match command {
                PathCommand::MoveTo(p) => d.push_str(&format!("M {:.2} {:.2}", p.x, p.y)),
                PathCommand::LineTo(p) => d.push_str(&format!("L {:.2} {:.2}", p.x, p.y)),
                PathCommand::QuadTo { ctrl, to } => d.push_str(&format!(
                    "Q {:.2} {:.2} {:.2} {:.2}",
                    ctrl.x, ctrl.y, to.x, to.y
                )),
            }
        }
        d
    }
}

/// Horizontal runs hop upwards, vertical runs hop to the left.
fn push_hop(commands: &mut Vec<PathCommand>, from: Point, to: Point, bump: &Bump) {
    let length = from.distance(to);
    if length <= 0.0 {
        return;
    }
    let r = bump.radius;
    let (dx, dy) = ((to.x - from.x) / length, (to.y - from.y) / length);
    let (ux, uy) = if dy.abs() < dx.abs() { (0.0, -1.0) } else { (-1.0, 0.0) };
    let c = bump.at;
    let before = c.offset(-dx * r, -dy * r);
    let after = c.offset(dx * r, dy * r);
    commands.push(PathCommand::LineTo(before));
    commands.push(PathCommand::QuadTo {
        ctrl: before.offset(ux * r, uy * r),
        to: c.offset(ux * r, uy * r),
    });
    commands.push(PathCommand::QuadTo {
        ctrl: after.offset(ux * r, uy * r),
        to: after,
    });
}
