use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Which kind of definition produced a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    Primitive,
    Subcircuit,
}

/// A component placed on the board. Created by instantiation and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Hierarchical instance path, e.g. `border.seg2.R1`.
    pub name: String,
    /// Layer code the part is placed on, e.g. `Ctop`.
    pub layer: String,
    /// Global coordinate of the part origin.
    pub coordinate: Point,
    /// Global rotation in radians.
    pub rotation: f64,
    pub kind: PartKind,
}

impl Part {
    pub fn new(name: String, layer: &str, coordinate: Point, rotation: f64, kind: PartKind) -> Self {
        Self {
            name,
            layer: layer.to_string(),
            coordinate,
            rotation,
            kind,
        }
    }

    pub fn rotation_degrees(&self) -> f64 {
        self.rotation.to_degrees()
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = self.coordinate.to_mm();
        write!(
            f,
            "{} on {} at ({:.3}, {:.3}) mm, {:.1}°",
            self.name,
            self.layer,
            x,
            y,
            self.rotation_degrees()
        )
    }
}
