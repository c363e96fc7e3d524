use serde::{Deserialize, Serialize};

use crate::units::Length;

/// A 2D point in board coordinates (internal units, serialized as millimetres).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: Length,
    pub y: Length,
}

impl Point {
    pub fn new(x: Length, y: Length) -> Self {
        Self { x, y }
    }

    pub fn from_mm(x: f64, y: f64) -> Self {
        Self::new(Length::from_mm(x), Length::from_mm(y))
    }

    pub fn origin() -> Self {
        Self::default()
    }

    pub fn to_mm(&self) -> (f64, f64) {
        (self.x.to_mm(), self.y.to_mm())
    }

    /// Euclidean distance in millimetres.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = (self.x - other.x).to_mm();
        let dy = (self.y - other.y).to_mm();
        dx.hypot(dy)
    }

    pub fn translate(&self, dx: Length, dy: Length) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(Self::new(first, first), |bb, p| bb.expand_to(p)))
    }

    fn expand_to(&self, p: &Point) -> Self {
        Self {
            min: Point::new(self.min.x.min(p.x), self.min.y.min(p.y)),
            max: Point::new(self.max.x.max(p.x), self.max.y.max(p.y)),
        }
    }

    pub fn width(&self) -> Length {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> Length {
        self.max.y - self.min.y
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn union(&self, other: &BBox) -> Self {
        self.expand_to(&other.min).expand_to(&other.max)
    }
}

/// A simple polygon defined by its vertices (implicitly closed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<Point>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point>) -> Self {
        Self { vertices }
    }

    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.vertices)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Even-odd point containment test.
    pub fn contains_point(&self, p: &Point) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let (px, py) = (p.x.as_f64(), p.y.as_f64());
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = (self.vertices[i].x.as_f64(), self.vertices[i].y.as_f64());
            let (xj, yj) = (self.vertices[j].x.as_f64(), self.vertices[j].y.as_f64());
            if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// Copper accumulated on the board, tagged with the net it was drawn for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CopperShape {
    Trace {
        layer: String,
        net: String,
        from: Point,
        to: Point,
        width: Length,
    },
    Pour {
        layer: String,
        net: String,
        outline: Polygon,
    },
}

impl CopperShape {
    pub fn layer(&self) -> &str {
        match self {
            CopperShape::Trace { layer, .. } | CopperShape::Pour { layer, .. } => layer,
        }
    }

    pub fn net(&self) -> &str {
        match self {
            CopperShape::Trace { net, .. } | CopperShape::Pour { net, .. } => net,
        }
    }

    pub fn bbox(&self) -> Option<BBox> {
        match self {
            CopperShape::Trace { from, to, width, .. } => {
                let half = Length::from_units(width.units() / 2);
                let bb = BBox::from_points([from, to])?;
                Some(BBox::new(
                    bb.min.translate(-half, -half),
                    bb.max.translate(half, half),
                ))
            }
            CopperShape::Pour { outline, .. } => outline.bbox(),
        }
    }
}
