use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use boardkit_core::Point;

/// Type of DRC violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    /// Copper of two different nets closer than the clearance rule.
    Clearance,
    /// Copper ring around a drilled hole thinner than the annular-ring rule.
    AnnularRing,
}

/// Severity level of a DRC violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single DRC violation with location and description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrcViolation {
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub rule_name: String,
    pub message: String,
    /// Stackup index the violation was found on.
    pub layer: usize,
    /// Bounding box of the violation region in mm: [min_x, min_y, max_x, max_y]
    pub bbox: [f64; 4],
    /// The points involved, in canonical order.
    pub points: Vec<Point>,
    /// True net names of `points`, index for index.
    pub nets: Vec<String>,
    /// Measured distance or ring width (mm).
    pub measured: f64,
    /// Rule value it fell short of (mm).
    pub required: f64,
}

impl DrcViolation {
    pub fn clearance(layer: usize, a: (Point, &str), b: (Point, &str), measured: f64, required: f64) -> Self {
        let ((pa, na), (pb, nb)) = if (a.0, a.1) <= (b.0, b.1) { (a, b) } else { (b, a) };
        Self {
            violation_type: ViolationType::Clearance,
            severity: Severity::Error,
            rule_name: "clearance".into(),
            message: format!(
                "clearance {:.4} mm < {:.4} mm between '{}' and '{}'",
                measured, required, na, nb
            ),
            layer,
            bbox: bbox_of(&[pa, pb]),
            points: vec![pa, pb],
            nets: vec![na.to_string(), nb.to_string()],
            measured,
            required,
        }
    }

    pub fn annular_ring(layer: usize, at: Point, net: &str, measured: f64, required: f64) -> Self {
        Self {
            violation_type: ViolationType::AnnularRing,
            severity: Severity::Error,
            rule_name: "annular_ring".into(),
            message: format!(
                "annular ring {:.4} mm < {:.4} mm on '{}'",
                measured, required, net
            ),
            layer,
            bbox: bbox_of(&[at]),
            points: vec![at],
            nets: vec![net.to_string()],
            measured,
            required,
        }
    }

    /// Total order used to normalize reporting.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        (self.violation_type, self.layer, &self.points, &self.nets).cmp(&(
            other.violation_type,
            other.layer,
            &other.points,
            &other.nets,
        ))
    }

    pub fn is_same_finding(&self, other: &Self) -> bool {
        self.canonical_cmp(other) == Ordering::Equal
    }
}

impl fmt::Display for DrcViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locations: Vec<String> = self
            .points
            .iter()
            .map(|p| {
                let (x, y) = p.to_mm();
                format!("({:.3}, {:.3})", x, y)
            })
            .collect();
        write!(
            f,
            "[{:?}] layer {} at {}: {}",
            self.severity,
            self.layer,
            locations.join(" / "),
            self.message
        )
    }
}

fn bbox_of(points: &[Point]) -> [f64; 4] {
    let mut bbox = [f64::MAX, f64::MAX, f64::MIN, f64::MIN];
    for p in points {
        let (x, y) = p.to_mm();
        bbox[0] = bbox[0].min(x);
        bbox[1] = bbox[1].min(y);
        bbox[2] = bbox[2].max(x);
        bbox[3] = bbox[3].max(y);
    }
    bbox
}
