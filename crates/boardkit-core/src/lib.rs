//! # Boardkit Core
//!
//! Hierarchical board composition: fixed-precision units, linear and
//! circular placement transforms, a data-driven part library of primitives
//! and subcircuits, the [`CircuitBoard`] canvas they are instantiated onto,
//! and the [`NetList`] with its alias canonicalization and composite check.
//!
//! Physical design rule checking lives in `boardkit-drc`.

pub mod board;
pub mod composite;
pub mod error;
pub mod geometry;
pub mod library;
pub mod net;
pub mod part;
pub mod transform;
pub mod units;

pub use board::{BoardState, CircuitBoard, PourRegion};
pub use composite::{check_composite, CompositeReport, CompositeViolation};
pub use error::{AliasCycleError, ConfigurationError, Error, Result};
pub use geometry::{BBox, CopperShape, Point, Polygon};
pub use library::{Definition, Library, Parameters, Primitive, Subcircuit, SubcircuitChild};
pub use net::{Aperture, Net, NetList, NetPoint, PointMode};
pub use part::{Part, PartKind};
pub use transform::{CircularTransform, LinearTransform, Placement, Transform, TransformSpec};
pub use units::{from_mm, to_mm, Length};
