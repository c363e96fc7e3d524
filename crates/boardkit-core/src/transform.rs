//! Placement transforms.
//!
//! A [`Transform`] maps a placement in a definition's local frame to a
//! placement in its parent's frame. Two kinds exist:
//!
//! - [`LinearTransform`]: a rigid motion (rotation then translation). The
//!   identity is used at the root of a composition.
//! - [`CircularTransform`]: bends the local x axis onto a circle. Local x is
//!   arc length, local y is a radial offset, so a strip laid out along x wraps
//!   around the centre.
//!
//! Transforms compose: `outer.compose(&inner).apply(p)` equals
//! `outer.apply(inner.apply(p))`. Composition works on [`Placement`]s in
//! floating-point internal units and only rounds to [`Length`] when the board
//! emits geometry.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::geometry::Point;
use crate::units::Length;

/// A position (internal units) plus rotation (radians, counter-clockwise).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

impl Placement {
    pub fn new(x: f64, y: f64, rotation: f64) -> Self {
        Self { x, y, rotation }
    }

    pub fn at(point: Point, rotation: f64) -> Self {
        Self::new(point.x.as_f64(), point.y.as_f64(), rotation)
    }

    /// Round the position to the internal grid.
    pub fn point(&self) -> Point {
        Point::new(Length::from_units_f64(self.x), Length::from_units_f64(self.y))
    }
}

/// Rigid motion: rotate by `rotation` about the local origin, then move the
/// origin to `(origin_x, origin_y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub rotation: f64,
}

impl Default for LinearTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl LinearTransform {
    pub fn identity() -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            rotation: 0.0,
        }
    }

    pub fn new(origin: Point, rotation: f64) -> Self {
        Self {
            origin_x: origin.x.as_f64(),
            origin_y: origin.y.as_f64(),
            rotation,
        }
    }

    pub fn apply(&self, local: Placement) -> Placement {
        let (sin, cos) = self.rotation.sin_cos();
        Placement::new(
            self.origin_x + local.x * cos - local.y * sin,
            self.origin_y + local.x * sin + local.y * cos,
            self.rotation + local.rotation,
        )
    }

    /// The single rigid motion equivalent to applying `inner`, then `self`.
    pub fn then_apply(&self, inner: &LinearTransform) -> LinearTransform {
        let origin = self.apply(Placement::new(inner.origin_x, inner.origin_y, 0.0));
        LinearTransform {
            origin_x: origin.x,
            origin_y: origin.y,
            rotation: self.rotation + inner.rotation,
        }
    }

    fn is_identity(&self) -> bool {
        self.origin_x == 0.0 && self.origin_y == 0.0 && self.rotation == 0.0
    }
}

/// Wraps the local frame around a circle of `radius` centred on the centre
/// point, starting at base `angle`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularTransform {
    center_x: f64,
    center_y: f64,
    radius: f64,
    angle: f64,
}

impl CircularTransform {
    pub fn new(center: Point, radius: Length, angle: f64) -> Result<Self, ConfigurationError> {
        if radius.is_negative() {
            return Err(ConfigurationError::InvalidRadius(radius.to_mm()));
        }
        if !angle.is_finite() {
            return Err(ConfigurationError::NonFinite("angle"));
        }
        Ok(Self {
            center_x: center.x.as_f64(),
            center_y: center.y.as_f64(),
            radius: radius.as_f64(),
            angle,
        })
    }

    pub fn center(&self) -> Point {
        Placement::new(self.center_x, self.center_y, 0.0).point()
    }

    pub fn radius(&self) -> Length {
        Length::from_units_f64(self.radius)
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Local x becomes the arc-offset angle `x / radius`, local y pushes the
    /// placement radially outward. A zero radius collapses every placement
    /// onto the centre with the base angle as its rotation.
    pub fn apply(&self, local: Placement) -> Placement {
        if self.radius == 0.0 {
            return Placement::new(self.center_x, self.center_y, self.angle);
        }
        let theta = self.angle + local.x / self.radius;
        let rho = self.radius + local.y;
        let (sin, cos) = theta.sin_cos();
        Placement::new(
            self.center_x + rho * cos,
            self.center_y + rho * sin,
            theta + local.rotation,
        )
    }
}

/// Any placement mapping, possibly a composition of several.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Linear(LinearTransform),
    Circular(CircularTransform),
    /// Stages listed outermost first; applied from the last to the first.
    Chain(Vec<Transform>),
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Transform::Linear(LinearTransform::identity())
    }

    pub fn linear(origin: Point, rotation: f64) -> Self {
        Transform::Linear(LinearTransform::new(origin, rotation))
    }

    /// The rigid motion that puts a definition's local origin at `at`.
    pub fn place(at: Placement) -> Self {
        Transform::Linear(LinearTransform {
            origin_x: at.x,
            origin_y: at.y,
            rotation: at.rotation,
        })
    }

    pub fn circular(center: Point, radius: Length, angle: f64) -> Result<Self, ConfigurationError> {
        CircularTransform::new(center, radius, angle).map(Transform::Circular)
    }

    pub fn apply(&self, local: Placement) -> Placement {
        match self {
            Transform::Linear(t) => t.apply(local),
            Transform::Circular(t) => t.apply(local),
            Transform::Chain(stages) => stages.iter().rev().fold(local, |p, t| t.apply(p)),
        }
    }

    pub fn apply_point(&self, point: Point, rotation: f64) -> (Point, f64) {
        let placed = self.apply(Placement::at(point, rotation));
        (placed.point(), placed.rotation)
    }

    /// `self ∘ inner`: the transform that applies `inner` first.
    pub fn compose(&self, inner: &Transform) -> Transform {
        let mut stages = self.stages();
        for stage in inner.stages() {
            if let (Some(Transform::Linear(outer)), Transform::Linear(next)) = (stages.last_mut(), &stage) {
                *outer = outer.then_apply(next);
                continue;
            }
            stages.push(stage);
        }
        stages.retain(|t| !matches!(t, Transform::Linear(l) if l.is_identity()));
        match stages.len() {
            0 => Transform::identity(),
            1 => stages.remove(0),
            _ => Transform::Chain(stages),
        }
    }

    fn stages(&self) -> Vec<Transform> {
        match self {
            Transform::Chain(stages) => stages.clone(),
            other => vec![other.clone()],
        }
    }
}

/// Serializable transform description in millimetres and radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformSpec {
    Linear {
        #[serde(default)]
        origin: Point,
        #[serde(default)]
        rotation: f64,
    },
    Circular {
        #[serde(default)]
        center: Point,
        radius: Length,
        #[serde(default)]
        angle: f64,
    },
}

impl Default for TransformSpec {
    fn default() -> Self {
        TransformSpec::Linear {
            origin: Point::origin(),
            rotation: 0.0,
        }
    }
}

impl TransformSpec {
    pub fn build(&self) -> Result<Transform, ConfigurationError> {
        match self {
            TransformSpec::Linear { origin, rotation } => {
                if !rotation.is_finite() {
                    return Err(ConfigurationError::NonFinite("rotation"));
                }
                Ok(Transform::linear(*origin, *rotation))
            }
            TransformSpec::Circular {
                center,
                radius,
                angle,
            } => Transform::circular(*center, *radius, *angle),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_close(a: Placement, b: Placement) {
        assert!(
            (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS && (a.rotation - b.rotation).abs() < 1e-12,
            "{:?} != {:?}",
            a,
            b
        );
    }

    fn sample_transforms() -> Vec<Transform> {
        vec![
            Transform::identity(),
            Transform::linear(Point::from_mm(12.5, -3.0), 0.7),
            Transform::linear(Point::from_mm(-40.0, 8.25), -FRAC_PI_2),
            Transform::circular(Point::origin(), Length::from_mm(159.15), 0.0).unwrap(),
            Transform::circular(Point::from_mm(5.0, 5.0), Length::from_mm(20.0), 1.1).unwrap(),
            Transform::circular(Point::from_mm(1.0, 2.0), Length::ZERO, 0.3).unwrap(),
        ]
    }

    #[test]
    fn test_linear_identity() {
        let p = Placement::at(Point::from_mm(3.0, 4.0), 0.25);
        assert_eq!(Transform::identity().apply(p), p);
    }

    #[test]
    fn test_linear_translate_and_rotate() {
        let t = Transform::linear(Point::from_mm(10.0, 20.0), FRAC_PI_2);
        let (p, r) = t.apply_point(Point::from_mm(5.0, 0.0), 0.0);
        assert_eq!(p, Point::from_mm(10.0, 25.0));
        assert!((r - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_composition_law_all_kind_mixes() {
        let locals = [
            Placement::at(Point::from_mm(0.0, 0.0), 0.0),
            Placement::at(Point::from_mm(500.0, 0.85), FRAC_PI_2),
            Placement::at(Point::from_mm(-7.5, 2.0), -1.3),
        ];
        for t1 in sample_transforms() {
            for t2 in sample_transforms() {
                let composed = t1.compose(&t2);
                for &local in &locals {
                    assert_close(composed.apply(local), t1.apply(t2.apply(local)));
                }
            }
        }
    }

    #[test]
    fn test_composition_is_associative() {
        let ts = sample_transforms();
        let local = Placement::at(Point::from_mm(3.0, -1.0), 0.4);
        for a in &ts {
            for b in &ts {
                for c in &ts {
                    let left = a.compose(b).compose(c);
                    let right = a.compose(&b.compose(c));
                    assert_close(left.apply(local), right.apply(local));
                }
            }
        }
    }

    #[test]
    fn test_linear_composition_collapses() {
        let a = Transform::linear(Point::from_mm(1.0, 0.0), 0.5);
        let b = Transform::linear(Point::from_mm(0.0, 2.0), 0.25);
        assert!(matches!(a.compose(&b), Transform::Linear(_)));
        let c = Transform::circular(Point::origin(), Length::from_mm(10.0), 0.0).unwrap();
        assert!(matches!(c.compose(&a), Transform::Chain(ref s) if s.len() == 2));
        assert_eq!(Transform::identity().compose(&c), c);
    }

    #[test]
    fn test_circular_even_spacing() {
        let radius = Length::from_mm(42.0);
        let circumference = TAU * radius.to_mm();
        let t = Transform::circular(Point::from_mm(3.0, -2.0), radius, 0.2).unwrap();
        let n = 12;
        let placed: Vec<Placement> = (0..n)
            .map(|i| {
                let x = circumference * i as f64 / n as f64;
                t.apply(Placement::at(Point::from_mm(x, 0.0), 0.0))
            })
            .collect();
        let center = Placement::at(Point::from_mm(3.0, -2.0), 0.0);
        for (i, p) in placed.iter().enumerate() {
            let dist = (p.x - center.x).hypot(p.y - center.y);
            assert!((dist - radius.as_f64()).abs() < 1.0, "point {} at {}", i, dist);
            if i > 0 {
                let spacing = p.rotation - placed[i - 1].rotation;
                assert!((spacing - TAU / n as f64).abs() < 1e-7);
            }
        }
    }

    #[test]
    fn test_circular_rotation_difference_matches_angle_difference() {
        let radius = Length::from_mm(10.0);
        let a = Transform::circular(Point::origin(), radius, 0.3).unwrap();
        let b = Transform::circular(Point::origin(), radius, 1.9).unwrap();
        let local = Placement::at(Point::from_mm(4.0, 1.0), 0.1);
        assert!((b.apply(local).rotation - a.apply(local).rotation - 1.6).abs() < 1e-12);
    }

    #[test]
    fn test_circular_half_circumference_lands_opposite() {
        let t = Transform::circular(Point::origin(), Length::from_mm(159.15), 0.0).unwrap();
        let half = PI * 159.15;
        let (p, r) = t.apply_point(Point::from_mm(half, 0.0), 0.0);
        assert!((p.x.to_mm() + 159.15).abs() < 2e-6);
        assert!(p.y.to_mm().abs() < 2e-6);
        assert!((r - PI).abs() < 1e-8);
    }

    #[test]
    fn test_zero_radius_degenerates_to_center() {
        let t = Transform::circular(Point::from_mm(1.0, 2.0), Length::ZERO, 0.75).unwrap();
        for (x, rotation) in [(0.0, 0.0), (10.0, 1.0), (-3.0, -2.5)] {
            let (p, r) = t.apply_point(Point::from_mm(x, 5.0), rotation);
            assert_eq!(p, Point::from_mm(1.0, 2.0));
            assert_eq!(r, 0.75);
        }
    }

    #[test]
    fn test_negative_radius_rejected() {
        let err = Transform::circular(Point::origin(), Length::from_mm(-1.0), 0.0).unwrap_err();
        assert_eq!(err, ConfigurationError::InvalidRadius(-1.0));
        let err = Transform::circular(Point::origin(), Length::from_mm(1.0), f64::NAN).unwrap_err();
        assert_eq!(err, ConfigurationError::NonFinite("angle"));
    }

    #[test]
    fn test_transform_spec_json() {
        let spec: TransformSpec =
            serde_json::from_str(r#"{"circular": {"center": {"x": 0.0, "y": 0.0}, "radius": 159.15}}"#).unwrap();
        match spec.build().unwrap() {
            Transform::Circular(c) => {
                assert_eq!(c.radius(), Length::from_mm(159.15));
                assert_eq!(c.angle(), 0.0);
            }
            other => panic!("unexpected transform {:?}", other),
        }
        assert_eq!(TransformSpec::default().build().unwrap(), Transform::identity());
    }
}
