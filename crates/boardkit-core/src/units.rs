//! Fixed-precision board lengths.
//!
//! Every coordinate inside the core is an integer count of nanometres.
//! Millimetres only appear at the public boundary: [`Length::from_mm`] on the
//! way in, [`Length::to_mm`] on the way out, and serde (which always writes
//! millimetres so project files stay human-readable).

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Internal units per millimetre (1 nm resolution).
pub const UNITS_PER_MM: f64 = 1_000_000.0;

/// A length in internal units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Length(i64);

impl Length {
    pub const ZERO: Length = Length(0);

    /// Largest magnitude accepted from millimetre input (about 1126 km).
    pub const MAX_UNITS: i64 = 1 << 50;

    pub const fn from_units(units: i64) -> Self {
        Self(units)
    }

    pub const fn units(self) -> i64 {
        self.0
    }

    /// Convert millimetres to the nearest internal unit.
    ///
    /// `Length::from_mm(x.to_mm()) == x` holds for every `|x| <= 2^50` units,
    /// which covers boards up to roughly a kilometre across.
    pub fn from_mm(mm: f64) -> Self {
        debug_assert!(
            Self::try_from_mm(mm).is_some(),
            "{} mm is not a representable length",
            mm
        );
        Self((mm * UNITS_PER_MM).round() as i64)
    }

    /// Checked [`from_mm`](Self::from_mm): `None` for non-finite input or a
    /// magnitude beyond [`MAX_UNITS`](Self::MAX_UNITS).
    pub fn try_from_mm(mm: f64) -> Option<Self> {
        let units = (mm * UNITS_PER_MM).round();
        if units.is_finite() && units.abs() <= Self::MAX_UNITS as f64 {
            Some(Self(units as i64))
        } else {
            None
        }
    }

    pub fn to_mm(self) -> f64 {
        self.0 as f64 / UNITS_PER_MM
    }

    /// Round a floating-point internal-unit value (as produced by the
    /// transform algebra) to the nearest unit.
    pub fn from_units_f64(units: f64) -> Self {
        Self(units.round() as i64)
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

/// Millimetres to internal units.
pub fn from_mm(mm: f64) -> Length {
    Length::from_mm(mm)
}

/// Internal units to millimetres.
pub fn to_mm(length: Length) -> f64 {
    length.to_mm()
}

impl Add for Length {
    type Output = Length;

    fn add(self, rhs: Length) -> Length {
        Length(self.0 + rhs.0)
    }
}

impl AddAssign for Length {
    fn add_assign(&mut self, rhs: Length) {
        self.0 += rhs.0;
    }
}

impl Sub for Length {
    type Output = Length;

    fn sub(self, rhs: Length) -> Length {
        Length(self.0 - rhs.0)
    }
}

impl SubAssign for Length {
    fn sub_assign(&mut self, rhs: Length) {
        self.0 -= rhs.0;
    }
}

impl Mul<i64> for Length {
    type Output = Length;

    fn mul(self, rhs: i64) -> Length {
        Length(self.0 * rhs)
    }
}

impl Neg for Length {
    type Output = Length;

    fn neg(self) -> Length {
        Length(-self.0)
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}mm", self.to_mm())
    }
}

impl Serialize for Length {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_mm())
    }
}

impl<'de> Deserialize<'de> for Length {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mm = f64::deserialize(deserializer)?;
        if !mm.is_finite() {
            return Err(serde::de::Error::custom("length must be a finite number of millimetres"));
        }
        Length::try_from_mm(mm).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "length {} mm is outside the board range of ±{} mm",
                mm,
                Length::from_units(Length::MAX_UNITS).to_mm()
            ))
        })
    }
}
