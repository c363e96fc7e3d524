//! # Boardkit DRC
//!
//! Physical design rule checking over a composed board's netlist.
//! Points are flattened to stackup indices and labelled with their true
//! net names; the checker then reports clearance and annular-ring
//! violations in a deterministic order.

pub mod checker;
pub mod error;
pub mod layers;
pub mod violation;

use serde::{Deserialize, Serialize};

use boardkit_core::{Length, NetList};

pub use checker::{build_netlist, Checker};
pub use error::DrcError;
pub use layers::{flatten, DrcPoint, LayerMap};
pub use violation::{DrcViolation, Severity, ViolationType};

/// Rule values for the physical check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrcRules {
    pub clearance: Length,
    pub annular_ring: Length,
}

impl Default for DrcRules {
    fn default() -> Self {
        Self {
            clearance: Length::from_mm(0.13),
            annular_ring: Length::from_mm(0.13),
        }
    }
}

/// Flatten `netlist` through `layers` and run every rule.
pub fn check_netlist(netlist: &NetList, layers: &LayerMap, rules: &DrcRules) -> Result<Vec<DrcViolation>, DrcError> {
    let points = flatten(netlist, layers)?;
    let checker = build_netlist(points, rules.clearance, rules.annular_ring)?;
    Ok(checker.drc())
}
