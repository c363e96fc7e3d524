//! Circuit-level consistency check over a [`NetList`].
//!
//! Runs after composition and before physical DRC. Every finding is
//! collected so one pass reports the complete defect list.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::net::NetList;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompositeViolation {
    /// A name was wired to, but nothing in its connected set has copper.
    UnknownNet { name: String, referenced_by: String },
    /// Two different true nets meet at the same point on the same layer.
    Short {
        layer: String,
        coordinate: Point,
        first: String,
        second: String,
    },
}

impl fmt::Display for CompositeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeViolation::UnknownNet {
                name,
                referenced_by,
            } => write!(f, "net '{}' (referenced by '{}') has no physical points", name, referenced_by),
            CompositeViolation::Short {
                layer,
                coordinate,
                first,
                second,
            } => {
                let (x, y) = coordinate.to_mm();
                write!(f, "short between '{}' and '{}' on {} at ({}, {})", first, second, layer, x, y)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeReport {
    pub violations: Vec<CompositeViolation>,
}

impl CompositeReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Turn a dirty report into [`Error::CompositeCheck`].
    pub fn into_result(self) -> Result<()> {
        if self.is_clean() {
            Ok(())
        } else {
            Err(Error::CompositeCheck(self.violations.len()))
        }
    }
}

pub fn check_composite(netlist: &NetList) -> CompositeReport {
    let mut violations = Vec::new();

    let physical: HashSet<String> = netlist
        .iter_physical()
        .map(|net| netlist.get_true_net_name(net.name()))
        .collect();
    let mut reported = HashSet::new();
    for (alias, target) in netlist.aliases() {
        let true_name = netlist.get_true_net_name(target);
        if !physical.contains(&true_name) && reported.insert(true_name) {
            violations.push(CompositeViolation::UnknownNet {
                name: target.clone(),
                referenced_by: alias.clone(),
            });
        }
    }

    // An alias source must be copper itself or a name other aliases join
    // into; anything else is a connection to a net that was never emitted.
    let targets: HashSet<&str> = netlist.aliases().iter().map(|(_, t)| t.as_str()).collect();
    let mut dangling = HashSet::new();
    for (alias, target) in netlist.aliases() {
        let floating = netlist.get_net(alias).is_none() && !targets.contains(alias.as_str());
        if floating && dangling.insert(alias.as_str()) {
            violations.push(CompositeViolation::UnknownNet {
                name: alias.clone(),
                referenced_by: target.clone(),
            });
        }
    }

    let mut occupants: BTreeMap<(&str, Point), BTreeSet<String>> = BTreeMap::new();
    for net in netlist.iter_physical() {
        let true_name = netlist.get_true_net_name(net.name());
        for point in net.points() {
            occupants
                .entry((point.layer.as_str(), point.coordinate))
                .or_default()
                .insert(true_name.clone());
        }
    }
    for ((layer, coordinate), nets) in occupants {
        let nets: Vec<String> = nets.into_iter().collect();
        for (i, first) in nets.iter().enumerate() {
            for second in &nets[i + 1..] {
                violations.push(CompositeViolation::Short {
                    layer: layer.to_string(),
                    coordinate,
                    first: first.clone(),
                    second: second.clone(),
                });
            }
        }
    }

    if violations.is_empty() {
        log::info!("circuit DRC passed ({} nets)", netlist.len());
    } else {
        log::warn!("circuit DRC found {} violation(s)", violations.len());
    }
    CompositeReport { violations }
}

impl NetList {
    pub fn check_composite(&self) -> CompositeReport {
        check_composite(self)
    }
}
