use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use boardkit_core::{Aperture, NetList, Point};

use crate::error::DrcError;

/// Stackup index for each layer code. Supplied by the caller because
/// stackup order is board-specific.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMap {
    layers: BTreeMap<String, usize>,
}

impl Default for LayerMap {
    fn default() -> Self {
        Self::four_layer()
    }
}

impl LayerMap {
    pub fn new() -> Self {
        Self {
            layers: BTreeMap::new(),
        }
    }

    /// Four-layer stackup, bottom to top. Solder-mask openings (`GBS`, `GTS`)
    /// share the index of the copper they expose.
    pub fn four_layer() -> Self {
        Self::new()
            .with("GBS", 0)
            .with("GBL", 0)
            .with("G2", 1)
            .with("G1", 2)
            .with("GTL", 3)
            .with("GTS", 3)
    }

    pub fn with(mut self, code: &str, index: usize) -> Self {
        self.insert(code, index);
        self
    }

    pub fn insert(&mut self, code: &str, index: usize) {
        self.layers.insert(code.to_string(), index);
    }

    pub fn index(&self, code: &str) -> Option<usize> {
        self.layers.get(code).copied()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.values().max().map_or(0, |m| m + 1)
    }
}

/// One copper location handed to the checker.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DrcPoint {
    pub coordinate: Point,
    pub layer: usize,
    /// True (canonical) net name.
    pub net: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aperture: Option<Aperture>,
}

impl DrcPoint {
    pub fn new(coordinate: Point, layer: usize, net: &str) -> Self {
        Self {
            coordinate,
            layer,
            net: net.to_string(),
            aperture: None,
        }
    }

    pub fn from_mm(x: f64, y: f64, layer: usize, net: &str) -> Self {
        Self::new(Point::from_mm(x, y), layer, net)
    }

    pub fn with_aperture(mut self, aperture: Aperture) -> Self {
        self.aperture = Some(aperture);
        self
    }
}

impl From<(Point, usize, String)> for DrcPoint {
    fn from((coordinate, layer, net): (Point, usize, String)) -> Self {
        Self {
            coordinate,
            layer,
            net,
            aperture: None,
        }
    }
}

/// Flatten a netlist into layer-indexed points labelled with true net names.
pub fn flatten(netlist: &NetList, layers: &LayerMap) -> Result<Vec<DrcPoint>, DrcError> {
    let mut points = Vec::with_capacity(netlist.point_count());
    for net in netlist.iter_physical() {
        let true_name = netlist.get_true_net_name(net.name());
        for point in net.points() {
            let layer = layers
                .index(&point.layer)
                .ok_or_else(|| DrcError::UnmappedLayer {
                    layer: point.layer.clone(),
                    net: net.name().to_string(),
                })?;
            points.push(DrcPoint {
                coordinate: point.coordinate,
                layer,
                net: true_name.clone(),
                aperture: point.aperture,
            });
        }
    }
    log::debug!("flattened {} nets into {} DRC points", netlist.len(), points.len());
    Ok(points)
}
