use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use rstar::primitives::GeomWithData;
use rstar::RTree;

use boardkit_core::{Length, Point};

use crate::error::DrcError;
use crate::layers::DrcPoint;
use crate::violation::DrcViolation;

/// R-tree entry: position in mm, tagged with the point's index on its layer.
type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Prepared, read-only DRC input. Build with [`build_netlist`].
#[derive(Debug, Clone)]
pub struct Checker {
    /// Deduplicated and sorted, so results do not depend on input order.
    points: Vec<DrcPoint>,
    clearance: Length,
    annular_ring: Length,
}

/// Collect labelled copper points together with the clearance and
/// annular-ring rules.
pub fn build_netlist<I>(points: I, clearance: Length, annular_ring: Length) -> Result<Checker, DrcError>
where
    I: IntoIterator,
    I::Item: Into<DrcPoint>,
{
    if clearance.is_negative() {
        return Err(DrcError::InvalidParameter {
            name: "clearance",
            value: clearance.to_mm(),
        });
    }
    if annular_ring.is_negative() {
        return Err(DrcError::InvalidParameter {
            name: "annular_ring",
            value: annular_ring.to_mm(),
        });
    }
    let unique: BTreeSet<DrcPoint> = points.into_iter().map(Into::into).collect();
    Ok(Checker {
        points: unique.into_iter().collect(),
        clearance,
        annular_ring,
    })
}

impl Checker {
    pub fn points(&self) -> &[DrcPoint] {
        &self.points
    }

    pub fn clearance(&self) -> Length {
        self.clearance
    }

    pub fn annular_ring(&self) -> Length {
        self.annular_ring
    }

    /// Run every rule. An empty result means the board passed.
    pub fn drc(&self) -> Vec<DrcViolation> {
        let mut by_layer: BTreeMap<usize, Vec<&DrcPoint>> = BTreeMap::new();
        for point in &self.points {
            by_layer.entry(point.layer).or_default().push(point);
        }

        let per_layer: Vec<Vec<DrcViolation>> = by_layer
            .par_iter()
            .map(|(&layer, points)| self.check_clearance(layer, points))
            .collect();
        let mut violations: Vec<DrcViolation> = per_layer.into_iter().flatten().collect();
        violations.extend(self.check_annular_rings());

        violations.sort_by(|a, b| a.canonical_cmp(b));
        violations.dedup_by(|a, b| a.is_same_finding(b));
        log::info!(
            "physical DRC checked {} points on {} layers: {} violation(s)",
            self.points.len(),
            by_layer.len(),
            violations.len()
        );
        violations
    }

    fn check_clearance(&self, layer: usize, points: &[&DrcPoint]) -> Vec<DrcViolation> {
        let mut violations = Vec::new();
        if self.clearance == Length::ZERO {
            return violations;
        }
        let limit = self.clearance.to_mm();
        let tree: RTree<IndexedPoint> = RTree::bulk_load(
            points
                .iter()
                .enumerate()
                .map(|(i, p)| IndexedPoint::new(mm(p.coordinate), i))
                .collect(),
        );

        for (i, p) in points.iter().enumerate() {
            for neighbour in tree.locate_within_distance(mm(p.coordinate), limit * limit) {
                let j = neighbour.data;
                if j <= i {
                    continue;
                }
                let q = points[j];
                if q.net == p.net {
                    continue;
                }
                let distance = p.coordinate.distance_to(&q.coordinate);
                if distance < limit {
                    violations.push(DrcViolation::clearance(
                        layer,
                        (p.coordinate, &p.net),
                        (q.coordinate, &q.net),
                        distance,
                        limit,
                    ));
                }
            }
        }
        violations
    }

    /// One finding per drilled location and net, judged by its thinnest ring.
    fn check_annular_rings(&self) -> Vec<DrcViolation> {
        let mut rings: BTreeMap<(Point, &str), (usize, Length)> = BTreeMap::new();
        for point in &self.points {
            let Some(aperture) = point.aperture else {
                continue;
            };
            let doubled = aperture.diameter - aperture.drill;
            rings
                .entry((point.coordinate, point.net.as_str()))
                .and_modify(|(layer, ring)| {
                    *layer = (*layer).min(point.layer);
                    *ring = (*ring).min(doubled);
                })
                .or_insert((point.layer, doubled));
        }

        let required = self.annular_ring * 2;
        rings
            .into_iter()
            .filter(|(_, (_, doubled))| *doubled < required)
            .map(|((at, net), (layer, doubled))| {
                DrcViolation::annular_ring(layer, at, net, doubled.to_mm() / 2.0, self.annular_ring.to_mm())
            })
            .collect()
    }
}

fn mm(p: Point) -> [f64; 2] {
    let (x, y) = p.to_mm();
    [x, y]
}

#[cfg(test)]
mod tests {
    use boardkit_core::Aperture;

    use super::*;
    use crate::violation::ViolationType;

    fn mm_len(v: f64) -> Length {
        Length::from_mm(v)
    }

    #[test]
    fn test_clearance_threshold() {
        let close = vec![
            DrcPoint::from_mm(0.0, 0.0, 3, "GND"),
            DrcPoint::from_mm(0.10, 0.0, 3, "VCC"),
        ];
        let violations = build_netlist(close, mm_len(0.13), mm_len(0.13)).unwrap().drc();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].violation_type, ViolationType::Clearance);
        assert!((violations[0].measured - 0.10).abs() < 1e-9);

        let apart = vec![
            DrcPoint::from_mm(0.0, 0.0, 3, "GND"),
            DrcPoint::from_mm(0.15, 0.0, 3, "VCC"),
        ];
        assert!(build_netlist(apart, mm_len(0.13), mm_len(0.13)).unwrap().drc().is_empty());
    }

    #[test]
    fn test_pair_at_exact_clearance_passes() {
        let touching = vec![
            DrcPoint::from_mm(0.0, 0.0, 3, "GND"),
            DrcPoint::from_mm(0.13, 0.0, 3, "VCC"),
        ];
        assert!(build_netlist(touching, mm_len(0.13), mm_len(0.13)).unwrap().drc().is_empty());

        let inside = vec![
            DrcPoint::from_mm(0.0, 0.0, 3, "GND"),
            DrcPoint::from_mm(0.129999, 0.0, 3, "VCC"),
        ];
        assert_eq!(build_netlist(inside, mm_len(0.13), mm_len(0.13)).unwrap().drc().len(), 1);
    }

    #[test]
    fn test_same_net_and_other_layers_ignored() {
        let points = vec![
            DrcPoint::from_mm(0.0, 0.0, 3, "GND"),
            DrcPoint::from_mm(0.05, 0.0, 3, "GND"),
            DrcPoint::from_mm(0.05, 0.0, 2, "VCC"),
        ];
        assert!(build_netlist(points, mm_len(0.13), mm_len(0.13)).unwrap().drc().is_empty());
    }

    #[test]
    fn test_annular_ring() {
        let thin = Aperture::new(mm_len(0.5), mm_len(0.3));
        let fat = Aperture::new(mm_len(0.6), mm_len(0.3));
        let points = vec![
            DrcPoint::from_mm(0.0, 0.0, 0, "GND").with_aperture(thin),
            DrcPoint::from_mm(0.0, 0.0, 3, "GND").with_aperture(thin),
            DrcPoint::from_mm(5.0, 0.0, 3, "VCC").with_aperture(fat),
        ];
        let violations = build_netlist(points, mm_len(0.13), mm_len(0.13)).unwrap().drc();
        assert_eq!(violations.len(), 1);
        let v = &violations[0];
        assert_eq!(v.violation_type, ViolationType::AnnularRing);
        assert_eq!(v.layer, 0);
        assert!((v.measured - 0.1).abs() < 1e-9);
        assert_eq!(v.nets, ["GND"]);
    }

    #[test]
    fn test_order_independent() {
        let mut points = vec![
            DrcPoint::from_mm(0.0, 0.0, 3, "A"),
            DrcPoint::from_mm(0.05, 0.0, 3, "B"),
            DrcPoint::from_mm(0.0, 0.08, 3, "C"),
            DrcPoint::from_mm(0.0, 0.0, 1, "A"),
            DrcPoint::from_mm(0.1, 0.0, 1, "B"),
            DrcPoint::from_mm(0.05, 0.0, 3, "B"),
        ];
        let forward = build_netlist(points.clone(), mm_len(0.13), mm_len(0.13)).unwrap().drc();
        points.reverse();
        let backward = build_netlist(points.clone(), mm_len(0.13), mm_len(0.13)).unwrap().drc();
        points.rotate_left(2);
        let rotated = build_netlist(points, mm_len(0.13), mm_len(0.13)).unwrap().drc();
        assert_eq!(forward, backward);
        assert_eq!(forward, rotated);
        // A-B, A-C, B-C on layer 3 and A-B on layer 1.
        assert_eq!(forward.len(), 4);
    }

    #[test]
    fn test_invalid_parameters() {
        let err = build_netlist(Vec::<DrcPoint>::new(), mm_len(-0.1), mm_len(0.13)).unwrap_err();
        assert_eq!(
            err,
            DrcError::InvalidParameter {
                name: "clearance",
                value: -0.1
            }
        );
        assert!(build_netlist(Vec::<DrcPoint>::new(), mm_len(0.1), mm_len(-1.0)).is_err());
    }
}
