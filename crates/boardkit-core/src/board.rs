use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::composite::CompositeReport;
use crate::error::{ConfigurationError, Error, Result};
use crate::geometry::{BBox, CopperShape, Point, Polygon};
use crate::library::{Library, Parameters};
use crate::net::{Aperture, NetList, PointMode};
use crate::part::Part;
use crate::transform::{Placement, Transform};
use crate::units::Length;

/// Lifecycle of a board: instantiate, then pour, then read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardState {
    Composing,
    Poured,
    Finalized,
}

impl fmt::Display for BoardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoardState::Composing => "composing",
            BoardState::Poured => "poured",
            BoardState::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// A copper region waiting for [`CircuitBoard::add_poly_pours`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PourRegion {
    pub net: String,
    pub layer: String,
    pub outline: Polygon,
}

/// The composition canvas. Owns every placed part, the accumulated copper
/// and the netlist derived from them.
#[derive(Debug)]
pub struct CircuitBoard {
    mask_expansion: Length,
    state: BoardState,
    parts: Vec<Part>,
    copper: Vec<CopperShape>,
    pour_regions: Vec<PourRegion>,
    netlist: NetList,
    /// Instance names of the scopes currently being instantiated.
    scope: Vec<String>,
    /// Full paths of every instance created so far.
    instances: HashSet<String>,
    /// Subcircuit definitions currently being expanded.
    active: Vec<String>,
}

impl CircuitBoard {
    pub fn new(mask_expansion: Length) -> Self {
        Self {
            mask_expansion,
            state: BoardState::Composing,
            parts: Vec::new(),
            copper: Vec::new(),
            pour_regions: Vec::new(),
            netlist: NetList::new(),
            scope: Vec::new(),
            instances: HashSet::new(),
            active: Vec::new(),
        }
    }

    pub fn mask_expansion(&self) -> Length {
        self.mask_expansion
    }

    pub fn state(&self) -> BoardState {
        self.state
    }

    // ── Composition ──────────────────────────────────────────────────

    /// Instantiate library definition `definition` at the top level of the
    /// board, its local origin placed at `at` in the frame of `transform`.
    pub fn instantiate(
        &mut self,
        library: &Library,
        definition: &str,
        transform: &Transform,
        at: Placement,
        instance_name: &str,
        parameters: &Parameters,
    ) -> Result<()> {
        self.ensure_composing("instantiate")?;
        let definition = library.resolve(definition)?;
        definition.instantiate(self, library, transform, at, instance_name, parameters)?;
        log::info!(
            "instantiated {} as '{}' ({} parts, {} nets)",
            definition.name(),
            instance_name,
            self.parts.len(),
            self.netlist.len()
        );
        Ok(())
    }

    /// Join two fully qualified net names, `alias` taking on the true name
    /// of `target`.
    pub fn connect(&mut self, alias: &str, target: &str) -> Result<()> {
        self.ensure_composing("connect nets")?;
        self.alias_net(alias, target)
    }

    /// Flood every declared pour region. Runs once; later calls are no-ops.
    pub fn add_poly_pours(&mut self) -> Result<()> {
        if self.state != BoardState::Composing {
            log::warn!("poly pours already added; board is {}", self.state);
            return Ok(());
        }
        for region in &self.pour_regions {
            for vertex in &region.outline.vertices {
                self.netlist
                    .add_point(&region.net, &region.layer, *vertex, PointMode::Pour, None);
            }
            self.copper.push(CopperShape::Pour {
                layer: region.layer.clone(),
                net: region.net.clone(),
                outline: region.outline.clone(),
            });
        }
        log::info!("poured {} polygon region(s)", self.pour_regions.len());
        self.state = BoardState::Poured;
        Ok(())
    }

    /// Close the board for output. Pours first if that has not happened.
    pub fn finalize(&mut self) -> Result<()> {
        if self.state == BoardState::Composing {
            self.add_poly_pours()?;
        }
        self.state = BoardState::Finalized;
        Ok(())
    }

    // ── Read access ──────────────────────────────────────────────────

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn netlist(&self) -> &NetList {
        &self.netlist
    }

    pub fn copper(&self) -> &[CopperShape] {
        &self.copper
    }

    pub fn pour_regions(&self) -> &[PourRegion] {
        &self.pour_regions
    }

    pub fn find_part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }

    pub fn parts_on_layer<'a>(&'a self, layer: &'a str) -> impl Iterator<Item = &'a Part> + 'a {
        self.parts.iter().filter(move |p| p.layer == layer)
    }

    pub fn check_composite(&self) -> CompositeReport {
        self.netlist.check_composite()
    }

    /// Extent of all parts, net points and copper.
    pub fn bounding_box(&self) -> Option<BBox> {
        let points = self
            .parts
            .iter()
            .map(|p| p.coordinate)
            .chain(
                self.netlist
                    .iter_physical()
                    .flat_map(|n| n.points().iter().map(|p| p.coordinate)),
            )
            .collect::<Vec<Point>>();
        let parts_bb = BBox::from_points(&points);
        self.copper
            .iter()
            .filter_map(|c| c.bbox())
            .fold(parts_bb, |acc, bb| Some(acc.map_or(bb, |a| a.union(&bb))))
    }

    // ── Emission, used by definitions while instantiating ────────────

    pub(crate) fn enter_scope(&mut self, instance_name: &str) -> Result<String> {
        if instance_name.is_empty() || instance_name.contains('.') {
            return Err(ConfigurationError::InvalidInstanceName(instance_name.to_string()).into());
        }
        let mut path = self.scope.join(".");
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(instance_name);
        if !self.instances.insert(path.clone()) {
            return Err(Error::DuplicateInstance { path });
        }
        self.scope.push(instance_name.to_string());
        Ok(path)
    }

    pub(crate) fn exit_scope(&mut self) {
        self.scope.pop();
    }

    pub(crate) fn enter_definition(&mut self, name: &str) -> Result<()> {
        if self.active.iter().any(|a| a == name) {
            return Err(ConfigurationError::RecursiveDefinition(name.to_string()).into());
        }
        self.active.push(name.to_string());
        Ok(())
    }

    pub(crate) fn exit_definition(&mut self) {
        self.active.pop();
    }

    pub(crate) fn push_part(&mut self, part: Part) {
        self.parts.push(part);
    }

    pub(crate) fn push_net_point(
        &mut self,
        net: &str,
        layer: &str,
        coordinate: Point,
        mode: PointMode,
        aperture: Option<Aperture>,
    ) {
        self.netlist.add_point(net, layer, coordinate, mode, aperture);
    }

    pub(crate) fn push_trace(&mut self, net: &str, layer: &str, from: Point, to: Point, width: Length) {
        self.netlist
            .add_point(net, layer, from, PointMode::TraceEndpoint, None);
        self.netlist
            .add_point(net, layer, to, PointMode::TraceEndpoint, None);
        self.copper.push(CopperShape::Trace {
            layer: layer.to_string(),
            net: net.to_string(),
            from,
            to,
            width,
        });
    }

    pub(crate) fn declare_pour(&mut self, net: &str, layer: &str, outline: Polygon) {
        self.pour_regions.push(PourRegion {
            net: net.to_string(),
            layer: layer.to_string(),
            outline,
        });
    }

    pub(crate) fn alias_net(&mut self, alias: &str, target: &str) -> Result<()> {
        self.netlist.add_alias(alias, target)?;
        Ok(())
    }

    fn ensure_composing(&self, operation: &'static str) -> Result<()> {
        if self.state == BoardState::Composing {
            Ok(())
        } else {
            Err(Error::Sequencing {
                operation,
                state: self.state,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use serde_json::json;

    use super::*;
    use crate::library::{PadTemplate, PartTemplate, PourTemplate, Primitive, Subcircuit, SubcircuitChild, TraceTemplate};
    use crate::part::PartKind;
    use crate::transform::TransformSpec;

    fn mm(v: f64) -> Length {
        Length::from_mm(v)
    }

    fn test_library() -> Library {
        let mut lib = Library::new();
        lib.insert_primitive(
            "resistor",
            Primitive::new()
                .with_part(PartTemplate::new("R", "Ctop", Point::origin(), 0.0))
                .with_pad(PadTemplate::smd("A", "GTL", Point::from_mm(-1.0, 0.0)))
                .with_pad(PadTemplate::smd("$b", "GTL", Point::from_mm(1.0, 0.0))),
        );
        lib.insert_primitive(
            "mainboard",
            Primitive::new()
                .with_part(PartTemplate::new("U1", "Ctop", Point::from_mm(10.0, 0.0), FRAC_PI_2))
                .with_pad(PadTemplate::via("GND", &["GTL", "G1", "G2", "GBL"], Point::origin(), mm(0.6), mm(0.3)))
                .with_trace(TraceTemplate {
                    net: "VCC".into(),
                    layer: "GTL".into(),
                    from: Point::from_mm(5.0, 5.0),
                    to: Point::from_mm(5.0, 10.0),
                    width: mm(0.2),
                })
                .with_pour(PourTemplate {
                    net: "GND".into(),
                    layer: "G1".into(),
                    outline: vec![
                        Point::from_mm(-20.0, -20.0),
                        Point::from_mm(20.0, -20.0),
                        Point::from_mm(20.0, 20.0),
                        Point::from_mm(-20.0, 20.0),
                    ],
                }),
        );
        lib.insert_subcircuit(
            "pair",
            Subcircuit::new("Ctop")
                .with_child(
                    SubcircuitChild::new("resistor", "r1")
                        .at(Point::from_mm(0.0, 2.0), 0.0)
                        .inherit("b")
                        .connect("A", "IN"),
                )
                .with_child(
                    SubcircuitChild::new("resistor", "r2")
                        .at(Point::from_mm(0.0, -2.0), PI)
                        .with_parameter("b", json!("/GND"))
                        .connect("A", "IN"),
                ),
        );
        lib.insert_subcircuit(
            "loop",
            Subcircuit::new("Ctop").with_child(SubcircuitChild::new("loop", "again")),
        );
        lib
    }

    fn params(b: &str) -> Parameters {
        let mut p = Parameters::new();
        p.insert("b".into(), json!(b));
        p
    }

    #[test]
    fn test_primitive_instantiation() {
        let lib = test_library();
        let mut board = CircuitBoard::new(mm(0.05));
        let t = Transform::identity();
        board
            .instantiate(&lib, "mainboard", &t, Placement::default(), "mainboard", &Parameters::new())
            .unwrap();

        let u1 = board.find_part("mainboard.U1").unwrap();
        assert_eq!(u1.coordinate, Point::from_mm(10.0, 0.0));
        assert_eq!(u1.kind, PartKind::Primitive);
        assert_eq!(board.parts_on_layer("Ctop").count(), 1);

        let gnd = board.netlist().get_net("mainboard.GND").unwrap();
        assert_eq!(gnd.points().len(), 4);
        assert!(gnd.points().iter().all(|p| p.aperture.is_some()));
        let vcc = board.netlist().get_net("mainboard.VCC").unwrap();
        assert!(vcc.points().iter().all(|p| p.mode == PointMode::TraceEndpoint));
        assert_eq!(board.copper().len(), 1);
    }

    #[test]
    fn test_subcircuit_placement_and_aliases() {
        let lib = test_library();
        let mut board = CircuitBoard::new(mm(0.05));
        let t = Transform::linear(Point::from_mm(100.0, 0.0), 0.0);
        board
            .instantiate(&lib, "pair", &t, Placement::at(Point::from_mm(0.0, 50.0), FRAC_PI_2), "p", &params("/VCC"))
            .unwrap();

        let anchor = board.find_part("p").unwrap();
        assert_eq!(anchor.kind, PartKind::Subcircuit);
        assert_eq!(anchor.coordinate, Point::from_mm(100.0, 50.0));

        // r1 sits at local (0, 2), rotated by a quarter turn about the anchor.
        let r1 = board.find_part("p.r1.R").unwrap();
        assert_eq!(r1.coordinate, Point::from_mm(98.0, 50.0));
        assert!((r1.rotation - FRAC_PI_2).abs() < 1e-12);
        let r2 = board.find_part("p.r2.R").unwrap();
        assert_eq!(r2.coordinate, Point::from_mm(102.0, 50.0));
        assert!((r2.rotation - (FRAC_PI_2 + PI)).abs() < 1e-12);

        let nl = board.netlist();
        assert_eq!(nl.get_true_net_name("p.r1.A"), "p.IN");
        assert!(nl.same_node("p.r1.A", "p.r2.A"));
        // Inherited parameter selected VCC for r1, r2 kept its own GND.
        assert!(nl.get_net("VCC").is_some());
        assert!(nl.get_net("GND").is_some());
    }

    #[test]
    fn test_duplicate_instance_rejected() {
        let lib = test_library();
        let mut board = CircuitBoard::new(mm(0.05));
        let t = Transform::identity();
        board
            .instantiate(&lib, "resistor", &t, Placement::default(), "r", &params("X"))
            .unwrap();
        let err = board
            .instantiate(&lib, "resistor", &t, Placement::default(), "r", &params("X"))
            .unwrap_err();
        assert_eq!(err, Error::DuplicateInstance { path: "r".into() });

        let mut dup = Library::new();
        dup.insert_primitive("resistor", lib.get_primitive("resistor").unwrap().clone());
        dup.insert_subcircuit(
            "twins",
            Subcircuit::new("Ctop")
                .with_child(SubcircuitChild::new("resistor", "x"))
                .with_child(SubcircuitChild::new("resistor", "x")),
        );
        let err = board
            .instantiate(&dup, "twins", &t, Placement::default(), "t", &params("X"))
            .unwrap_err();
        assert_eq!(err, Error::DuplicateInstance { path: "t.x".into() });
    }

    #[test]
    fn test_same_child_name_in_different_parents_is_fine() {
        let lib = test_library();
        let mut board = CircuitBoard::new(mm(0.05));
        let t = Transform::identity();
        for name in ["a", "b"] {
            board
                .instantiate(&lib, "pair", &t, Placement::default(), name, &params("/VCC"))
                .unwrap();
        }
        assert!(board.find_part("a.r1.R").is_some());
        assert!(board.find_part("b.r1.R").is_some());
    }

    #[test]
    fn test_invalid_names_and_recursion() {
        let lib = test_library();
        let mut board = CircuitBoard::new(mm(0.05));
        let t = Transform::identity();
        let err = board
            .instantiate(&lib, "resistor", &t, Placement::default(), "a.b", &params("X"))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(ConfigurationError::InvalidInstanceName(_))));

        let err = board
            .instantiate(&lib, "loop", &t, Placement::default(), "l", &Parameters::new())
            .unwrap_err();
        assert_eq!(err, Error::Configuration(ConfigurationError::RecursiveDefinition("loop".into())));

        let err = board
            .instantiate(&lib, "missing", &t, Placement::default(), "m", &Parameters::new())
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(ConfigurationError::UnknownDefinition(_))));
    }

    #[test]
    fn test_pour_sequencing_and_idempotence() {
        let lib = test_library();
        let mut board = CircuitBoard::new(mm(0.05));
        let t = Transform::identity();
        board
            .instantiate(&lib, "mainboard", &t, Placement::default(), "mainboard", &Parameters::new())
            .unwrap();
        assert_eq!(board.pour_regions().len(), 1);

        board.add_poly_pours().unwrap();
        assert_eq!(board.state(), BoardState::Poured);
        let copper = board.copper().to_vec();
        let points = board.netlist().point_count();
        assert_eq!(copper.len(), 2);

        board.add_poly_pours().unwrap();
        assert_eq!(board.copper(), copper.as_slice());
        assert_eq!(board.netlist().point_count(), points);

        let err = board
            .instantiate(&lib, "resistor", &t, Placement::default(), "late", &params("X"))
            .unwrap_err();
        assert_eq!(
            err,
            Error::Sequencing {
                operation: "instantiate",
                state: BoardState::Poured
            }
        );
        assert!(board.connect("a", "b").is_err());

        board.finalize().unwrap();
        assert_eq!(board.state(), BoardState::Finalized);
        board.add_poly_pours().unwrap();
        assert_eq!(board.copper().len(), 2);
    }

    #[test]
    fn test_finalize_pours_first() {
        let lib = test_library();
        let mut board = CircuitBoard::new(mm(0.05));
        board
            .instantiate(&lib, "mainboard", &Transform::identity(), Placement::default(), "m", &Parameters::new())
            .unwrap();
        board.finalize().unwrap();
        let pour_points = board
            .netlist()
            .get_net("m.GND")
            .unwrap()
            .points()
            .iter()
            .filter(|p| p.mode == PointMode::Pour)
            .count();
        assert_eq!(pour_points, 4);
    }

    #[test]
    fn test_circular_subcircuit_children() {
        let mut lib = test_library();
        lib.insert_subcircuit(
            "arc",
            Subcircuit::new("Ctop").with_child(
                SubcircuitChild::new("resistor", "r")
                    .with_transform(TransformSpec::Circular {
                        center: Point::origin(),
                        radius: mm(10.0),
                        angle: 0.0,
                    })
                    .at(Point::from_mm(0.0, 0.0), 0.0),
            ),
        );
        let mut board = CircuitBoard::new(mm(0.05));
        board
            .instantiate(
                &lib,
                "arc",
                &Transform::linear(Point::from_mm(5.0, 5.0), 0.0),
                Placement::default(),
                "arc",
                &params("X"),
            )
            .unwrap();
        let r = board.find_part("arc.r.R").unwrap();
        assert_eq!(r.coordinate, Point::from_mm(15.0, 5.0));
    }

    #[test]
    fn test_bounding_box() {
        let lib = test_library();
        let mut board = CircuitBoard::new(mm(0.05));
        assert!(board.bounding_box().is_none());
        board
            .instantiate(&lib, "mainboard", &Transform::identity(), Placement::default(), "m", &Parameters::new())
            .unwrap();
        board.add_poly_pours().unwrap();
        let bb = board.bounding_box().unwrap();
        assert_eq!(bb.min, Point::from_mm(-20.0, -20.0));
        assert_eq!(bb.max, Point::from_mm(20.0, 20.0));
    }
}
