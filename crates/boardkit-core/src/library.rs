//! Part library: primitive and subcircuit definitions.
//!
//! Definitions are plain data (serde-loadable). A [`Library`] is built once
//! per process and passed explicitly into every instantiation; there is no
//! global registry.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::board::CircuitBoard;
use crate::error::{ConfigurationError, Result};
use crate::geometry::{Point, Polygon};
use crate::net::{Aperture, PointMode};
use crate::part::{Part, PartKind};
use crate::transform::{Placement, Transform, TransformSpec};
use crate::units::Length;

/// Definition parameters. Opaque to the board; interpreted only by the
/// definition being instantiated.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

// ── Primitive templates ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartTemplate {
    pub name: String,
    pub layer: String,
    #[serde(default)]
    pub at: Point,
    #[serde(default)]
    pub rotation: f64,
}

impl PartTemplate {
    pub fn new(name: &str, layer: &str, at: Point, rotation: f64) -> Self {
        Self {
            name: name.to_string(),
            layer: layer.to_string(),
            at,
            rotation,
        }
    }
}

/// A pad or via. One net point is emitted per listed layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadTemplate {
    pub net: String,
    pub layers: Vec<String>,
    #[serde(default)]
    pub at: Point,
    #[serde(default)]
    pub mode: PointMode,
    #[serde(default)]
    pub diameter: Option<Length>,
    #[serde(default)]
    pub drill: Option<Length>,
}

impl PadTemplate {
    /// Surface-mount pad on a single layer.
    pub fn smd(net: &str, layer: &str, at: Point) -> Self {
        Self {
            net: net.to_string(),
            layers: vec![layer.to_string()],
            at,
            mode: PointMode::Pad,
            diameter: None,
            drill: None,
        }
    }

    /// Drilled via through the listed layers.
    pub fn via(net: &str, layers: &[&str], at: Point, diameter: Length, drill: Length) -> Self {
        Self {
            net: net.to_string(),
            layers: layers.iter().map(|l| l.to_string()).collect(),
            at,
            mode: PointMode::Via,
            diameter: Some(diameter),
            drill: Some(drill),
        }
    }

    fn aperture(&self) -> Option<Aperture> {
        Some(Aperture::new(self.diameter?, self.drill?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceTemplate {
    pub net: String,
    pub layer: String,
    pub from: Point,
    pub to: Point,
    pub width: Length,
}

/// A region flooded with copper by [`CircuitBoard::add_poly_pours`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PourTemplate {
    pub net: String,
    pub layer: String,
    pub outline: Vec<Point>,
}

/// A leaf definition: parts, pads, traces and pour regions in local
/// coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    #[serde(default)]
    pub parts: Vec<PartTemplate>,
    #[serde(default)]
    pub pads: Vec<PadTemplate>,
    #[serde(default)]
    pub traces: Vec<TraceTemplate>,
    #[serde(default)]
    pub pours: Vec<PourTemplate>,
}

impl Primitive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_part(mut self, part: PartTemplate) -> Self {
        self.parts.push(part);
        self
    }

    pub fn with_pad(mut self, pad: PadTemplate) -> Self {
        self.pads.push(pad);
        self
    }

    pub fn with_trace(mut self, trace: TraceTemplate) -> Self {
        self.traces.push(trace);
        self
    }

    pub fn with_pour(mut self, pour: PourTemplate) -> Self {
        self.pours.push(pour);
        self
    }

    fn emit(&self, board: &mut CircuitBoard, frame: &Transform, path: &str, parameters: &Parameters) -> Result<()> {
        for part in &self.parts {
            let (coordinate, rotation) = frame.apply_point(part.at, part.rotation);
            board.push_part(Part::new(
                format!("{}.{}", path, part.name),
                &part.layer,
                coordinate,
                rotation,
                PartKind::Primitive,
            ));
        }

        for pad in &self.pads {
            let net = resolve_net(&pad.net, path, parameters)?;
            let (coordinate, _) = frame.apply_point(pad.at, 0.0);
            for layer in &pad.layers {
                board.push_net_point(&net, layer, coordinate, pad.mode, pad.aperture());
            }
        }

        for trace in &self.traces {
            let net = resolve_net(&trace.net, path, parameters)?;
            let (from, _) = frame.apply_point(trace.from, 0.0);
            let (to, _) = frame.apply_point(trace.to, 0.0);
            board.push_trace(&net, &trace.layer, from, to, trace.width);
        }

        for pour in &self.pours {
            let net = resolve_net(&pour.net, path, parameters)?;
            let outline = pour
                .outline
                .iter()
                .map(|p| frame.apply_point(*p, 0.0).0)
                .collect();
            board.declare_pour(&net, &pour.layer, Polygon::new(outline));
        }
        Ok(())
    }
}

// ── Subcircuits ──────────────────────────────────────────────────────

/// One child placement inside a subcircuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubcircuitChild {
    /// Library name of the child definition.
    pub definition: String,
    /// Instance name, unique within the subcircuit.
    pub name: String,
    #[serde(default)]
    pub transform: TransformSpec,
    #[serde(default)]
    pub at: Point,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub parameters: Parameters,
    /// Parent parameters forwarded to the child, overriding its own.
    #[serde(default)]
    pub inherit: Vec<String>,
    /// Child-local net name → subcircuit-local net name.
    #[serde(default)]
    pub nets: BTreeMap<String, String>,
}

impl SubcircuitChild {
    pub fn new(definition: &str, name: &str) -> Self {
        Self {
            definition: definition.to_string(),
            name: name.to_string(),
            transform: TransformSpec::default(),
            at: Point::origin(),
            rotation: 0.0,
            parameters: Parameters::new(),
            inherit: Vec::new(),
            nets: BTreeMap::new(),
        }
    }

    pub fn at(mut self, at: Point, rotation: f64) -> Self {
        self.at = at;
        self.rotation = rotation;
        self
    }

    pub fn with_transform(mut self, transform: TransformSpec) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_parameter(mut self, key: &str, value: serde_json::Value) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }

    pub fn inherit(mut self, key: &str) -> Self {
        self.inherit.push(key.to_string());
        self
    }

    pub fn connect(mut self, child_net: &str, parent_net: &str) -> Self {
        self.nets.insert(child_net.to_string(), parent_net.to_string());
        self
    }

    fn effective_parameters(&self, parent: &Parameters) -> Parameters {
        let mut params = self.parameters.clone();
        for key in &self.inherit {
            if let Some(value) = parent.get(key) {
                params.insert(key.clone(), value.clone());
            }
        }
        params
    }
}

/// A composite definition: an ordered list of child placements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subcircuit {
    /// Layer code for the subcircuit's anchor part.
    #[serde(default)]
    pub layer: String,
    #[serde(default)]
    pub children: Vec<SubcircuitChild>,
}

impl Subcircuit {
    pub fn new(layer: &str) -> Self {
        Self {
            layer: layer.to_string(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: SubcircuitChild) -> Self {
        self.children.push(child);
        self
    }

    fn emit(
        &self,
        board: &mut CircuitBoard,
        library: &Library,
        frame: &Transform,
        path: &str,
        parameters: &Parameters,
    ) -> Result<()> {
        let (coordinate, rotation) = frame.apply_point(Point::origin(), 0.0);
        board.push_part(Part::new(
            path.to_string(),
            &self.layer,
            coordinate,
            rotation,
            PartKind::Subcircuit,
        ));

        for child in &self.children {
            let child_frame = frame.compose(&child.transform.build()?);
            let child_params = child.effective_parameters(parameters);
            let definition = library.resolve(&child.definition)?;
            definition.instantiate(
                board,
                library,
                &child_frame,
                Placement::at(child.at, child.rotation),
                &child.name,
                &child_params,
            )?;

            let child_path = format!("{}.{}", path, child.name);
            for (child_net, parent_net) in &child.nets {
                let alias = resolve_net(child_net, &child_path, &child_params)?;
                let target = resolve_net(parent_net, path, parameters)?;
                board.alias_net(&alias, &target)?;
            }
        }
        Ok(())
    }
}

// ── Definitions and the library ──────────────────────────────────────

/// A resolved library entry. Primitives and subcircuits share the single
/// `instantiate` capability.
#[derive(Debug, Clone, Copy)]
pub enum Definition<'a> {
    Primitive { name: &'a str, primitive: &'a Primitive },
    Subcircuit { name: &'a str, subcircuit: &'a Subcircuit },
}

impl<'a> Definition<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Definition::Primitive { name, .. } | Definition::Subcircuit { name, .. } => *name,
        }
    }

    /// Place this definition's local origin at `at` (in the frame of
    /// `transform`) as instance `instance_name` of the current scope.
    pub fn instantiate(
        &self,
        board: &mut CircuitBoard,
        library: &Library,
        transform: &Transform,
        at: Placement,
        instance_name: &str,
        parameters: &Parameters,
    ) -> Result<()> {
        let frame = transform.compose(&Transform::place(at));
        let path = board.enter_scope(instance_name)?;
        log::debug!("instantiating {} as {}", self.name(), path);

        let result = match self {
            Definition::Primitive { primitive, .. } => primitive.emit(board, &frame, &path, parameters),
            Definition::Subcircuit { name, subcircuit } => match board.enter_definition(name) {
                Ok(()) => {
                    let result = subcircuit.emit(board, library, &frame, &path, parameters);
                    board.exit_definition();
                    result
                }
                Err(e) => Err(e),
            },
        };
        board.exit_scope();
        result
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Library {
    #[serde(default)]
    primitives: IndexMap<String, Primitive>,
    #[serde(default)]
    subcircuits: IndexMap<String, Subcircuit>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_primitive(&mut self, name: &str, primitive: Primitive) {
        self.primitives.insert(name.to_string(), primitive);
    }

    pub fn insert_subcircuit(&mut self, name: &str, subcircuit: Subcircuit) {
        self.subcircuits.insert(name.to_string(), subcircuit);
    }

    pub fn get_primitive(&self, name: &str) -> Option<&Primitive> {
        self.primitives.get(name)
    }

    pub fn get_subcircuit(&self, name: &str) -> Option<&Subcircuit> {
        self.subcircuits.get(name)
    }

    /// Look `name` up among primitives first, then subcircuits.
    pub fn resolve(&self, name: &str) -> std::result::Result<Definition<'_>, ConfigurationError> {
        if let Some((name, primitive)) = self.primitives.get_key_value(name) {
            return Ok(Definition::Primitive { name, primitive });
        }
        if let Some((name, subcircuit)) = self.subcircuits.get_key_value(name) {
            return Ok(Definition::Subcircuit { name, subcircuit });
        }
        Err(ConfigurationError::UnknownDefinition(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.primitives.len() + self.subcircuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty() && self.subcircuits.is_empty()
    }
}

/// Qualify a definition-local net name.
///
/// - `/NAME` is board-global and used as `NAME`.
/// - `$key` takes the (global) net name from string parameter `key`.
/// - Anything else is scoped to the instance: `<path>.<local>`.
pub fn resolve_net(local: &str, path: &str, parameters: &Parameters) -> std::result::Result<String, ConfigurationError> {
    if let Some(global) = local.strip_prefix('/') {
        return Ok(global.to_string());
    }
    if let Some(key) = local.strip_prefix('$') {
        return parameters
            .get(key)
            .and_then(|v| v.as_str())
            .map(|v| v.trim_start_matches('/').to_string())
            .ok_or_else(|| ConfigurationError::MissingParameter {
                name: key.to_string(),
                net: local.to_string(),
            });
    }
    if path.is_empty() {
        Ok(local.to_string())
    } else {
        Ok(format!("{}.{}", path, local))
    }
}
