use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use boardkit_core::{CircuitBoard, Length, Library, Parameters, Placement, Point, TransformSpec};
use boardkit_drc::{check_netlist, DrcRules, LayerMap};

use crate::error::IoError;
use crate::report::DrcReport;

/// A board project: build settings, the part library and the ordered
/// composition steps that place library definitions onto the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub name: String,
    #[serde(default)]
    pub settings: BuildSettings,
    #[serde(default)]
    pub library: Library,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    pub mask_expansion: Length,
    pub clearance: Length,
    pub annular_ring: Length,
    /// Layer code → stackup index for physical DRC.
    pub layers: LayerMap,
}

impl Default for BuildSettings {
    fn default() -> Self {
        let rules = DrcRules::default();
        Self {
            mask_expansion: Length::from_mm(0.05),
            clearance: rules.clearance,
            annular_ring: rules.annular_ring,
            layers: LayerMap::four_layer(),
        }
    }
}

impl BuildSettings {
    pub fn rules(&self) -> DrcRules {
        DrcRules {
            clearance: self.clearance,
            annular_ring: self.annular_ring,
        }
    }
}

/// One composition step, applied in file order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Instantiate {
        definition: String,
        name: String,
        #[serde(default)]
        transform: TransformSpec,
        #[serde(default)]
        at: Point,
        #[serde(default)]
        rotation: f64,
        #[serde(default)]
        parameters: Parameters,
    },
    Connect {
        alias: String,
        target: String,
    },
}

/// Pipeline stages reported to [`ProjectFile::build_with`] callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Composing,
    Pouring,
    CircuitDrc,
    PhysicalDrc,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Phase::Composing => "composing board",
            Phase::Pouring => "pouring inner layer polygons",
            Phase::CircuitDrc => "running circuit DRC",
            Phase::PhysicalDrc => "running physical DRC",
        };
        f.write_str(text)
    }
}

impl ProjectFile {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            settings: BuildSettings::default(),
            library: Library::new(),
            steps: Vec::new(),
        }
    }

    pub fn read<R: Read>(reader: R) -> Result<Self, IoError> {
        let project: ProjectFile = serde_json::from_reader(reader)?;
        log::info!(
            "Loaded project '{}': {} definitions, {} steps",
            project.name,
            project.library.len(),
            project.steps.len()
        );
        Ok(project)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    pub fn to_json(&self) -> Result<String, IoError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), IoError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Run every step against a fresh board. The board is left composing.
    pub fn compose(&self) -> Result<CircuitBoard, IoError> {
        let mut board = CircuitBoard::new(self.settings.mask_expansion);
        for step in &self.steps {
            match step {
                Step::Instantiate {
                    definition,
                    name,
                    transform,
                    at,
                    rotation,
                    parameters,
                } => {
                    let transform = transform.build()?;
                    board.instantiate(
                        &self.library,
                        definition,
                        &transform,
                        Placement::at(*at, *rotation),
                        name,
                        parameters,
                    )?;
                }
                Step::Connect { alias, target } => board.connect(alias, target)?,
            }
        }
        Ok(board)
    }

    /// Compose, pour, then run the circuit and physical checks.
    pub fn build(&self) -> Result<(CircuitBoard, DrcReport), IoError> {
        self.build_with(|phase| log::info!("{}", phase))
    }

    /// Like [`build`](Self::build), calling `on_phase` as each stage starts.
    pub fn build_with<F: FnMut(Phase)>(&self, mut on_phase: F) -> Result<(CircuitBoard, DrcReport), IoError> {
        on_phase(Phase::Composing);
        let mut board = self.compose()?;

        on_phase(Phase::Pouring);
        board.add_poly_pours()?;

        on_phase(Phase::CircuitDrc);
        let composite = board.check_composite();

        on_phase(Phase::PhysicalDrc);
        let violations = check_netlist(board.netlist(), &self.settings.layers, &self.settings.rules())?;

        board.finalize()?;
        let report = DrcReport::new(&self.name, &board, composite.violations, violations);
        Ok((board, report))
    }
}
