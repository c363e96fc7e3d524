use std::path::Path;

use serde::{Deserialize, Serialize};

use boardkit_core::{CircuitBoard, CompositeViolation};
use boardkit_drc::DrcViolation;

use crate::error::IoError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrcSummary {
    pub parts: usize,
    pub nets: usize,
    pub points: usize,
    pub composite_violations: usize,
    pub physical_violations: usize,
    pub passed: bool,
}

/// Findings of the circuit and physical checks for one project build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrcReport {
    pub project: String,
    pub summary: DrcSummary,
    pub composite: Vec<CompositeViolation>,
    pub violations: Vec<DrcViolation>,
}

impl DrcReport {
    pub fn new(
        project: &str,
        board: &CircuitBoard,
        composite: Vec<CompositeViolation>,
        violations: Vec<DrcViolation>,
    ) -> Self {
        let summary = DrcSummary {
            parts: board.parts().len(),
            nets: board.netlist().len(),
            points: board.netlist().point_count(),
            composite_violations: composite.len(),
            physical_violations: violations.len(),
            passed: composite.is_empty() && violations.is_empty(),
        };
        Self {
            project: project.to_string(),
            summary,
            composite,
            violations,
        }
    }

    pub fn passed(&self) -> bool {
        self.summary.passed
    }

    pub fn to_json(&self) -> Result<String, IoError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), IoError> {
        std::fs::write(path, self.to_json()?)?;
        log::info!("DRC report written ({} findings)", self.composite.len() + self.violations.len());
        Ok(())
    }
}
