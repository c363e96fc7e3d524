//! # Boardkit I/O
//!
//! The JSON project format (settings, part library and an ordered list of
//! composition steps), the build pipeline that turns a project into a
//! checked board, and the JSON DRC report it produces.

pub mod error;
pub mod project;
pub mod report;

pub use error::IoError;
pub use project::{BuildSettings, Phase, ProjectFile, Step};
pub use report::{DrcReport, DrcSummary};
