use std::io;

use thiserror::Error;

use boardkit_drc::DrcError;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid project JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Composition failed: {0}")]
    Core(#[from] boardkit_core::Error),

    #[error("Physical DRC failed: {0}")]
    Drc(#[from] DrcError),
}

impl From<boardkit_core::ConfigurationError> for IoError {
    fn from(err: boardkit_core::ConfigurationError) -> Self {
        IoError::Core(err.into())
    }
}
