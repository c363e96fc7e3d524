use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DrcError {
    #[error("layer '{layer}' of net '{net}' has no stackup index")]
    UnmappedLayer { layer: String, net: String },

    #[error("DRC parameter '{name}' must be a non-negative length, got {value} mm")]
    InvalidParameter { name: &'static str, value: f64 },
}
