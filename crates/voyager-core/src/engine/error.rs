use thiserror::Error;

use super::config::ConfigError;
use crate::core::models::positionlist::PositionlistError;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Positionlist(#[from] PositionlistError),

    #[error("Beam current must be positive and finite, got {0} A")]
    InvalidBeamCurrent(f64),

    #[error("Area dose must be non-negative and finite, got {0} uC/cm^2")]
    InvalidAreaDose(f64),
}
