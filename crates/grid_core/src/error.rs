//! Error types for the grid simulation.

use thiserror::Error;

use crate::registry::PartitionId;
use crate::space::Position;

/// Result type alias using [`GridError`].
pub type Result<T> = std::result::Result<T, GridError>;

/// Top-level error type for all grid simulation errors.
///
/// Errors surface only at construction and validation boundaries. Per-step
/// arithmetic clamps instead of failing, so the hot path is infallible.
#[derive(Debug, Error)]
pub enum GridError {
    /// An amount string was not a non-negative decimal integer.
    #[error("Malformed amount: {0:?}")]
    MalformedAmount(String),

    /// A conversion ratio had a zero denominator.
    #[error("Invalid conversion ratio: {numerator}/{denominator}")]
    InvalidRatio {
        /// Ratio numerator.
        numerator: u64,
        /// Ratio denominator.
        denominator: u64,
    },

    /// A node was placed at an already-occupied position.
    #[error("Position already occupied: {0:?}")]
    PositionOccupied(Position),

    /// An operation referenced a partition that is not loaded.
    #[error("Partition not loaded: {0:?}")]
    PartitionNotLoaded(PartitionId),

    /// A configuration value failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
