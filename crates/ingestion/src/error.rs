//! Ingestion error types

use thiserror::Error;

/// Ingestion configuration errors
///
/// Per-message failures never surface here; they are contained in the
/// ingestion loop and reflected in channel statistics. These variants cover
/// construction-time misconfiguration only.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Voxel size must be a positive, finite number of meters
    #[error("invalid voxel size {0}: must be positive and finite")]
    InvalidVoxelSize(f64),
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
