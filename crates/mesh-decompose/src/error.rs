//! Error types for mesh decomposition with rich diagnostics.
//!
//! Each error carries a machine-readable code in the format `DECOMP-XXXX`:
//! - `DECOMP-1xxx`: input errors (empty or unusable meshes)
//! - `DECOMP-2xxx`: geometry errors (degenerate components)
//! - `DECOMP-3xxx`: strategy errors (a separation strategy could not complete)
//! - `DECOMP-4xxx`: parameter errors
//!
//! The only error that escapes the top-level [`decompose`](crate::decompose)
//! call is `EmptyMesh`. Degenerate components are reported inside the result
//! as unclassifiable; strategy failures are absorbed by the fallback chain.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for decomposition operations.
pub type DecomposeResult<T> = Result<T, DecomposeError>;

/// Machine-readable error codes for decomposition operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// DECOMP-1001: Mesh has no faces.
    EmptyMesh = 1001,
    /// DECOMP-2001: Component geometry cannot support feature extraction.
    DegenerateGeometry = 2001,
    /// DECOMP-3001: A separation strategy failed internally.
    StrategyFailed = 3001,
    /// DECOMP-4001: Invalid decomposition parameters.
    InvalidParams = 4001,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `DECOMP-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::EmptyMesh => "DECOMP-1001",
            ErrorCode::DegenerateGeometry => "DECOMP-2001",
            ErrorCode::StrategyFailed => "DECOMP-3001",
            ErrorCode::InvalidParams => "DECOMP-4001",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during mesh decomposition.
#[derive(Debug, Error, Diagnostic)]
pub enum DecomposeError {
    /// The input mesh has no triangles. Fatal; nothing can be decomposed.
    #[error("mesh is empty: {details}")]
    #[diagnostic(
        code(decompose::input::empty),
        help(
            "The mesh must have at least one face. Check that the upstream loader produced geometry."
        )
    )]
    EmptyMesh { details: String },

    /// A component's geometry cannot support feature extraction.
    ///
    /// Raised per component and recovered by the controller: the component is
    /// reported as unclassifiable instead of aborting the run.
    #[error(
        "component {component_id} is degenerate: {vertex_count} vertices, volume {volume:.3e}"
    )]
    #[diagnostic(
        code(decompose::geometry::degenerate),
        help(
            "A component needs at least 4 vertices and positive enclosed volume to be classified. Open or planar fragments trigger this."
        )
    )]
    DegenerateGeometry {
        component_id: u32,
        vertex_count: usize,
        volume: f64,
    },

    /// A separation strategy failed internally.
    ///
    /// Never surfaced to callers of `decompose`; the separator logs it and
    /// falls through to the next strategy in the chain.
    #[error("separation strategy '{strategy}' failed: {details}")]
    #[diagnostic(
        code(decompose::strategy::failed),
        help("The separator falls back to the next strategy automatically.")
    )]
    StrategyFailed { strategy: String, details: String },

    /// Decomposition parameters are invalid.
    #[error("invalid decomposition parameters: {details}")]
    #[diagnostic(
        code(decompose::params::invalid),
        help("Check voxel_size > 0, forced_component_count > 0, spatial_threshold > 0.")
    )]
    InvalidParams { details: String },
}

impl DecomposeError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            DecomposeError::EmptyMesh { .. } => ErrorCode::EmptyMesh,
            DecomposeError::DegenerateGeometry { .. } => ErrorCode::DegenerateGeometry,
            DecomposeError::StrategyFailed { .. } => ErrorCode::StrategyFailed,
            DecomposeError::InvalidParams { .. } => ErrorCode::InvalidParams,
        }
    }

    /// Whether the controller can recover from this error and keep going.
    ///
    /// Only `EmptyMesh` is fatal to a decomposition run.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DecomposeError::EmptyMesh { .. })
    }

    // Constructor helpers for common error patterns

    /// Create an EmptyMesh error.
    pub fn empty_mesh(details: impl Into<String>) -> Self {
        DecomposeError::EmptyMesh {
            details: details.into(),
        }
    }

    /// Create a DegenerateGeometry error.
    pub fn degenerate_geometry(component_id: u32, vertex_count: usize, volume: f64) -> Self {
        DecomposeError::DegenerateGeometry {
            component_id,
            vertex_count,
            volume,
        }
    }

    /// Create a StrategyFailed error.
    pub fn strategy_failed(strategy: impl Into<String>, details: impl Into<String>) -> Self {
        DecomposeError::StrategyFailed {
            strategy: strategy.into(),
            details: details.into(),
        }
    }

    /// Create an InvalidParams error.
    pub fn invalid_params(details: impl Into<String>) -> Self {
        DecomposeError::InvalidParams {
            details: details.into(),
        }
    }
}
