use thiserror::Error;

use crate::scene::{DeformerId, GeometryId, HandleId};

/// Top-level error type for cluster mirroring.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Operation(#[from] OperationError),
}

/// Errors raised by the host scene when a lookup or mutation fails.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("point {component} does not exist on geometry '{geometry}'")]
    PointNotFound { geometry: String, component: String },

    #[error("deformer '{0}' is not a cluster")]
    NotACluster(String),

    #[error("cannot create a cluster without member points")]
    EmptyMembership,
}

/// Errors caused by the shape of the user's input.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("no cluster handle found in selection, select one or more cluster handles")]
    NoDeformerHandleSelected,

    #[error("invalid selection: {0}")]
    InvalidSelection(String),
}

/// Errors raised while mirroring.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Geometry that is neither a mesh nor a lattice was given to a point search.
    #[error("{} geometry object(s) are neither mesh nor lattice", .geometries.len())]
    UnsupportedGeometryKind {
        /// The offending geometries.
        geometries: Vec<GeometryId>,
        /// Deformers acting on them, when known.
        deformers: Vec<DeformerId>,
        /// Handles driving the offending deformers, for re-selection.
        handles: Vec<HandleId>,
    },

    #[error("nearest-point search target has no points")]
    EmptyTargetGeometry,
}

/// Convenience type alias for results using [`MirrorError`].
pub type Result<T> = std::result::Result<T, MirrorError>;
