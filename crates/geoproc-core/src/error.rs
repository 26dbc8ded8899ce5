//! Error taxonomy of the processing engine.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = ProcessorError> = std::result::Result<T, E>;

/// Failures raised by the processing engine. None of them are retried or
/// downgraded internally; the first one aborts the enclosing operation.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("'{0}' is not a supported query mode; use 'literal' or 'template'")]
    UnsupportedMode(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("geometry type '{0}' is not a PostGIS type (missing 'ST_' prefix)")]
    InvalidGeometryType(String),

    #[error("expected a single geometry type, found {}: [{}]", .0.len(), .0.join(", "))]
    MixedGeometryType(Vec<String>),

    #[error("geometry kind '{0}' has no known dimension")]
    UnsupportedGeometryKind(String),

    #[error("'{relation_a}' (SRID {srid_a}) and '{relation_b}' (SRID {srid_b}) do not share the same SRID")]
    SridMismatch {
        relation_a: String,
        srid_a: i32,
        relation_b: String,
        srid_b: i32,
    },

    #[error("relation '{relation}' holds several SRIDs: {srids:?}")]
    MixedSrid { relation: String, srids: Vec<i32> },

    #[error("relation '{0}' has no geometry to read an SRID from")]
    MissingSrid(String),

    #[error("'{0}' is not a valid relation kind; use 'TABLE' or 'VIEW'")]
    InvalidRelationKind(String),

    #[error("failed to drop relation '{name}'")]
    RelationDrop {
        name: String,
        #[source]
        source: Box<ProcessorError>,
    },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("unexpected row shape: {0}")]
    UnexpectedRow(String),

    #[error("geometry engine error: {0:#}")]
    Engine(#[source] anyhow::Error),

    #[error("operation journal error: {0:#}")]
    Journal(#[source] anyhow::Error),
}

impl ProcessorError {
    /// Returns `true` when the failure was raised by the geometry engine
    /// rather than by a precondition check.
    pub fn is_engine(&self) -> bool {
        match self {
            ProcessorError::Engine(_) => true,
            ProcessorError::RelationDrop { source, .. } => source.is_engine(),
            _ => false,
        }
    }
}
