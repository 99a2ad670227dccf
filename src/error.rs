//! Error taxonomy for the store, engine and import layers.
//!
//! Each layer gets its own enum rather than one crate-wide error type, so
//! that callers working directly against `store` or `import` don't have to
//! match on variants that can't occur at their level. `From` impls thread
//! lower-layer errors upward so `?` still composes end to end.

use std::fmt;

/// Errors surfaced by a [`crate::store::FenceStore`] implementation.
#[derive(Debug)]
pub enum StoreError {
    /// A write was attempted against a store opened read-only.
    ReadOnly,
    /// A persisted record failed to deserialize.
    Corruption(String),
    /// The underlying storage engine reported an I/O failure.
    Io(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "store is read-only"),
            Self::Corruption(msg) => write!(f, "corrupt record: {msg}"),
            Self::Io(msg) => write!(f, "store I/O error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Errors surfaced by the [`crate::engine::FenceEngine`].
#[derive(Debug)]
pub enum EngineError {
    /// A write was attempted against an engine opened read-only.
    ReadOnly,
    /// The rectangle query's single-cell cover did not resolve to exactly
    /// one cell.
    ImpossibleCovering,
    /// The underlying store reported a failure.
    Store(StoreError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "engine is read-only"),
            Self::ImpossibleCovering => {
                write!(f, "rectangle covering did not resolve to a single cell")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ReadOnly => Self::ReadOnly,
            other => Self::Store(other),
        }
    }
}

/// Errors surfaced by the [`crate::import`] pipeline.
#[derive(Debug)]
pub enum ImportError {
    /// The feature's geometry was neither `Polygon` nor `MultiPolygon`.
    UnknownGeometry(String),
    /// The loop was empty, full, or its cover degenerated to a cell below
    /// [`crate::geometry::MIN_LEVEL`].
    InvalidCover(String),
    /// The underlying engine reported a failure while storing a fence.
    Engine(EngineError),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownGeometry(kind) => write!(f, "unknown geometry type: {kind}"),
            Self::InvalidCover(reason) => write!(f, "invalid cover: {reason}"),
            Self::Engine(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EngineError> for ImportError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}
