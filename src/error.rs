//! Error taxonomy for the asset management core.
//!
//! Variants are grouped by how callers and the operation controller must
//! react to them: validation errors are caller-visible and never retried;
//! transient I/O errors are retried with backoff internally; corruption and
//! resource errors are surfaced and the record is marked `FAILED`;
//! flow-control outcomes (`Cancelled`, `TimedOut`) are neither errors of the
//! caller nor of the store.

use std::io;
use std::sync::Arc;

use crate::path::AssetPath;

/// The outcome of an [`crate::op::Operation`], delivered through its
/// [`crate::op::Promise`].
///
/// `Clone`/`PartialEq` are hand-rolled rather than derived: `io::Error`
/// implements neither, so `Io` carries it behind an `Arc` (free to clone,
/// compared by kind and message) instead.
#[derive(Debug, thiserror::Error)]
pub enum OpError {
    /// A Create targeted a path that already resolves to a record.
    #[error("asset already exists: {0}")]
    AlreadyExists(AssetPath),

    /// Import/Load targeted a path with no source or cache bytes.
    #[error("asset not found: {0}")]
    NotFound(AssetPath),

    /// The requested parent record is deleted, or setting it would create
    /// a cycle in the prototype-inheritance chain.
    #[error("invalid parent for {0}")]
    InvalidParent(AssetPath),

    /// Detected a dependency cycle that could not be resolved by the
    /// loader's in-progress tracking.
    #[error("dependency cycle detected at {0}")]
    CycleDetected(AssetPath),

    /// A concrete-type constraint on an acquire/load did not match the
    /// record's registered type.
    #[error("wrong concrete type for {0}")]
    WrongConcreteType(AssetPath),

    /// A retryable I/O failure exhausted its retry budget.
    #[error("io error: {0}")]
    Io(Arc<io::Error>),

    /// Deserialising bytes into a prototype failed.
    #[error("deserialisation error: {0}")]
    Deserialisation(String),

    /// A cache read found a `uid` mismatch: the slot was reused since the
    /// `CacheIndex` was captured.
    #[error("stale cache uid")]
    StaleUid,

    /// A cache block's magic/footer did not validate, or its object table
    /// is inconsistent.
    #[error("cache block corrupt: {0}")]
    DataCorruption(String),

    /// A cache block could not grow within the platform's file-size
    /// ceiling.
    #[error("cache out of space")]
    OutOfSpace,

    /// Allocation failed for reasons unrelated to disk space.
    #[error("out of memory")]
    OutOfMemory,

    /// The op was cancelled before it began running.
    #[error("operation cancelled")]
    Cancelled,

    /// The op's wall-clock budget elapsed before it settled.
    #[error("operation timed out")]
    TimedOut,
}

impl From<io::Error> for OpError {
    fn from(e: io::Error) -> Self {
        OpError::Io(Arc::new(e))
    }
}

impl Clone for OpError {
    fn clone(&self) -> Self {
        match self {
            OpError::AlreadyExists(p) => OpError::AlreadyExists(p.clone()),
            OpError::NotFound(p) => OpError::NotFound(p.clone()),
            OpError::InvalidParent(p) => OpError::InvalidParent(p.clone()),
            OpError::CycleDetected(p) => OpError::CycleDetected(p.clone()),
            OpError::WrongConcreteType(p) => OpError::WrongConcreteType(p.clone()),
            OpError::Io(e) => OpError::Io(e.clone()),
            OpError::Deserialisation(s) => OpError::Deserialisation(s.clone()),
            OpError::StaleUid => OpError::StaleUid,
            OpError::DataCorruption(s) => OpError::DataCorruption(s.clone()),
            OpError::OutOfSpace => OpError::OutOfSpace,
            OpError::OutOfMemory => OpError::OutOfMemory,
            OpError::Cancelled => OpError::Cancelled,
            OpError::TimedOut => OpError::TimedOut,
        }
    }
}

impl PartialEq for OpError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (OpError::AlreadyExists(a), OpError::AlreadyExists(b)) => a == b,
            (OpError::NotFound(a), OpError::NotFound(b)) => a == b,
            (OpError::InvalidParent(a), OpError::InvalidParent(b)) => a == b,
            (OpError::CycleDetected(a), OpError::CycleDetected(b)) => a == b,
            (OpError::WrongConcreteType(a), OpError::WrongConcreteType(b)) => a == b,
            (OpError::Io(a), OpError::Io(b)) => a.kind() == b.kind() && a.to_string() == b.to_string(),
            (OpError::Deserialisation(a), OpError::Deserialisation(b)) => a == b,
            (OpError::StaleUid, OpError::StaleUid) => true,
            (OpError::DataCorruption(a), OpError::DataCorruption(b)) => a == b,
            (OpError::OutOfSpace, OpError::OutOfSpace) => true,
            (OpError::OutOfMemory, OpError::OutOfMemory) => true,
            (OpError::Cancelled, OpError::Cancelled) => true,
            (OpError::TimedOut, OpError::TimedOut) => true,
            _ => false,
        }
    }
}

impl OpError {
    /// `true` for errors the operation controller should retry with
    /// backoff rather than surface immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, OpError::Io(e) if matches!(
            e.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
        ))
    }

    /// `true` for errors that mark the target record `FAILED` rather than
    /// merely failing the op.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            OpError::Deserialisation(_) | OpError::StaleUid | OpError::DataCorruption(_)
        )
    }
}

/// Errors raised directly by [`crate::cache::block::CacheBlock`] operations,
/// independent of any particular op.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(Arc<io::Error>),
    #[error("stale cache uid")]
    StaleUid,
    #[error("read out of range")]
    OutOfRange,
    #[error("block corrupt: {0}")]
    Corrupt(String),
    #[error("out of space")]
    OutOfSpace,
}

impl From<io::Error> for CacheError {
    fn from(e: io::Error) -> Self {
        CacheError::Io(Arc::new(e))
    }
}

impl From<CacheError> for OpError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Io(e) => OpError::Io(e),
            CacheError::StaleUid => OpError::StaleUid,
            CacheError::OutOfRange => OpError::DataCorruption("read out of range".into()),
            CacheError::Corrupt(s) => OpError::DataCorruption(s),
            CacheError::OutOfSpace => OpError::OutOfSpace,
        }
    }
}

/// Errors raised directly by [`crate::source::SourceController`].
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("io error: {0}")]
    Io(Arc<io::Error>),
    #[error("asset not found: {0}")]
    NotFound(AssetPath),
}

impl From<io::Error> for SourceError {
    fn from(e: io::Error) -> Self {
        SourceError::Io(Arc::new(e))
    }
}

impl From<SourceError> for OpError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Io(e) => OpError::Io(e),
            SourceError::NotFound(p) => OpError::NotFound(p),
        }
    }
}
