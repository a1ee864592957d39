//! Error types for STAMP resolution and typed values

use thiserror::Error;

use crate::stamp::ComponentId;
use crate::value::DataType;

/// Result type for resolution and codec operations
pub type Result<T> = std::result::Result<T, StampError>;

/// Errors raised by the versioning core.
///
/// An empty resolution result is never an error. Contradictions are only
/// raised when a caller explicitly asks for [`ContradictionPolicy::Fail`].
///
/// [`ContradictionPolicy::Fail`]: crate::resolve::ContradictionPolicy::Fail
#[derive(Error, Debug)]
pub enum StampError {
    #[error("Cyclic path graph: path {path} is its own ancestor")]
    CyclicPathGraph { path: ComponentId },

    #[error("Schema unresolved for assemblage {assemblage}: {visible} visible versions")]
    SchemaUnresolved { assemblage: ComponentId, visible: usize },

    #[error("No column reference is attached to this value; the name cannot be looked up")]
    NameUnavailable,

    #[error("Column index {index} out of range for assemblage {assemblage} ({columns} columns)")]
    ColumnIndexOutOfRange {
        assemblage: ComponentId,
        index: usize,
        columns: usize,
    },

    #[error("Component not found: {0}")]
    ComponentNotFound(ComponentId),

    #[error("Contradictory versions for component {component}: {count} tied winners")]
    Contradiction { component: ComponentId, count: usize },

    #[error("Malformed {data_type} value: {reason}")]
    MalformedValue { data_type: DataType, reason: String },

    #[error("Invalid array: {0}")]
    InvalidArray(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl StampError {
    /// Corrupt authored data; never retried
    pub fn is_integrity(&self) -> bool {
        matches!(self, StampError::CyclicPathGraph { .. })
    }

    /// Value-level failures a rendering path may swallow into a placeholder
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StampError::NameUnavailable | StampError::ColumnIndexOutOfRange { .. }
        )
    }
}
