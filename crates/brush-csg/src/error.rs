//! Error type shared by every kernel operation.

use thiserror::Error;

/// Why a geometric operation refused to produce a result.
///
/// Operations that fail never leave a half-modified polygon behind: the
/// receiver is consumed and the caller still holds its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsgError {
    #[error("operation requires a closed polygon")]
    OpenPolygon,

    #[error("operands do not lie on equivalent planes")]
    PlaneMismatch,

    #[error("polygon has no usable geometry")]
    InvalidPolygon,

    #[error("edge endpoints coincide")]
    DegenerateEdge,

    #[error("edge fragments do not close into a loop")]
    UnclosedLoop,

    #[error("loop walk exceeded {limit} iterations")]
    IterationLimit { limit: usize },

    #[error("edge would be consumed twice while flattening")]
    EdgeReused,

    #[error("scaled boundary intersects itself")]
    SelfIntersection,

    #[error("decomposition failed: {reason}")]
    Decomposition { reason: &'static str },

    #[error("plane clip produced no fragments")]
    ClipFailed,
}

pub type Result<T> = std::result::Result<T, CsgError>;
