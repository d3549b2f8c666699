use thiserror::Error;

use crate::cell::CellId;
use crate::value::{Value, ValueType};

pub type Result<T> = std::result::Result<T, CellError>;

/// Failures of a cell write. Always synchronous and local to the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: &'static str,
    },

    #[error("cell {cell} is read-only")]
    Immutable { cell: CellId },
}

impl CellError {
    #[must_use]
    pub fn type_mismatch(expected: &ValueType, found: &Value) -> Self {
        Self::TypeMismatch {
            expected: expected.name(),
            found: found.kind_name(),
        }
    }
}
