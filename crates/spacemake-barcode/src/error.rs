//! Error types for structure parsing and mismatch budgets.

use thiserror::Error;

/// Errors raised while parsing a barcode structure expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// The expression does not match `r(1|2)` followed by one or more slices.
    #[error("'{expression}' does not match the structure grammar {grammar}")]
    Grammar {
        expression: String,
        grammar: &'static str,
    },

    /// A slice uses a step of zero.
    #[error("'{expression}': slice step cannot be zero")]
    ZeroStep { expression: String },

    /// A slice bound does not fit in a 64-bit integer.
    #[error("'{expression}': slice bound '{bound}' is out of range")]
    BoundOutOfRange { expression: String, bound: String },
}

/// Errors raised while computing a mismatch budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MismatchError {
    #[error("cannot compute a mismatch budget without any index sequences")]
    NoIndices,

    /// Two indices of different length were compared.
    #[error("index '{first}' ({first_len} nt) and '{second}' ({second_len} nt) differ in length")]
    LengthMismatch {
        first: String,
        first_len: usize,
        second: String,
        second_len: usize,
    },
}
