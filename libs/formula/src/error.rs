//! Error types for formula trees and the infix syntax

use crate::ast::Arity;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Infix text did not match the formula grammar.
    #[error("syntax error at position {position}: expected {expected}")]
    Syntax { position: usize, expected: String },

    /// A node would end up with a child count outside its allowed range.
    #[error("'{node}' takes {expected}, got {count}")]
    InvalidArity {
        node: String,
        count: usize,
        expected: Arity,
    },

    #[error("child index {index} is out of range for '{node}' with {len} children")]
    IndexOutOfRange {
        node: String,
        index: usize,
        len: usize,
    },

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl Error {
    pub(crate) fn syntax(position: usize, expected: impl Into<String>) -> Self {
        Error::Syntax {
            position,
            expected: expected.into(),
        }
    }
}
