//! Formula expression trees and the legacy infix formula syntax
//!
//! ```text
//! "k1 * S1 / (Km + S1)"
//!      |
//!   Lexer -> Tokens
//!      |
//!   Parser -> ExprNode
//!      |
//!   Formatter -> "k1 * S1 / (Km + S1)"
//! ```
//!
//! The same [`ExprNode`] is what the MathML reader produces and what the
//! unit checker walks.

pub mod ast;
pub mod error;
pub mod formatter;
pub mod lexer;
pub mod parser;
pub mod token;

// Re-export main types
pub use ast::{
    Annotation, Arity, Constant, ExprNode, Function, Lambda, NodePath, Number, NumberValue,
    Operator, Piece, Piecewise, Semantics,
};
pub use error::{Error, Result};
pub use formatter::format_formula;
pub use parser::{parse_formula, parse_formula_with, ParseOptions};
