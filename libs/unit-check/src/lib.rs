//! Unit derivation and consistency checking for formula trees
//!
//! ```text
//! ExprNode + SymbolTable
//!      |
//!   UnitChecker::derive -> DerivedUnits
//!      |
//!   DiagnosticSink <- UnitDiagnostic*
//! ```

pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod symbols;

pub use diagnostics::{DiagnosticCode, DiagnosticSink, Severity, UnitDiagnostic};
pub use engine::{CheckOptions, DerivedUnits, UnitChecker};
pub use error::{Error, Result};
pub use symbols::{ModelSymbols, ResolvedSymbol, SymbolKind, SymbolTable};
