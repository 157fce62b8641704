//! Diagnostics produced by unit derivation

use sbmlmath_formula::NodePath;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The formula cannot be checked as written (unknown symbol or unit).
    Error,
    /// Units were derived and disagree.
    Inconsistency,
    /// Units could not be determined; the result is not authoritative.
    Undetermined,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Inconsistency => write!(f, "inconsistency"),
            Self::Undetermined => write!(f, "undetermined"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
    UnresolvedSymbol,
    UnitMismatch,
    NonIntegerPowerConflict,
    RationalPowerConflict,
    UndeclaredUnits,
    /// Exponent arithmetic left the range of 64-bit rationals.
    ExponentOverflow,
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedSymbol => write!(f, "unresolved-symbol"),
            Self::UnitMismatch => write!(f, "unit-mismatch"),
            Self::NonIntegerPowerConflict => write!(f, "non-integer-power-conflict"),
            Self::RationalPowerConflict => write!(f, "rational-power-conflict"),
            Self::UndeclaredUnits => write!(f, "undeclared-units"),
            Self::ExponentOverflow => write!(f, "exponent-overflow"),
        }
    }
}

/// One problem found while deriving units
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitDiagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    /// Offending node, relative to the root passed to the checker.
    #[serde(serialize_with = "display_string")]
    pub location: NodePath,
    /// Infix rendering of the offending subtree.
    pub formula: String,
}

fn display_string<S: Serializer>(path: &NodePath, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(path)
}

impl UnitDiagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn inconsistency(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Inconsistency, code, message)
    }

    pub fn undetermined(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Undetermined, code, message)
    }

    fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            location: NodePath::root(),
            formula: String::new(),
        }
    }

    pub fn with_location(mut self, location: NodePath) -> Self {
        self.location = location;
        self
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = formula.into();
        self
    }

    /// Errors and inconsistencies; undetermined units are not failures.
    pub fn is_failure(&self) -> bool {
        self.severity != Severity::Undetermined
    }
}

impl fmt::Display for UnitDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] at {}: {}", self.severity, self.code, self.location, self.message)?;
        if !self.formula.is_empty() {
            write!(f, " in '{}'", self.formula)?;
        }
        Ok(())
    }
}

/// Receiver of diagnostics. Derivation never stops on a diagnostic.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: UnitDiagnostic);
}

impl DiagnosticSink for Vec<UnitDiagnostic> {
    fn report(&mut self, diagnostic: UnitDiagnostic) {
        self.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location_and_formula() {
        let diagnostic = UnitDiagnostic::inconsistency(DiagnosticCode::UnitMismatch, "bad")
            .with_location(NodePath::root().child(1))
            .with_formula("a + b");
        assert_eq!(
            diagnostic.to_string(),
            "inconsistency [unit-mismatch] at /1: bad in 'a + b'"
        );
    }

    #[test]
    fn undetermined_is_not_a_failure() {
        assert!(!UnitDiagnostic::undetermined(DiagnosticCode::UndeclaredUnits, "x").is_failure());
        assert!(UnitDiagnostic::error(DiagnosticCode::UnresolvedSymbol, "x").is_failure());
    }
}
