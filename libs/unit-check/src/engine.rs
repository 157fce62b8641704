//! Unit derivation over formula trees
//!
//! Every node gets a [`DerivedUnits`]: a unit definition plus a flag saying
//! whether some leaf below had no declared units, in which case the unit is a
//! best guess. Problems go to a [`DiagnosticSink`] and never stop the walk,
//! so one call reports every problem in the formula.
//!
//! Powers and roots follow the legacy rules:
//!
//! - a dimensionless base with fully declared units accepts any exponent;
//! - an integer exponent raises the base; an integer root degree `r`
//!   requires every exponent of the base to be divisible by `r`;
//! - a rational `p/q` requires every exponent times `p` to be divisible by
//!   `q`;
//! - any other exponent is a `NonIntegerPowerConflict`.
//!
//! On conflict the node keeps the base's unit. Exponent arithmetic that
//! leaves the `i64` range is reported as undetermined, never wrapped.

use crate::diagnostics::{DiagnosticCode, DiagnosticSink, UnitDiagnostic};
use crate::symbols::SymbolTable;
use sbmlmath_formula::{
    format_formula, Constant, ExprNode, Function, NodePath, Number, NumberValue, Operator,
    Piecewise,
};
use sbmlmath_units::{Rational64, UnitDefinition, UnitKind};
use std::collections::HashMap;

/// Checker configuration
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Treat literals without units as declared dimensionless.
    pub numbers_are_dimensionless: bool,
    /// Units of `avogadro` when the symbol table has none.
    pub avogadro_units: UnitDefinition,
    /// Whether [`UnitChecker::check`] reports a result built on undeclared
    /// units.
    pub report_undeclared: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            numbers_are_dimensionless: false,
            avogadro_units: UnitDefinition::of(UnitKind::Mole, -1),
            report_undeclared: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedUnits {
    pub units: UnitDefinition,
    /// Some contributing leaf had no declared units.
    pub has_undeclared_units: bool,
}

impl DerivedUnits {
    pub fn declared(units: UnitDefinition) -> Self {
        Self {
            units,
            has_undeclared_units: false,
        }
    }

    pub fn undeclared(units: UnitDefinition) -> Self {
        Self {
            units,
            has_undeclared_units: true,
        }
    }

    fn dimensionless() -> Self {
        Self::declared(UnitDefinition::dimensionless())
    }

    fn unknown() -> Self {
        Self::undeclared(UnitDefinition::dimensionless())
    }
}

pub struct UnitChecker<'a, T: SymbolTable + ?Sized> {
    symbols: &'a T,
    options: CheckOptions,
}

impl<'a, T: SymbolTable + ?Sized> UnitChecker<'a, T> {
    pub fn new(symbols: &'a T) -> Self {
        Self::with_options(symbols, CheckOptions::default())
    }

    pub fn with_options(symbols: &'a T, options: CheckOptions) -> Self {
        Self { symbols, options }
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    /// Derive the units of `node`, reporting problems to `sink`.
    pub fn derive(&self, node: &ExprNode, sink: &mut dyn DiagnosticSink) -> DerivedUnits {
        let mut walk = Derivation {
            checker: self,
            sink,
            scope: HashMap::new(),
            calls: Vec::new(),
        };
        let derived = walk.node(node, &NodePath::root());
        tracing::trace!(
            formula = %node,
            units = %derived.units,
            undeclared = derived.has_undeclared_units,
            "derived units"
        );
        derived
    }

    /// Derive, then compare with the units the formula must have.
    pub fn check(
        &self,
        node: &ExprNode,
        expected: &UnitDefinition,
        sink: &mut dyn DiagnosticSink,
    ) -> DerivedUnits {
        let derived = self.derive(node, sink);
        let diagnostic = if derived.has_undeclared_units {
            self.options.report_undeclared.then(|| {
                UnitDiagnostic::undetermined(
                    DiagnosticCode::UndeclaredUnits,
                    format!(
                        "units cannot be fully determined; best estimate is '{}'",
                        derived.units
                    ),
                )
            })
        } else if !derived.units.equivalent(expected) {
            Some(UnitDiagnostic::inconsistency(
                DiagnosticCode::UnitMismatch,
                format!(
                    "expected units '{}' but the formula has units '{}'",
                    expected, derived.units
                ),
            ))
        } else {
            None
        };
        if let Some(diagnostic) = diagnostic {
            emit(sink, diagnostic.with_formula(format_formula(node)));
        }
        derived
    }
}

fn emit(sink: &mut dyn DiagnosticSink, diagnostic: UnitDiagnostic) {
    tracing::debug!(
        severity = %diagnostic.severity,
        code = %diagnostic.code,
        location = %diagnostic.location,
        message = %diagnostic.message,
        "unit diagnostic"
    );
    sink.report(diagnostic);
}

/// Exponent or root degree as far as it can be read off the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Exponent {
    Integer(i64),
    Rational(i64, i64),
    /// A literal whose value does not fit the exponent arithmetic.
    OutOfRange,
    Other,
}

/// Whole reals strictly inside the `i64` range, excluding `i64::MIN`.
const INTEGRAL_REAL_LIMIT: f64 = i64::MAX as f64;

fn classify(node: &ExprNode) -> Exponent {
    match node {
        ExprNode::Number(Number { value, .. }) => match *value {
            NumberValue::Integer(i) if i == i64::MIN => Exponent::OutOfRange,
            NumberValue::Integer(i) => Exponent::Integer(i),
            NumberValue::Rational {
                numerator,
                denominator,
            } => {
                if numerator == i64::MIN || denominator == i64::MIN {
                    Exponent::OutOfRange
                } else {
                    Exponent::Rational(numerator, denominator)
                }
            }
            NumberValue::Real(_) | NumberValue::RealWithExponent { .. } => {
                match Number::from(value.clone()).as_f64() {
                    Some(v) if v.is_finite() && v.ceil() == v => {
                        if v.abs() < INTEGRAL_REAL_LIMIT {
                            Exponent::Integer(v as i64)
                        } else {
                            Exponent::OutOfRange
                        }
                    }
                    _ => Exponent::Other,
                }
            }
            NumberValue::Constant(_) => Exponent::Other,
        },
        ExprNode::Operator {
            op: Operator::Minus,
            args,
        } if args.len() == 1 => match classify(&args[0]) {
            Exponent::Integer(i) => Exponent::Integer(-i),
            Exponent::Rational(p, q) => Exponent::Rational(-p, q),
            other => other,
        },
        ExprNode::Semantics(sem) => classify(&sem.inner),
        _ => Exponent::Other,
    }
}

/// `p/q` as an exponent; `None` for a zero denominator. Both parts are
/// never `i64::MIN`, so normalizing the sign cannot overflow.
fn ratio(p: i64, q: i64) -> Option<Rational64> {
    (q != 0).then(|| Rational64::new(p, q))
}

/// Every non-dimensionless exponent of `units` is an integer.
fn has_integer_exponents(units: &UnitDefinition) -> bool {
    units
        .terms()
        .iter()
        .filter(|term| !term.kind.is_dimensionless())
        .all(|term| term.exponent.is_integer())
}

/// Units of a power or root that passed its checks, keeping the base's
/// undeclared flag.
fn raised(base: &DerivedUnits, units: UnitDefinition) -> DerivedUnits {
    DerivedUnits {
        units,
        has_undeclared_units: base.has_undeclared_units,
    }
}

struct Derivation<'c, 'a, T: SymbolTable + ?Sized> {
    checker: &'c UnitChecker<'a, T>,
    sink: &'c mut dyn DiagnosticSink,
    /// Units bound to lambda parameters.
    scope: HashMap<String, DerivedUnits>,
    /// Function definitions being expanded, innermost last.
    calls: Vec<String>,
}

impl<'c, 'a, T: SymbolTable + ?Sized> Derivation<'c, 'a, T> {
    fn report(&mut self, diagnostic: UnitDiagnostic, path: &NodePath, node: &ExprNode) {
        let diagnostic = diagnostic
            .with_location(path.clone())
            .with_formula(format_formula(node));
        emit(self.sink, diagnostic);
    }

    fn node(&mut self, node: &ExprNode, path: &NodePath) -> DerivedUnits {
        match node {
            ExprNode::Number(number) => self.number(number, path, node),
            ExprNode::Identifier(name) => self.identifier(name, path, node),
            ExprNode::Time(_) => match self.checker.symbols.time_units() {
                Some(units) => DerivedUnits::declared(units),
                None => DerivedUnits::unknown(),
            },
            ExprNode::Operator { op, args } => self.operator(*op, args, path, node),
            ExprNode::Function { func, args } => self.function(func, args, path, node),
            ExprNode::Piecewise(pw) => self.piecewise(pw, path, node),
            ExprNode::Lambda(lambda) => {
                let saved = self.scope.clone();
                for param in &lambda.params {
                    self.scope.insert(param.clone(), DerivedUnits::unknown());
                }
                let derived = self.node(&lambda.body, &path.child(0));
                self.scope = saved;
                derived
            }
            ExprNode::Semantics(sem) => self.node(&sem.inner, &path.child(0)),
        }
    }

    fn number(&mut self, number: &Number, path: &NodePath, node: &ExprNode) -> DerivedUnits {
        if let Some(id) = &number.units {
            return match self.checker.symbols.unit_definition(id) {
                Some(units) => DerivedUnits::declared(units),
                None => {
                    self.report(
                        UnitDiagnostic::error(
                            DiagnosticCode::UnresolvedSymbol,
                            format!("unknown units '{}'", id),
                        ),
                        path,
                        node,
                    );
                    DerivedUnits::unknown()
                }
            };
        }

        match number.value {
            NumberValue::Constant(
                Constant::Pi | Constant::ExponentialE | Constant::True | Constant::False,
            ) => DerivedUnits::dimensionless(),
            NumberValue::Constant(Constant::Avogadro) => DerivedUnits::declared(
                self.checker
                    .symbols
                    .avogadro_units()
                    .unwrap_or_else(|| self.checker.options.avogadro_units.clone()),
            ),
            _ if self.checker.options.numbers_are_dimensionless => DerivedUnits::dimensionless(),
            _ => DerivedUnits::unknown(),
        }
    }

    fn identifier(&mut self, name: &str, path: &NodePath, node: &ExprNode) -> DerivedUnits {
        if let Some(bound) = self.scope.get(name) {
            return bound.clone();
        }
        match self.checker.symbols.resolve(name) {
            Some(symbol) => match symbol.units {
                Some(units) => DerivedUnits::declared(units),
                None => DerivedUnits::unknown(),
            },
            None => {
                self.report(
                    UnitDiagnostic::error(
                        DiagnosticCode::UnresolvedSymbol,
                        format!("no symbol named '{}'", name),
                    ),
                    path,
                    node,
                );
                DerivedUnits::unknown()
            }
        }
    }

    fn children(&mut self, args: &[ExprNode], path: &NodePath) -> Vec<DerivedUnits> {
        args.iter()
            .enumerate()
            .map(|(i, arg)| self.node(arg, &path.child(i)))
            .collect()
    }

    fn operator(
        &mut self,
        op: Operator,
        args: &[ExprNode],
        path: &NodePath,
        node: &ExprNode,
    ) -> DerivedUnits {
        match (op, args) {
            (Operator::Minus, [operand]) => self.node(operand, &path.child(0)),
            (Operator::Plus, _) | (Operator::Minus, _) => {
                let derived = self.children(args, path);
                self.agree(derived, path, node)
            }
            (Operator::Times, _) => {
                let derived = self.children(args, path);
                let units = derived
                    .iter()
                    .fold(UnitDefinition::dimensionless(), |acc, d| acc.multiply(&d.units));
                DerivedUnits {
                    units,
                    has_undeclared_units: derived.iter().any(|d| d.has_undeclared_units),
                }
            }
            (Operator::Divide, [numerator, denominator]) => {
                let n = self.node(numerator, &path.child(0));
                let d = self.node(denominator, &path.child(1));
                DerivedUnits {
                    units: n.units.divide(&d.units),
                    has_undeclared_units: n.has_undeclared_units || d.has_undeclared_units,
                }
            }
            (Operator::Power, [base, exponent]) => self.power(base, exponent, path, node),
            (op, _) if op.is_relational() => {
                let derived = self.children(args, path);
                self.agree(derived, path, node);
                DerivedUnits::dimensionless()
            }
            (op, _) if op.is_logical() => {
                self.children(args, path);
                DerivedUnits::dimensionless()
            }
            _ => {
                tracing::debug!(operator = op.as_str(), count = args.len(), "operator with wrong arity");
                self.children(args, path);
                DerivedUnits::unknown()
            }
        }
    }

    /// Operands that must share units. The first declared operand sets the
    /// units of the result; later ones that differ are mismatches.
    fn agree(&mut self, derived: Vec<DerivedUnits>, path: &NodePath, node: &ExprNode) -> DerivedUnits {
        self.agree_at(
            derived
                .into_iter()
                .enumerate()
                .map(|(i, d)| (path.child(i), d))
                .collect(),
            node,
        )
    }

    fn agree_at(&mut self, derived: Vec<(NodePath, DerivedUnits)>, node: &ExprNode) -> DerivedUnits {
        let mut reference: Option<DerivedUnits> = None;
        for (path, d) in derived.iter() {
            if d.has_undeclared_units {
                continue;
            }
            match &reference {
                None => reference = Some(d.clone()),
                Some(r) if !r.units.equivalent(&d.units) => {
                    let message = format!(
                        "operand has units '{}' but '{}' was expected",
                        d.units, r.units
                    );
                    self.report(
                        UnitDiagnostic::inconsistency(DiagnosticCode::UnitMismatch, message),
                        path,
                        node,
                    );
                }
                Some(_) => {}
            }
        }
        match reference {
            Some(r) => r,
            None => derived
                .into_iter()
                .next()
                .map(|(_, d)| d)
                .unwrap_or_else(DerivedUnits::unknown),
        }
    }

    fn conflict(&mut self, code: DiagnosticCode, message: String, path: &NodePath, node: &ExprNode) {
        self.report(UnitDiagnostic::inconsistency(code, message), path, node);
    }

    fn overflow(&mut self, base: DerivedUnits, path: &NodePath, node: &ExprNode) -> DerivedUnits {
        self.report(
            UnitDiagnostic::undetermined(
                DiagnosticCode::ExponentOverflow,
                format!("exponents of '{}' leave the 64-bit range", base.units),
            ),
            path,
            node,
        );
        DerivedUnits::undeclared(base.units)
    }

    fn power(
        &mut self,
        base: &ExprNode,
        exponent: &ExprNode,
        path: &NodePath,
        node: &ExprNode,
    ) -> DerivedUnits {
        let a = self.node(base, &path.child(0));
        self.node(exponent, &path.child(1));
        if !a.has_undeclared_units && a.units.is_dimensionless() {
            return DerivedUnits::dimensionless();
        }

        match classify(exponent) {
            Exponent::Integer(n) => match a.units.raise(Rational64::from_integer(n)) {
                Ok(units) => raised(&a, units),
                Err(_) => self.overflow(a, path, node),
            },
            Exponent::Rational(p, q) => {
                let Some(power) = ratio(p, q) else {
                    return self.non_integer_power(a, path, node);
                };
                match a.units.raise(power) {
                    Ok(units) if has_integer_exponents(&units) => raised(&a, units),
                    Ok(_) => {
                        self.conflict(
                            DiagnosticCode::RationalPowerConflict,
                            format!("'{}' raised to {}/{} has fractional exponents", a.units, p, q),
                            path,
                            node,
                        );
                        a
                    }
                    Err(_) => self.overflow(a, path, node),
                }
            }
            Exponent::OutOfRange => self.overflow(a, path, node),
            Exponent::Other => self.non_integer_power(a, path, node),
        }
    }

    fn non_integer_power(&mut self, a: DerivedUnits, path: &NodePath, node: &ExprNode) -> DerivedUnits {
        self.conflict(
            DiagnosticCode::NonIntegerPowerConflict,
            format!("'{}' raised to a non-integer power", a.units),
            path,
            node,
        );
        a
    }

    fn root(
        &mut self,
        degree: &ExprNode,
        radicand: &ExprNode,
        path: &NodePath,
        node: &ExprNode,
    ) -> DerivedUnits {
        self.node(degree, &path.child(0));
        let a = self.node(radicand, &path.child(1));
        if !a.has_undeclared_units && a.units.is_dimensionless() {
            return DerivedUnits::dimensionless();
        }

        match classify(degree) {
            Exponent::Integer(r) if r != 0 => {
                let Some(power) = ratio(1, r) else {
                    return self.overflow(a, path, node);
                };
                match a.units.raise(power) {
                    Ok(units) if has_integer_exponents(&units) => raised(&a, units),
                    Ok(_) => {
                        self.conflict(
                            DiagnosticCode::NonIntegerPowerConflict,
                            format!("root of degree {} of '{}' has fractional exponents", r, a.units),
                            path,
                            node,
                        );
                        a
                    }
                    Err(_) => self.overflow(a, path, node),
                }
            }
            Exponent::Rational(p, q) if p != 0 && q != 0 => {
                let (Some(check), Some(power)) = (ratio(p, q), ratio(q, p)) else {
                    return self.overflow(a, path, node);
                };
                match (a.units.raise(check), a.units.raise(power)) {
                    (Ok(scaled), Ok(units)) if has_integer_exponents(&scaled) => raised(&a, units),
                    (Ok(_), Ok(_)) => {
                        self.conflict(
                            DiagnosticCode::RationalPowerConflict,
                            format!(
                                "root of degree {}/{} of '{}' has fractional exponents",
                                p, q, a.units
                            ),
                            path,
                            node,
                        );
                        a
                    }
                    _ => self.overflow(a, path, node),
                }
            }
            Exponent::OutOfRange => self.overflow(a, path, node),
            _ => {
                self.conflict(
                    DiagnosticCode::NonIntegerPowerConflict,
                    format!("root of '{}' with a non-integer degree", a.units),
                    path,
                    node,
                );
                a
            }
        }
    }

    fn function(
        &mut self,
        func: &Function,
        args: &[ExprNode],
        path: &NodePath,
        node: &ExprNode,
    ) -> DerivedUnits {
        match (func, args) {
            (Function::Abs | Function::Ceiling | Function::Floor, [arg]) => {
                self.node(arg, &path.child(0))
            }
            (Function::Root, [degree, radicand]) => self.root(degree, radicand, path, node),
            (Function::Delay, [expr, delay]) => {
                let x = self.node(expr, &path.child(0));
                let tau = self.node(delay, &path.child(1));
                if let Some(time) = self.checker.symbols.time_units() {
                    if !tau.has_undeclared_units && !tau.units.equivalent(&time) {
                        self.report(
                            UnitDiagnostic::inconsistency(
                                DiagnosticCode::UnitMismatch,
                                format!(
                                    "delay has units '{}' but time is measured in '{}'",
                                    tau.units, time
                                ),
                            ),
                            &path.child(1),
                            node,
                        );
                    }
                }
                x
            }
            (Function::User(name), _) => self.call(name, args, path, node),
            _ => {
                for (i, arg) in args.iter().enumerate() {
                    self.expect_dimensionless(func, arg, &path.child(i), node);
                }
                DerivedUnits::dimensionless()
            }
        }
    }

    fn expect_dimensionless(&mut self, func: &Function, arg: &ExprNode, path: &NodePath, node: &ExprNode) {
        let d = self.node(arg, path);
        if !d.has_undeclared_units && !d.units.is_dimensionless() {
            self.report(
                UnitDiagnostic::inconsistency(
                    DiagnosticCode::UnitMismatch,
                    format!(
                        "argument of '{}' should be dimensionless but has units '{}'",
                        func.name(),
                        d.units
                    ),
                ),
                path,
                node,
            );
        }
    }

    /// Derive a user function call by deriving the definition's body with
    /// its parameters bound to the argument units.
    fn call(&mut self, name: &str, args: &[ExprNode], path: &NodePath, node: &ExprNode) -> DerivedUnits {
        let derived = self.children(args, path);
        let checker = self.checker;

        let Some(lambda) = checker.symbols.function_definition(name) else {
            self.report(
                UnitDiagnostic::error(
                    DiagnosticCode::UnresolvedSymbol,
                    format!("no function definition named '{}'", name),
                ),
                path,
                node,
            );
            return DerivedUnits::unknown();
        };
        if lambda.params.len() != derived.len() {
            self.report(
                UnitDiagnostic::error(
                    DiagnosticCode::UnresolvedSymbol,
                    format!(
                        "'{}' takes {} arguments, got {}",
                        name,
                        lambda.params.len(),
                        derived.len()
                    ),
                ),
                path,
                node,
            );
            return DerivedUnits::unknown();
        }
        if self.calls.iter().any(|call| call == name) {
            self.report(
                UnitDiagnostic::error(
                    DiagnosticCode::UnresolvedSymbol,
                    format!("'{}' calls itself", name),
                ),
                path,
                node,
            );
            return DerivedUnits::unknown();
        }

        let mut calls = self.calls.clone();
        calls.push(name.to_string());
        let mut nested: Vec<UnitDiagnostic> = Vec::new();
        let result = Derivation {
            checker,
            sink: &mut nested,
            scope: lambda.params.iter().cloned().zip(derived).collect(),
            calls,
        }
        .node(&lambda.body, &NodePath::root());

        // Body locations mean nothing in the caller's tree.
        for diagnostic in nested {
            let message = format!("in function '{}': {}", name, diagnostic.message);
            emit(
                self.sink,
                UnitDiagnostic {
                    message,
                    location: path.clone(),
                    ..diagnostic
                },
            );
        }
        result
    }

    fn piecewise(&mut self, pw: &Piecewise, path: &NodePath, node: &ExprNode) -> DerivedUnits {
        let mut values = Vec::with_capacity(pw.pieces.len() + 1);
        for (i, piece) in pw.pieces.iter().enumerate() {
            let value_path = path.child(2 * i);
            values.push((value_path.clone(), self.node(&piece.value, &value_path)));
            self.node(&piece.condition, &path.child(2 * i + 1));
        }
        if let Some(otherwise) = &pw.otherwise {
            let otherwise_path = path.child(2 * pw.pieces.len());
            values.push((otherwise_path.clone(), self.node(otherwise, &otherwise_path)));
        }
        self.agree_at(values, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::ModelSymbols;
    use sbmlmath_formula::parse_formula;

    fn symbols() -> ModelSymbols {
        ModelSymbols::new()
            .with_time_units("second")
            .unwrap()
            .with_parameter("x", Some("metre"))
            .unwrap()
            .with_parameter("t", Some("second"))
            .unwrap()
            .with_parameter("free", None)
            .unwrap()
    }

    fn derive(formula: &str) -> (DerivedUnits, Vec<UnitDiagnostic>) {
        let symbols = symbols();
        let checker = UnitChecker::new(&symbols);
        let mut sink = Vec::new();
        let derived = checker.derive(&parse_formula(formula).unwrap(), &mut sink);
        (derived, sink)
    }

    #[test]
    fn classify_reads_literal_exponents() {
        assert_eq!(classify(&ExprNode::integer(3)), Exponent::Integer(3));
        assert_eq!(classify(&ExprNode::real(2.0)), Exponent::Integer(2));
        assert_eq!(classify(&ExprNode::real(2.5)), Exponent::Other);
        assert_eq!(classify(&ExprNode::rational(1, 2)), Exponent::Rational(1, 2));
        assert_eq!(
            classify(&ExprNode::negate(ExprNode::integer(2))),
            Exponent::Integer(-2)
        );
        assert_eq!(classify(&ExprNode::ident("n")), Exponent::Other);
    }

    #[test]
    fn classify_flags_literals_beyond_i64() {
        assert_eq!(classify(&ExprNode::real(1e300)), Exponent::OutOfRange);
        assert_eq!(classify(&ExprNode::real(-1e19)), Exponent::OutOfRange);
        assert_eq!(classify(&ExprNode::integer(i64::MIN)), Exponent::OutOfRange);
        assert_eq!(
            classify(&ExprNode::negate(ExprNode::rational(i64::MIN, 3))),
            Exponent::OutOfRange
        );
        assert_eq!(
            classify(&ExprNode::negate(ExprNode::integer(i64::MAX))),
            Exponent::Integer(-i64::MAX)
        );
    }

    #[test]
    fn nested_function_diagnostics_reach_the_sink() {
        let symbols = symbols()
            .with_function("half", "lambda(y, root(2, y))")
            .unwrap();
        let mut sink = Vec::new();
        UnitChecker::new(&symbols).derive(&parse_formula("half(x)").unwrap(), &mut sink);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].code, DiagnosticCode::NonIntegerPowerConflict);
        assert!(sink[0].location.is_root());
    }

    #[test]
    fn product_and_quotient() {
        let (derived, diagnostics) = derive("x * x / t");
        assert!(diagnostics.is_empty());
        let expected: UnitDefinition = "metre^2*second^-1".parse().unwrap();
        assert!(derived.units.equivalent(&expected));
        assert!(!derived.has_undeclared_units);
    }

    #[test]
    fn bare_numbers_are_undeclared() {
        let (derived, _) = derive("2 * x");
        assert!(derived.has_undeclared_units);
        assert!(derived.units.equivalent(&UnitDefinition::of(UnitKind::Metre, 1)));
    }

    #[test]
    fn numbers_can_count_as_dimensionless() {
        let symbols = symbols();
        let options = CheckOptions {
            numbers_are_dimensionless: true,
            ..CheckOptions::default()
        };
        let checker = UnitChecker::with_options(&symbols, options);
        let derived = checker.derive(&parse_formula("2 * x").unwrap(), &mut Vec::new());
        assert!(!derived.has_undeclared_units);
    }

    #[test]
    fn unresolved_symbol_is_an_error() {
        let (derived, diagnostics) = derive("x + nope");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::UnresolvedSymbol);
        assert_eq!(diagnostics[0].severity, crate::Severity::Error);
        assert_eq!(diagnostics[0].location.to_string(), "/1");
        // The declared operand still decides the result.
        assert!(!derived.has_undeclared_units);
    }

    #[test]
    fn transcendental_arguments_must_be_dimensionless() {
        let (derived, diagnostics) = derive("exp(x) + sin(pi)");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].location.to_string(), "/0/0");
        assert_eq!(diagnostics[0].formula, "exp(x)");
        assert!(derived.units.is_dimensionless());
    }

    #[test]
    fn abs_keeps_units() {
        let (derived, _) = derive("abs(x)");
        assert!(derived.units.equivalent(&UnitDefinition::of(UnitKind::Metre, 1)));
    }

    #[test]
    fn delay_must_be_in_time_units() {
        let (derived, diagnostics) = derive("delay(x, t)");
        assert!(diagnostics.is_empty());
        assert!(derived.units.equivalent(&UnitDefinition::of(UnitKind::Metre, 1)));

        let (_, diagnostics) = derive("delay(x, x)");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].location.to_string(), "/1");
    }

    #[test]
    fn relational_operands_must_agree() {
        let (derived, diagnostics) = derive("gt(x, t)");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::UnitMismatch);
        assert!(derived.units.is_dimensionless());
        assert!(!derived.has_undeclared_units);
    }

    #[test]
    fn parameter_without_units_is_undeclared() {
        let (derived, diagnostics) = derive("free + x");
        assert!(diagnostics.is_empty());
        assert!(derived.units.equivalent(&UnitDefinition::of(UnitKind::Metre, 1)));
    }

    #[test]
    fn symbolic_power_conflicts() {
        let (_, diagnostics) = derive("x^free");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::NonIntegerPowerConflict);
        assert!(diagnostics[0].location.is_root());
    }

    #[test]
    fn undeclared_base_still_checks_exponent() {
        let (derived, diagnostics) = derive("(2 * x)^free");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::NonIntegerPowerConflict);
        assert!(derived.has_undeclared_units);

        let (derived, diagnostics) = derive("(2 * x)^2");
        assert!(diagnostics.is_empty());
        assert!(derived.has_undeclared_units);
        assert!(derived.units.equivalent(&UnitDefinition::of(UnitKind::Metre, 2)));
    }
}
