//! Unit derivation over parsed formulas

use sbmlmath_formula::{parse_formula, ExprNode};
use sbmlmath_unit_check::{
    CheckOptions, DerivedUnits, DiagnosticCode, ModelSymbols, Severity, UnitChecker,
    UnitDiagnostic,
};
use sbmlmath_units::UnitDefinition;

const MODEL: &str = r#"{
  "timeUnits": "second",
  "substanceUnits": "mole",
  "extentUnits": "mole",
  "unitDefinitions": {
    "per_second": "second^-1",
    "cubic_metre": "metre^3",
    "quartic_metre": "metre^4"
  },
  "compartments": { "cell": { "units": "litre" } },
  "species": {
    "S1": { "compartment": "cell" },
    "S2": { "compartment": "cell", "hasOnlySubstanceUnits": true }
  },
  "parameters": {
    "a": { "units": "metre" },
    "b": { "units": "second" },
    "c": { "units": "second" },
    "d": { "units": "dimensionless" },
    "v": { "units": "cubic_metre" },
    "q": { "units": "quartic_metre" },
    "k": { "units": "per_second" },
    "n": {}
  },
  "reactions": ["R1"],
  "functionDefinitions": {
    "sq": "lambda(y, y * y)",
    "add": "lambda(p, r, p + r)",
    "loop": "lambda(z, loop(z))"
  }
}"#;

fn model() -> ModelSymbols {
    ModelSymbols::from_json(MODEL).unwrap()
}

fn units(text: &str) -> UnitDefinition {
    text.parse().unwrap()
}

fn derive(formula: &str) -> (DerivedUnits, Vec<UnitDiagnostic>) {
    let symbols = model();
    let checker = UnitChecker::new(&symbols);
    let mut sink = Vec::new();
    let derived = checker.derive(&parse_formula(formula).unwrap(), &mut sink);
    (derived, sink)
}

fn codes(diagnostics: &[UnitDiagnostic]) -> Vec<DiagnosticCode> {
    diagnostics.iter().map(|d| d.code).collect()
}

#[test]
fn test_dimensionless_base_accepts_any_root() {
    for formula in ["root(n, d)", "root((1/3), d)", "root(3, d)", "d^n", "d^(2/5)", "sqrt(d)"] {
        let (derived, diagnostics) = derive(formula);
        assert!(diagnostics.is_empty(), "{}: {:?}", formula, diagnostics);
        assert!(derived.units.is_dimensionless(), "{}", formula);
        assert!(!derived.has_undeclared_units, "{}", formula);
    }
}

#[test]
fn test_integer_root_of_odd_exponent_conflicts() {
    for formula in ["root(2, v)", "sqrt(v)", "root(2.0, v)"] {
        let (derived, diagnostics) = derive(formula);
        assert_eq!(
            codes(&diagnostics),
            vec![DiagnosticCode::NonIntegerPowerConflict],
            "{}",
            formula
        );
        assert!(diagnostics[0].location.is_root());
        // Best effort: the radicand's units.
        assert!(derived.units.equivalent(&units("metre^3")), "{}", formula);
    }
}

#[test]
fn test_rational_root_degree() {
    let (derived, diagnostics) = derive("root((2/1), q)");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert!(derived.units.equivalent(&units("metre^2")));
}

#[test]
fn test_integer_roots_and_powers() {
    let (derived, diagnostics) = derive("root(3, v)");
    assert!(diagnostics.is_empty());
    assert!(derived.units.equivalent(&units("metre")));

    let (derived, diagnostics) = derive("a^3 / v");
    assert!(diagnostics.is_empty());
    assert!(derived.units.is_dimensionless());

    let (derived, _) = derive("b^-1");
    assert!(derived.units.equivalent(&units("second^-1")));
}

#[test]
fn test_rational_powers() {
    let (derived, diagnostics) = derive("q^(1/2)");
    assert!(diagnostics.is_empty());
    assert!(derived.units.equivalent(&units("metre^2")));

    let (_, diagnostics) = derive("a^(1/2)");
    assert_eq!(codes(&diagnostics), vec![DiagnosticCode::RationalPowerConflict]);

    let (_, diagnostics) = derive("a^2.5");
    assert_eq!(codes(&diagnostics), vec![DiagnosticCode::NonIntegerPowerConflict]);
}

#[test]
fn test_problems_accumulate_in_one_pass() {
    let (_, diagnostics) = derive("(a + b) * sqrt(c^3)");
    assert_eq!(
        codes(&diagnostics),
        vec![
            DiagnosticCode::UnitMismatch,
            DiagnosticCode::NonIntegerPowerConflict
        ]
    );
    assert_eq!(diagnostics[0].location.to_string(), "/0/1");
    assert_eq!(diagnostics[0].formula, "a + b");
    assert_eq!(diagnostics[1].location.to_string(), "/1");
    assert_eq!(diagnostics[1].formula, "sqrt(c^3)");
}

/// A mismatched sum keeps the units of its left operand, so the answer
/// depends on operand order.
#[test]
fn test_mismatched_sum_keeps_left_operand_units() {
    let (derived, diagnostics) = derive("a + b");
    assert_eq!(diagnostics.len(), 1);
    assert!(derived.units.equivalent(&units("metre")));

    let (derived, diagnostics) = derive("b + a");
    assert_eq!(diagnostics.len(), 1);
    assert!(derived.units.equivalent(&units("second")));
}

#[test]
fn test_undeclared_operand_takes_declared_units() {
    let (derived, diagnostics) = derive("2 + a");
    assert!(diagnostics.is_empty());
    assert!(derived.units.equivalent(&units("metre")));
    assert!(!derived.has_undeclared_units);

    let (derived, _) = derive("2 + 3");
    assert!(derived.has_undeclared_units);
}

#[test]
fn test_species_and_reaction_units() {
    let (derived, _) = derive("S1");
    assert!(derived.units.equivalent(&units("mole*litre^-1")));
    let (derived, _) = derive("S2");
    assert!(derived.units.equivalent(&units("mole")));
    let (derived, _) = derive("R1");
    assert!(derived.units.equivalent(&units("mole*second^-1")));
}

#[test]
fn test_piecewise_values_must_agree() {
    let (derived, diagnostics) = derive("piecewise(a, gt(b, c), b)");
    assert_eq!(codes(&diagnostics), vec![DiagnosticCode::UnitMismatch]);
    assert_eq!(diagnostics[0].location.to_string(), "/2");
    assert!(derived.units.equivalent(&units("metre")));
}

#[test]
fn test_user_function_binds_argument_units() {
    let (derived, diagnostics) = derive("sq(a)");
    assert!(diagnostics.is_empty());
    assert!(derived.units.equivalent(&units("metre^2")));
}

#[test]
fn test_problems_inside_function_bodies_point_at_the_call() {
    let (_, diagnostics) = derive("k * add(a, b)");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, DiagnosticCode::UnitMismatch);
    assert_eq!(diagnostics[0].location.to_string(), "/1");
    assert!(diagnostics[0].message.starts_with("in function 'add': "));
}

#[test]
fn test_bad_calls_are_errors() {
    for formula in ["nothing(a)", "sq(a, b)", "loop(a)"] {
        let (derived, diagnostics) = derive(formula);
        assert_eq!(diagnostics.len(), 1, "{}: {:?}", formula, diagnostics);
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(diagnostics[0].code, DiagnosticCode::UnresolvedSymbol);
        assert!(derived.has_undeclared_units);
    }
}

#[test]
fn test_avogadro_defaults_to_per_mole() {
    let (derived, diagnostics) = derive("avogadro * S2");
    assert!(diagnostics.is_empty());
    assert!(derived.units.is_dimensionless());
    assert!(!derived.has_undeclared_units);
}

#[test]
fn test_check_against_expected_units() {
    let symbols = model();
    let checker = UnitChecker::new(&symbols);
    let rate = parse_formula("k * S1 * cell").unwrap();

    let mut sink = Vec::new();
    checker.check(&rate, &units("mole*second^-1"), &mut sink);
    assert!(sink.is_empty(), "{:?}", sink);

    let mut sink = Vec::new();
    checker.check(&rate, &units("mole"), &mut sink);
    assert_eq!(codes(&sink), vec![DiagnosticCode::UnitMismatch]);
    assert!(sink[0].location.is_root());
    assert_eq!(sink[0].formula, "k * S1 * cell");
}

#[test]
fn test_check_reports_undeclared_results() {
    let symbols = model();
    let formula = parse_formula("2 * S1").unwrap();

    let mut sink = Vec::new();
    UnitChecker::new(&symbols).check(&formula, &units("mole"), &mut sink);
    assert_eq!(codes(&sink), vec![DiagnosticCode::UndeclaredUnits]);
    assert_eq!(sink[0].severity, Severity::Undetermined);
    assert!(!sink[0].is_failure());

    let options = CheckOptions {
        report_undeclared: false,
        ..CheckOptions::default()
    };
    let mut sink = Vec::new();
    UnitChecker::with_options(&symbols, options).check(&formula, &units("mole"), &mut sink);
    assert!(sink.is_empty());
}

#[test]
fn test_literal_units_from_markup() {
    let node = sbmlmath_mathml::read_math(
        r#"<math xmlns="http://www.w3.org/1998/Math/MathML"
                 xmlns:sbml="http://www.sbml.org/sbml/level3/version1/core">
             <apply><times/><cn sbml:units="second">2</cn><ci>k</ci></apply>
           </math>"#,
    )
    .unwrap();
    let symbols = model();
    let mut sink = Vec::new();
    let derived = UnitChecker::new(&symbols).derive(&node, &mut sink);
    assert!(sink.is_empty());
    assert_eq!(derived, DerivedUnits::declared(derived.units.clone()));
    assert!(derived.units.is_dimensionless());
}

#[test]
fn test_time_symbol_uses_model_time_units() {
    let symbols = model();
    let node = ExprNode::divide(ExprNode::Time("t".into()), ExprNode::ident("b"));
    let derived = UnitChecker::new(&symbols).derive(&node, &mut Vec::new());
    assert!(derived.units.is_dimensionless());
    assert!(!derived.has_undeclared_units);
}

#[test]
fn test_diagnostics_serialize_to_json() {
    let (_, diagnostics) = derive("a + b");
    let value = serde_json::to_value(&diagnostics[0]).unwrap();
    assert_eq!(value["severity"], "inconsistency");
    assert_eq!(value["code"], "unit-mismatch");
    assert_eq!(value["location"], "/1");
    assert_eq!(value["formula"], "a + b");
}

#[test]
fn test_undeclared_base_keeps_power_and_root_checks() {
    let (derived, diagnostics) = derive("root(2, 2 * v)");
    assert_eq!(codes(&diagnostics), vec![DiagnosticCode::NonIntegerPowerConflict]);
    assert!(diagnostics[0].location.is_root());
    assert!(derived.has_undeclared_units);
    assert!(derived.units.equivalent(&units("metre^3")));

    let (derived, diagnostics) = derive("(2 * v)^n");
    assert_eq!(codes(&diagnostics), vec![DiagnosticCode::NonIntegerPowerConflict]);
    assert!(derived.has_undeclared_units);

    let (_, diagnostics) = derive("(n * v)^(1/2)");
    assert_eq!(codes(&diagnostics), vec![DiagnosticCode::RationalPowerConflict]);

    let (derived, diagnostics) = derive("root(3, 2 * v)");
    assert!(diagnostics.is_empty());
    assert!(derived.has_undeclared_units);
    assert!(derived.units.equivalent(&units("metre")));
}

#[test]
fn test_exponents_beyond_64_bits_are_undetermined() {
    for formula in [
        "(a * a)^1e300",
        "(a * a)^9223372036854775807",
        "root((1/9223372036854775807), a * a)",
    ] {
        let (derived, diagnostics) = derive(formula);
        assert_eq!(
            codes(&diagnostics),
            vec![DiagnosticCode::ExponentOverflow],
            "{}",
            formula
        );
        assert_eq!(diagnostics[0].severity, Severity::Undetermined);
        assert!(!diagnostics[0].is_failure());
        assert!(derived.has_undeclared_units, "{}", formula);
    }

    // Each factor fits; their product is left unmerged.
    let (derived, diagnostics) = derive("a^9223372036854775807 * a^9223372036854775807");
    assert!(diagnostics.is_empty());
    assert_eq!(derived.units.terms().len(), 2);
}

#[test]
fn test_long_sums_derive_or_fail_cleanly() {
    let (derived, diagnostics) = derive(&vec!["a"; 150].join(" + "));
    assert!(diagnostics.is_empty());
    assert!(derived.units.equivalent(&units("metre")));

    assert!(parse_formula(&vec!["a"; 5_000].join("+")).is_err());
    assert!(parse_formula(&vec!["a"; 5_000].join("-")).is_err());
}
