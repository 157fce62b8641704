//! Property-based tests using QuickCheck

use quickcheck::{QuickCheck, TestResult};
use sbmlmath_formula::lexer::tokenize;
use sbmlmath_formula::token::TokenType;
use sbmlmath_formula::{format_formula, parse_formula};

/// Property: the lexer accepts any input and always terminates with `End`
#[test]
fn prop_tokenizer_never_panics() {
    fn prop(s: String) -> bool {
        let tokens = tokenize(&s);
        tokens
            .last()
            .map_or(false, |t| t.token_type == TokenType::End)
            && tokens
                .iter()
                .all(|t| t.position <= s.len() && s.is_char_boundary(t.position))
    }

    QuickCheck::new()
        .tests(500)
        .quickcheck(prop as fn(String) -> bool);
}

/// Property: formatting a parsed formula gives text that parses to a tree
/// with the same rendering
#[test]
fn prop_format_is_a_fixpoint() {
    fn prop(s: String) -> TestResult {
        let Ok(tree) = parse_formula(&s) else {
            return TestResult::discard();
        };
        let text = format_formula(&tree);
        match parse_formula(&text) {
            Ok(again) => TestResult::from_bool(format_formula(&again) == text),
            Err(_) => TestResult::failed(),
        }
    }

    QuickCheck::new()
        .tests(500)
        .quickcheck(prop as fn(String) -> TestResult);
}

/// Property: formulas built from a fixed alphabet round-trip through the
/// formatter
#[test]
fn prop_generated_formulas_round_trip() {
    fn prop(picks: Vec<u8>) -> TestResult {
        const PIECES: &[&str] = &[
            "a", "b", "2", "-", "+", "*", "/", "^", "(", ")", "1.5", "3e2", "(1/2)", "sqrt(",
            "log10(", ",", "pi", "INF",
        ];
        let text: String = picks
            .iter()
            .map(|p| PIECES[*p as usize % PIECES.len()])
            .collect::<Vec<_>>()
            .join(" ");
        let Ok(tree) = parse_formula(&text) else {
            return TestResult::discard();
        };
        let formatted = format_formula(&tree);
        TestResult::from_bool(parse_formula(&formatted).map_or(false, |t| {
            format_formula(&t) == formatted
        }))
    }

    QuickCheck::new()
        .tests(1000)
        .quickcheck(prop as fn(Vec<u8>) -> TestResult);
}
