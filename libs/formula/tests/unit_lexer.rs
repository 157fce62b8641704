//! Unit tests for the infix formula lexer

use sbmlmath_formula::lexer::{tokenize, Lexer};
use sbmlmath_formula::token::{TokenType, TokenValue};

fn types(input: &str) -> Vec<TokenType> {
    tokenize(input).into_iter().map(|t| t.token_type).collect()
}

#[test]
fn test_names() {
    let tokens = tokenize("k_1 S2 _x");
    assert_eq!(tokens[0].value, TokenValue::Name("k_1".into()));
    assert_eq!(tokens[1].value, TokenValue::Name("S2".into()));
    assert_eq!(tokens[2].value, TokenValue::Name("_x".into()));
    assert_eq!(tokens[3].token_type, TokenType::End);
}

#[test]
fn test_nan_and_inf_are_reals() {
    for input in ["NaN", "nan", "NAN", "INF", "inf", "Inf", "infinity"] {
        let tokens = tokenize(input);
        assert_eq!(tokens[0].token_type, TokenType::Real, "{}", input);
    }
    assert!(matches!(tokenize("NaN")[0].value, TokenValue::Real(v) if v.is_nan()));
    assert_eq!(tokenize("INF")[0].value, TokenValue::Real(f64::INFINITY));
    // Only whole names count.
    assert_eq!(tokenize("Inflow")[0].token_type, TokenType::Name);
}

#[test]
fn test_integer_and_real() {
    assert_eq!(tokenize("42")[0].value, TokenValue::Integer(42));
    assert_eq!(tokenize("4.25")[0].value, TokenValue::Real(4.25));
    assert_eq!(tokenize("0.5")[0].token_type, TokenType::Real);
}

#[test]
fn test_exponent_form_is_preserved() {
    assert_eq!(
        tokenize("2.5e-3")[0].value,
        TokenValue::Exponent {
            mantissa: 2.5,
            exponent: -3
        }
    );
    assert_eq!(
        tokenize("1E+7")[0].value,
        TokenValue::Exponent {
            mantissa: 1.0,
            exponent: 7
        }
    );
}

#[test]
fn test_exponent_never_spans_whitespace() {
    let tokens = tokenize("3e 4");
    assert_eq!(
        tokens.iter().map(|t| t.token_type).collect::<Vec<_>>(),
        vec![
            TokenType::RealWithExponent,
            TokenType::Integer,
            TokenType::End
        ]
    );
    assert_eq!(
        tokens[0].value,
        TokenValue::Exponent {
            mantissa: 3.0,
            exponent: 0
        }
    );
}

#[test]
fn test_huge_integer_becomes_real() {
    let tokens = tokenize("123456789012345678901234567890");
    assert_eq!(tokens[0].token_type, TokenType::Real);
}

#[test]
fn test_unknown_characters() {
    assert_eq!(
        types("a % b"),
        vec![
            TokenType::Name,
            TokenType::Unknown,
            TokenType::Name,
            TokenType::End
        ]
    );
    assert_eq!(types("."), vec![TokenType::Unknown, TokenType::End]);
}

#[test]
fn test_positions() {
    let tokens = tokenize("  k1 *S");
    assert_eq!(tokens[0].position, 2);
    assert_eq!(tokens[1].position, 5);
    assert_eq!(tokens[2].position, 6);
    assert_eq!(tokens[3].position, 7);
}

#[test]
fn test_lexer_is_restartable_from_a_copy() {
    let mut lexer = Lexer::new("a + b");
    lexer.next_token();
    let mut snapshot = lexer;
    assert_eq!(snapshot.next_token().token_type, TokenType::Plus);
    assert_eq!(lexer.next_token().token_type, TokenType::Plus);
}
