//! Token types for the infix formula lexer

/// Token types for the infix formula lexer
#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub enum TokenType {
    // Names and literals
    Name,
    Integer,
    Real,
    RealWithExponent,

    // Operators
    Plus,     // +
    Minus,    // -
    Multiply, // *
    Divide,   // /
    Power,    // ^

    // Delimiters
    OpenParen,  // (
    CloseParen, // )
    Comma,      // ,

    // End of input
    End,

    // Anything the grammar has no use for
    Unknown,
}

/// Payload carried by a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Name(String),
    Integer(i64),
    Real(f64),
    /// Mantissa and exponent kept apart so `2.5e3` prints back as written.
    Exponent {
        mantissa: f64,
        exponent: i64,
    },
    Char(char),
}

/// A token in an infix formula
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub value: TokenValue,
    /// Byte offset of the first character of the token.
    pub position: usize,
}

impl Token {
    pub fn new(token_type: TokenType, value: TokenValue, position: usize) -> Self {
        Self {
            token_type,
            value,
            position,
        }
    }

    pub fn end(position: usize) -> Self {
        Self::new(TokenType::End, TokenValue::None, position)
    }

    pub fn symbol(token_type: TokenType, c: char, position: usize) -> Self {
        Self::new(token_type, TokenValue::Char(c), position)
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self.token_type,
            TokenType::Integer | TokenType::Real | TokenType::RealWithExponent
        )
    }

    /// Short rendering for error messages.
    pub fn describe(&self) -> String {
        match &self.value {
            TokenValue::None => "end of input".to_string(),
            TokenValue::Name(name) => format!("'{}'", name),
            TokenValue::Integer(i) => i.to_string(),
            TokenValue::Real(r) => r.to_string(),
            TokenValue::Exponent { mantissa, exponent } => format!("{}e{}", mantissa, exponent),
            TokenValue::Char(c) => format!("'{}'", c),
        }
    }
}
