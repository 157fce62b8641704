//! Infix formula lexer
//!
//! Single pass over a byte cursor, one token per call. The lexer never
//! fails: input it cannot classify comes out as `Unknown` tokens, which the
//! parser rejects.
//!
//! Numbers follow `([0-9]+\.?[0-9]*|\.[0-9]+)([eE][+-]?[0-9]*)?`. An `e`
//! directly after a mantissa always starts an exponent; when no digits
//! follow, the exponent is zero (`3e 4` is `3e0` then `4`).

use crate::token::{Token, TokenType, TokenValue};

/// Cursor over an infix formula. Copying a lexer snapshots its position,
/// which the parser uses for lookahead.
#[derive(Debug, Clone, Copy)]
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    /// Byte offset just past the last consumed token.
    pub fn position(&self) -> usize {
        self.position
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn current(&self) -> Option<u8> {
        self.bytes().get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes().get(self.position + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current() {
            if c.is_ascii_whitespace() {
                self.position += 1;
            } else {
                break;
            }
        }
    }

    fn skip_digits(&mut self) -> usize {
        let start = self.position;
        while matches!(self.current(), Some(b'0'..=b'9')) {
            self.position += 1;
        }
        self.position - start
    }

    /// Read the next token
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.position;

        let Some(c) = self.current() else {
            return Token::end(start);
        };

        let single = match c {
            b'+' => Some(TokenType::Plus),
            b'-' => Some(TokenType::Minus),
            b'*' => Some(TokenType::Multiply),
            b'/' => Some(TokenType::Divide),
            b'^' => Some(TokenType::Power),
            b'(' => Some(TokenType::OpenParen),
            b')' => Some(TokenType::CloseParen),
            b',' => Some(TokenType::Comma),
            _ => None,
        };
        if let Some(token_type) = single {
            self.position += 1;
            return Token::symbol(token_type, c as char, start);
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            return self.read_name();
        }
        if c.is_ascii_digit() || c == b'.' {
            return self.read_number();
        }

        // Consume a whole character so positions stay on char boundaries.
        let ch = self.input[start..].chars().next().unwrap_or('\u{fffd}');
        self.position += ch.len_utf8().max(1);
        Token::new(TokenType::Unknown, TokenValue::Char(ch), start)
    }

    fn read_name(&mut self) -> Token {
        let start = self.position;
        while let Some(c) = self.current() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.position += 1;
            } else {
                break;
            }
        }
        let name = &self.input[start..self.position];

        let special = if name.eq_ignore_ascii_case("nan") {
            Some(f64::NAN)
        } else if name.eq_ignore_ascii_case("inf") || name.eq_ignore_ascii_case("infinity") {
            Some(f64::INFINITY)
        } else {
            None
        };

        match special {
            Some(value) => Token::new(TokenType::Real, TokenValue::Real(value), start),
            None => Token::new(TokenType::Name, TokenValue::Name(name.to_string()), start),
        }
    }

    fn read_number(&mut self) -> Token {
        let start = self.position;
        let int_digits = self.skip_digits();
        let mut has_point = false;
        let mut frac_digits = 0;
        if self.current() == Some(b'.') {
            has_point = true;
            self.position += 1;
            frac_digits = self.skip_digits();
        }

        if int_digits + frac_digits == 0 {
            // A lone '.'
            return Token::new(TokenType::Unknown, TokenValue::Char('.'), start);
        }

        let mantissa_text = &self.input[start..self.position];

        if matches!(self.current(), Some(b'e' | b'E')) {
            self.position += 1;
            let sign_len = match self.current() {
                Some(b'+' | b'-') if matches!(self.peek_at(1), Some(b'0'..=b'9')) => 1,
                _ => 0,
            };
            let exp_start = self.position;
            self.position += sign_len;
            let exp_digits = self.skip_digits();

            let mantissa = mantissa_text.parse::<f64>().unwrap_or(f64::NAN);
            let exponent = if exp_digits == 0 {
                0
            } else {
                let text = &self.input[exp_start..self.position];
                text.parse::<i64>().unwrap_or(if text.starts_with('-') {
                    i64::MIN
                } else {
                    i64::MAX
                })
            };
            return Token::new(
                TokenType::RealWithExponent,
                TokenValue::Exponent { mantissa, exponent },
                start,
            );
        }

        if has_point {
            let value = mantissa_text.parse::<f64>().unwrap_or(f64::NAN);
            return Token::new(TokenType::Real, TokenValue::Real(value), start);
        }

        match mantissa_text.parse::<i64>() {
            Ok(value) => Token::new(TokenType::Integer, TokenValue::Integer(value), start),
            // Too wide for an integer literal; keep the magnitude.
            Err(_) => Token::new(
                TokenType::Real,
                TokenValue::Real(mantissa_text.parse::<f64>().unwrap_or(f64::INFINITY)),
                start,
            ),
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    /// Yields tokens up to, not including, `End`.
    fn next(&mut self) -> Option<Token> {
        let token = self.next_token();
        (token.token_type != TokenType::End).then_some(token)
    }
}

/// Tokenize a whole formula, ending with the `End` token.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut tokens: Vec<Token> = lexer.by_ref().collect();
    tokens.push(Token::end(lexer.position()));
    tokens
}
