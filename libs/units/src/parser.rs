//! Text syntax for unit definitions.
//!
//! ```text
//! definition := "dimensionless" | "1" | ['/'] term (('*' | '/') term)*
//! term       := atom ['^' exponent]
//! atom       := kind | number | '(' factor ('*' factor)* ')'
//! factor     := kind | number | "10^" int
//! exponent   := int | '(' int '/' int ')'
//! ```
//!
//! The `Display` impl of [`UnitDefinition`] produces this syntax.

use crate::error::{Error, Result};
use crate::kind::UnitKind;
use crate::unit::{UnitDefinition, UnitTerm};
use num_rational::Rational64;
use std::str::FromStr;

pub fn parse(input: &str) -> Result<UnitDefinition> {
    if !input.is_ascii() {
        return Err(Error::NonAscii);
    }
    let trimmed = input.trim();
    if trimmed == "dimensionless" || trimmed == "1" || trimmed.is_empty() {
        return Ok(UnitDefinition::dimensionless());
    }
    let mut cursor = Cursor {
        bytes: input.as_bytes(),
        pos: 0,
    };
    let def = cursor.definition()?;
    cursor.skip_ws();
    if cursor.pos != cursor.bytes.len() {
        return Err(cursor.err("unexpected trailing input"));
    }
    Ok(def)
}

impl FromStr for UnitDefinition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn err(&self, message: &'static str) -> Error {
        Error::Syntax {
            pos: self.pos,
            message,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        self.skip_ws();
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8, message: &'static str) -> Result<()> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.err(message))
        }
    }

    fn definition(&mut self) -> Result<UnitDefinition> {
        let mut def = UnitDefinition::dimensionless();
        let mut invert = self.eat(b'/');
        loop {
            let mut term = self.term()?;
            if invert {
                term.exponent = -term.exponent;
            }
            def.push(term);
            if self.eat(b'*') {
                invert = false;
            } else if self.eat(b'/') {
                invert = true;
            } else {
                break;
            }
        }
        Ok(def)
    }

    fn term(&mut self) -> Result<UnitTerm> {
        self.skip_ws();
        let mut term = match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                self.grouped()?
            }
            Some(b) if b.is_ascii_alphabetic() => UnitTerm::new(self.kind()?),
            Some(b) if b.is_ascii_digit() || b == b'.' => {
                let value = self.number()?;
                UnitTerm::new(UnitKind::Dimensionless).with_multiplier(value)
            }
            _ => return Err(self.err("expected a unit kind, number or '('")),
        };
        if self.eat(b'^') {
            term.exponent = self.exponent()?;
        }
        Ok(term)
    }

    fn grouped(&mut self) -> Result<UnitTerm> {
        let mut multiplier = 1.0;
        let mut scale = 0i32;
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b) if b.is_ascii_alphabetic() => {
                    let kind = self.kind()?;
                    self.expect(b')', "expected ')' after unit kind")?;
                    return Ok(UnitTerm::new(kind)
                        .with_multiplier(multiplier)
                        .with_scale(scale));
                }
                Some(b) if b.is_ascii_digit() || b == b'.' => {
                    let value = self.number()?;
                    if self.eat(b'^') {
                        if value != 10.0 {
                            return Err(self.err("only 10 may carry a scale exponent"));
                        }
                        let exp = self.integer()?;
                        scale = i32::try_from(exp).map_err(|_| self.err("scale out of range"))?;
                    } else {
                        multiplier *= value;
                    }
                    self.expect(b'*', "expected '*' inside parenthesised term")?;
                }
                _ => return Err(self.err("expected a factor inside parentheses")),
            }
        }
    }

    fn kind(&mut self) -> Result<UnitKind> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
        {
            self.pos += 1;
        }
        let name = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| Error::NonAscii)?;
        name.parse()
    }

    fn number(&mut self) -> Result<f64> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit() || b == b'.') {
            self.pos += 1;
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if self.peek().is_some_and(|b| b.is_ascii_digit()) {
                while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                self.pos = mark;
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).map_err(|_| Error::NonAscii)?;
        text.parse::<f64>().map_err(|_| Error::Syntax {
            pos: start,
            message: "malformed number",
        })
    }

    fn integer(&mut self) -> Result<i64> {
        self.skip_ws();
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).map_err(|_| Error::NonAscii)?;
        let value = text.parse::<i64>().map_err(|_| Error::Syntax {
            pos: start,
            message: "expected an integer",
        })?;
        if value == i64::MIN {
            return Err(Error::ExponentOverflow);
        }
        Ok(value)
    }

    fn exponent(&mut self) -> Result<Rational64> {
        if self.eat(b'(') {
            let numer = self.integer()?;
            self.expect(b'/', "expected '/' in rational exponent")?;
            let denom = self.integer()?;
            self.expect(b')', "expected ')' after rational exponent")?;
            if denom == 0 {
                return Err(Error::ZeroDenominator);
            }
            Ok(Rational64::new(numer, denom))
        } else {
            Ok(Rational64::from_integer(self.integer()?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use UnitKind::*;

    #[test]
    fn parses_quotient() {
        let def = parse("mole/litre").unwrap();
        assert_eq!(def.terms().len(), 2);
        assert_eq!(def.terms()[1].kind, Litre);
        assert_eq!(def.terms()[1].exponent, Rational64::from_integer(-1));
    }

    #[test]
    fn parses_leading_slash() {
        let def = parse("/second").unwrap();
        assert_eq!(def, UnitDefinition::of(Second, -1));
    }

    #[test]
    fn parses_grouped_factors() {
        let def = parse("(10^-3*mole)*(60*second)^-1").unwrap();
        assert_eq!(def.terms()[0].scale, -3);
        assert_eq!(def.terms()[1].multiplier, 60.0);
        assert_eq!(def.terms()[1].exponent, Rational64::from_integer(-1));
    }

    #[test]
    fn parses_rational_exponent() {
        let def = parse("metre^(1/2)").unwrap();
        assert_eq!(def.terms()[0].exponent, Rational64::new(1, 2));
        assert_eq!(parse("metre^(1/0)").unwrap_err(), Error::ZeroDenominator);
    }

    #[test]
    fn rejects_exponent_without_negation() {
        assert_eq!(
            parse("/metre^-9223372036854775808").unwrap_err(),
            Error::ExponentOverflow
        );
        assert_eq!(
            parse("metre^(1/-9223372036854775808)").unwrap_err(),
            Error::ExponentOverflow
        );
        assert!(parse("/metre^-9223372036854775807").is_ok());
    }

    #[test]
    fn display_round_trips() {
        for text in [
            "mole*litre^-1",
            "(10^-3*mole)*second^-1",
            "(2.5*10^3*gram)^2",
            "metre^(3/2)",
            "dimensionless",
        ] {
            assert_eq!(parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse("mole**litre"), Err(Error::Syntax { .. })));
        assert!(matches!(parse("parsec"), Err(Error::UnknownKind(_))));
        assert!(matches!(parse("mole)"), Err(Error::Syntax { .. })));
        assert!(matches!(parse("(3^2*mole)"), Err(Error::Syntax { .. })));
        assert_eq!(parse("µmole").unwrap_err(), Error::NonAscii);
    }
}
