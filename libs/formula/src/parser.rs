//! Infix formula parser - converts formula strings to expression trees
//!
//! Recursive descent over the lexer's token stream.
//! Precedence (lowest to highest):
//! 1. additive (+, -), left-associative
//! 2. multiplicative (*, /), left-associative
//! 3. unary minus
//! 4. power (^), right-associative
//! 5. primary (number, name, call, parenthesized expression)
//!
//! Calls go through a fixed name table; names it does not know become calls
//! to user-defined functions. A parse either yields a whole tree or fails.

use crate::ast::{Constant, ExprNode, Function, Lambda, Number, Operator, Piece, Piecewise};
use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::token::{Token, TokenType, TokenValue};
use phf::phf_map;

const MAX_RECURSION_DEPTH: usize = 200;

/// Parser configuration
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Deepest nesting accepted before the parse is rejected.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: MAX_RECURSION_DEPTH,
        }
    }
}

/// What a call name denotes.
#[derive(Debug, Clone)]
enum Callee {
    Op(Operator),
    Unary(Function),
    /// `log(x)` or `log(base, x)`
    Log,
    Log10,
    /// `root(x)` or `root(degree, x)`
    Root,
    Sqrt,
    /// `sqr(x)` is `x^2`
    Sqr,
    Delay,
    Piecewise,
    Lambda,
}

static CALLEES_BY_NAME: phf::Map<&'static str, Callee> = phf_map! {
    // Operators in call form
    "plus" => Callee::Op(Operator::Plus),
    "minus" => Callee::Op(Operator::Minus),
    "times" => Callee::Op(Operator::Times),
    "divide" => Callee::Op(Operator::Divide),
    "pow" => Callee::Op(Operator::Power),
    "power" => Callee::Op(Operator::Power),
    "eq" => Callee::Op(Operator::Eq),
    "neq" => Callee::Op(Operator::Neq),
    "gt" => Callee::Op(Operator::Gt),
    "lt" => Callee::Op(Operator::Lt),
    "geq" => Callee::Op(Operator::Geq),
    "leq" => Callee::Op(Operator::Leq),
    "and" => Callee::Op(Operator::And),
    "or" => Callee::Op(Operator::Or),
    "xor" => Callee::Op(Operator::Xor),
    "not" => Callee::Op(Operator::Not),

    // Functions
    "abs" => Callee::Unary(Function::Abs),
    "ceiling" => Callee::Unary(Function::Ceiling),
    "ceil" => Callee::Unary(Function::Ceiling),
    "floor" => Callee::Unary(Function::Floor),
    "exp" => Callee::Unary(Function::Exp),
    "ln" => Callee::Unary(Function::Ln),
    "factorial" => Callee::Unary(Function::Factorial),
    "sin" => Callee::Unary(Function::Sin),
    "cos" => Callee::Unary(Function::Cos),
    "tan" => Callee::Unary(Function::Tan),
    "sec" => Callee::Unary(Function::Sec),
    "csc" => Callee::Unary(Function::Csc),
    "cot" => Callee::Unary(Function::Cot),
    "sinh" => Callee::Unary(Function::Sinh),
    "cosh" => Callee::Unary(Function::Cosh),
    "tanh" => Callee::Unary(Function::Tanh),
    "sech" => Callee::Unary(Function::Sech),
    "csch" => Callee::Unary(Function::Csch),
    "coth" => Callee::Unary(Function::Coth),
    "arcsin" => Callee::Unary(Function::Arcsin),
    "asin" => Callee::Unary(Function::Arcsin),
    "arccos" => Callee::Unary(Function::Arccos),
    "acos" => Callee::Unary(Function::Arccos),
    "arctan" => Callee::Unary(Function::Arctan),
    "atan" => Callee::Unary(Function::Arctan),
    "arcsec" => Callee::Unary(Function::Arcsec),
    "arccsc" => Callee::Unary(Function::Arccsc),
    "arccot" => Callee::Unary(Function::Arccot),
    "arcsinh" => Callee::Unary(Function::Arcsinh),
    "arccosh" => Callee::Unary(Function::Arccosh),
    "arctanh" => Callee::Unary(Function::Arctanh),
    "arcsech" => Callee::Unary(Function::Arcsech),
    "arccsch" => Callee::Unary(Function::Arccsch),
    "arccoth" => Callee::Unary(Function::Arccoth),

    // Two-child forms with legacy one-argument spellings
    "log" => Callee::Log,
    "log10" => Callee::Log10,
    "root" => Callee::Root,
    "sqrt" => Callee::Sqrt,
    "sqr" => Callee::Sqr,
    "delay" => Callee::Delay,

    // Constructs
    "piecewise" => Callee::Piecewise,
    "lambda" => Callee::Lambda,
};

static CONSTANTS_BY_NAME: phf::Map<&'static str, Constant> = phf_map! {
    "pi" => Constant::Pi,
    "exponentiale" => Constant::ExponentialE,
    "true" => Constant::True,
    "false" => Constant::False,
    "avogadro" => Constant::Avogadro,
};

/// Parse an infix formula with default options.
pub fn parse_formula(input: &str) -> Result<ExprNode> {
    parse_formula_with(input, &ParseOptions::default())
}

pub fn parse_formula_with(input: &str, options: &ParseOptions) -> Result<ExprNode> {
    let result = Parser::new(input, options).parse();
    if let Err(err) = &result {
        tracing::debug!(formula = input, error = %err, "rejected infix formula");
    }
    result
}

/// Parser for infix formulas
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    max_depth: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, options: &ParseOptions) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            max_depth: options.max_depth,
            depth: 0,
        }
    }

    /// Parse the entire formula (top-level entry point)
    pub fn parse(&mut self) -> Result<ExprNode> {
        let expr = self.parse_additive()?;
        if self.current.token_type != TokenType::End {
            return Err(self.unexpected("an operator or end of input"));
        }
        Ok(expr)
    }

    fn advance(&mut self) -> Token {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.current, next)
    }

    fn at(&self, token_type: TokenType) -> bool {
        self.current.token_type == token_type
    }

    fn expect(&mut self, token_type: TokenType, what: &str) -> Result<Token> {
        if self.at(token_type) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        Error::syntax(
            self.current.position,
            format!("{}, found {}", expected, self.current.describe()),
        )
    }

    /// Token after the current one, without consuming anything.
    fn peek(&self) -> Token {
        let mut lookahead = self.lexer;
        lookahead.next_token()
    }

    /// Each link of a left-associative chain nests the tree one level
    /// deeper, so links count against the depth limit like parentheses do.
    fn parse_additive(&mut self) -> Result<ExprNode> {
        let entry = self.depth;
        let result = self.parse_additive_chain();
        self.depth = entry;
        result
    }

    fn parse_additive_chain(&mut self) -> Result<ExprNode> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.current.token_type {
                TokenType::Plus => Operator::Plus,
                TokenType::Minus => Operator::Minus,
                _ => return Ok(lhs),
            };
            self.descend()?;
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = ExprNode::Operator {
                op,
                args: vec![lhs, rhs],
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<ExprNode> {
        let entry = self.depth;
        let result = self.parse_multiplicative_chain();
        self.depth = entry;
        result
    }

    fn parse_multiplicative_chain(&mut self) -> Result<ExprNode> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.current.token_type {
                TokenType::Multiply => Operator::Times,
                TokenType::Divide => Operator::Divide,
                _ => return Ok(lhs),
            };
            self.descend()?;
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = ExprNode::Operator {
                op,
                args: vec![lhs, rhs],
            };
        }
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(Error::syntax(
                self.current.position,
                format!("nesting no deeper than {}", self.max_depth),
            ));
        }
        Ok(())
    }

    fn parse_unary(&mut self) -> Result<ExprNode> {
        self.descend()?;
        let result = self.parse_unary_inner();
        self.depth -= 1;
        result
    }

    fn parse_unary_inner(&mut self) -> Result<ExprNode> {
        if !self.at(TokenType::Minus) {
            return self.parse_power();
        }
        self.advance();

        // `-2` is the literal -2 unless the number is the base of a power.
        if self.current.is_number() && self.peek().token_type != TokenType::Power {
            let token = self.advance();
            if let Some(negative) = negated_literal(&token) {
                return Ok(negative.into());
            }
            return Ok(ExprNode::negate(number_literal(&token)?.into()));
        }

        let operand = self.parse_unary()?;
        Ok(ExprNode::negate(operand))
    }

    fn parse_power(&mut self) -> Result<ExprNode> {
        let base = self.parse_primary()?;
        if !self.at(TokenType::Power) {
            return Ok(base);
        }
        self.advance();
        let exponent = self.parse_unary()?;
        Ok(ExprNode::power(base, exponent))
    }

    fn parse_primary(&mut self) -> Result<ExprNode> {
        match self.current.token_type {
            TokenType::Integer | TokenType::Real | TokenType::RealWithExponent => {
                let token = self.advance();
                Ok(number_literal(&token)?.into())
            }
            TokenType::Name => {
                let token = self.advance();
                let TokenValue::Name(name) = token.value else {
                    return Err(Error::syntax(token.position, "a name"));
                };
                if self.at(TokenType::OpenParen) {
                    self.parse_call(name, token.position)
                } else if let Some(constant) = CONSTANTS_BY_NAME.get(name.as_str()) {
                    Ok(ExprNode::constant(*constant))
                } else {
                    Ok(ExprNode::Identifier(name))
                }
            }
            TokenType::OpenParen => {
                if let Some(rational) = self.try_rational() {
                    return Ok(rational);
                }
                self.advance();
                let inner = self.parse_additive()?;
                self.expect(TokenType::CloseParen, "')'")?;
                Ok(inner)
            }
            _ => Err(self.unexpected("a number, name or '('")),
        }
    }

    /// `(p/q)` written without spaces, with optional signs, is a rational
    /// literal. Consumes the tokens only on a match.
    fn try_rational(&mut self) -> Option<ExprNode> {
        let mut tight = TightTokens {
            end: self.lexer.position(),
            lexer: self.lexer,
        };
        let numerator = tight.signed_integer()?;
        if tight.next()?.token_type != TokenType::Divide {
            return None;
        }
        let denominator = tight.signed_integer()?;
        if tight.next()?.token_type != TokenType::CloseParen {
            return None;
        }

        self.lexer = tight.lexer;
        self.current = self.lexer.next_token();
        Some(ExprNode::rational(numerator, denominator))
    }

    fn parse_arguments(&mut self) -> Result<Vec<ExprNode>> {
        self.expect(TokenType::OpenParen, "'('")?;
        let mut args = Vec::new();
        if self.at(TokenType::CloseParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_additive()?);
            match self.current.token_type {
                TokenType::Comma => {
                    self.advance();
                }
                TokenType::CloseParen => {
                    self.advance();
                    return Ok(args);
                }
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }
    }

    fn parse_call(&mut self, name: String, position: usize) -> Result<ExprNode> {
        let mut args = self.parse_arguments()?;
        let Some(callee) = CALLEES_BY_NAME.get(name.as_str()).cloned() else {
            return Ok(ExprNode::call(name, args));
        };

        let count = args.len();
        let wrong_count = |expected: &str| {
            Error::syntax(
                position,
                format!("{} for '{}', found {}", expected, name, count),
            )
        };

        let node = match callee {
            Callee::Op(op) => {
                if !op.arity().accepts(args.len()) {
                    return Err(wrong_count(&op.arity().to_string()));
                }
                ExprNode::Operator { op, args }
            }
            Callee::Unary(func) => {
                if args.len() != 1 {
                    return Err(wrong_count("exactly 1 argument"));
                }
                ExprNode::Function { func, args }
            }
            Callee::Log | Callee::Root => {
                let default = if matches!(callee, Callee::Log) { 10 } else { 2 };
                let func = if matches!(callee, Callee::Log) {
                    Function::Log
                } else {
                    Function::Root
                };
                match args.len() {
                    1 => args.insert(0, ExprNode::integer(default)),
                    2 => {}
                    _ => return Err(wrong_count("1 or 2 arguments")),
                }
                ExprNode::Function { func, args }
            }
            Callee::Log10 | Callee::Sqrt | Callee::Sqr => {
                let Some(arg) = args.pop().filter(|_| args.is_empty()) else {
                    return Err(wrong_count("exactly 1 argument"));
                };
                match callee {
                    Callee::Log10 => ExprNode::log10(arg),
                    Callee::Sqrt => ExprNode::sqrt(arg),
                    _ => ExprNode::power(arg, ExprNode::integer(2)),
                }
            }
            Callee::Delay => {
                if args.len() != 2 {
                    return Err(wrong_count("exactly 2 arguments"));
                }
                ExprNode::Function {
                    func: Function::Delay,
                    args,
                }
            }
            Callee::Piecewise => {
                let otherwise = if args.len() % 2 == 1 {
                    args.pop().map(Box::new)
                } else {
                    None
                };
                let mut pieces = Vec::with_capacity(args.len() / 2);
                let mut iter = args.into_iter();
                while let (Some(value), Some(condition)) = (iter.next(), iter.next()) {
                    pieces.push(Piece { value, condition });
                }
                ExprNode::Piecewise(Piecewise { pieces, otherwise })
            }
            Callee::Lambda => {
                let Some(body) = args.pop() else {
                    return Err(wrong_count("at least 1 argument"));
                };
                let mut params = Vec::with_capacity(args.len());
                for arg in args {
                    match arg {
                        ExprNode::Identifier(param) => params.push(param),
                        other => {
                            return Err(Error::syntax(
                                position,
                                format!(
                                    "a parameter name in 'lambda', found {}",
                                    other.label()
                                ),
                            ))
                        }
                    }
                }
                ExprNode::Lambda(Lambda::new(params, body))
            }
        };
        Ok(node)
    }
}

/// Token cursor that stops at the first whitespace gap.
struct TightTokens<'a> {
    lexer: Lexer<'a>,
    end: usize,
}

impl TightTokens<'_> {
    fn next(&mut self) -> Option<Token> {
        let token = self.lexer.next_token();
        if token.position != self.end {
            return None;
        }
        self.end = self.lexer.position();
        Some(token)
    }

    fn signed_integer(&mut self) -> Option<i64> {
        let mut token = self.next()?;
        let negative = token.token_type == TokenType::Minus;
        if negative {
            token = self.next()?;
        }
        match token.value {
            TokenValue::Integer(value) if negative => value.checked_neg(),
            TokenValue::Integer(value) => Some(value),
            _ => None,
        }
    }
}

fn number_literal(token: &Token) -> Result<Number> {
    match token.value {
        TokenValue::Integer(value) => Ok(Number::integer(value)),
        TokenValue::Real(value) => Ok(Number::real(value)),
        TokenValue::Exponent { mantissa, exponent } if mantissa.is_finite() => {
            Ok(Number::real_with_exponent(mantissa, exponent))
        }
        TokenValue::Exponent { mantissa, .. } => Ok(Number::real(mantissa)),
        _ => Err(Error::syntax(token.position, "a number")),
    }
}

/// Literal for `-token`, or `None` when negation cannot be folded
/// (NaN, or an integer with no negative counterpart).
fn negated_literal(token: &Token) -> Option<Number> {
    match token.value {
        TokenValue::Integer(value) => value.checked_neg().map(Number::integer),
        TokenValue::Real(value) if value.is_nan() => None,
        TokenValue::Real(value) => Some(Number::real(-value)),
        TokenValue::Exponent { mantissa, exponent } if mantissa.is_finite() => {
            Some(Number::real_with_exponent(-mantissa, exponent))
        }
        _ => None,
    }
}
