//! Infix formula formatter
//!
//! Inorder rendering with the minimum parentheses needed for the parser to
//! rebuild the same tree. `log(10, x)` prints as `log10(x)` and `root(2, x)`
//! as `sqrt(x)`; the tree itself keeps both children.

use crate::ast::{Constant, ExprNode, Function, Number, NumberValue, Operator};
use std::fmt::{self, Write};

// Binding strength, weakest first.
const PREC_ADDITIVE: u8 = 2;
const PREC_MULTIPLICATIVE: u8 = 3;
const PREC_UNARY: u8 = 4;
const PREC_POWER: u8 = 5;
const PREC_ATOM: u8 = 6;

/// Render a tree as an infix formula.
pub fn format_formula(node: &ExprNode) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_node(&mut out, node);
    out
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, self)
    }
}

/// Which operand slot of a binary operator a child occupies.
#[derive(Clone, Copy, PartialEq)]
enum Side {
    Left,
    Right,
}

fn precedence(node: &ExprNode) -> u8 {
    match node {
        ExprNode::Operator { op, args } => match (op, args.len()) {
            (Operator::Plus | Operator::Times, n) if n < 2 => PREC_ATOM,
            (Operator::Plus, _) | (Operator::Minus, 2) => PREC_ADDITIVE,
            (Operator::Minus, 1) => PREC_UNARY,
            (Operator::Times | Operator::Divide, 2..) => PREC_MULTIPLICATIVE,
            (Operator::Power, 2) => PREC_POWER,
            _ => PREC_ATOM,
        },
        ExprNode::Number(number) if number.is_negative() && !is_rational(number) => PREC_UNARY,
        ExprNode::Semantics(sem) => precedence(&sem.inner),
        _ => PREC_ATOM,
    }
}

fn is_rational(number: &Number) -> bool {
    matches!(number.value, NumberValue::Rational { .. })
}

fn needs_parens(parent: u8, child: &ExprNode, side: Side) -> bool {
    let child_prec = precedence(child);
    if parent > child_prec {
        return true;
    }
    if parent == child_prec {
        // Left-associative operators regroup on the right; `^` on the left.
        return match parent {
            PREC_ADDITIVE | PREC_MULTIPLICATIVE => side == Side::Right,
            PREC_POWER => side == Side::Left,
            _ => false,
        };
    }
    false
}

fn write_operand<W: Write>(out: &mut W, parent: u8, child: &ExprNode, side: Side) -> fmt::Result {
    if needs_parens(parent, child, side) {
        out.write_char('(')?;
        write_node(out, child)?;
        out.write_char(')')
    } else {
        write_node(out, child)
    }
}

fn write_node<W: Write>(out: &mut W, node: &ExprNode) -> fmt::Result {
    match node {
        ExprNode::Number(number) => write_number(out, number),
        ExprNode::Identifier(name) | ExprNode::Time(name) => out.write_str(name),
        ExprNode::Operator { op, args } => write_operator(out, *op, args),
        ExprNode::Function { func, args } => write_function(out, func, args),
        ExprNode::Piecewise(pw) => {
            let mut args: Vec<&ExprNode> = Vec::with_capacity(pw.pieces.len() * 2 + 1);
            for piece in &pw.pieces {
                args.push(&piece.value);
                args.push(&piece.condition);
            }
            if let Some(otherwise) = &pw.otherwise {
                args.push(otherwise);
            }
            write_call(out, "piecewise", args)
        }
        ExprNode::Lambda(lambda) => {
            out.write_str("lambda(")?;
            for param in &lambda.params {
                write!(out, "{}, ", param)?;
            }
            write_node(out, &lambda.body)?;
            out.write_char(')')
        }
        ExprNode::Semantics(sem) => write_node(out, &sem.inner),
    }
}

fn write_operator<W: Write>(out: &mut W, op: Operator, args: &[ExprNode]) -> fmt::Result {
    let infix = match (op, args.len()) {
        (Operator::Plus, 2..) => Some((" + ", PREC_ADDITIVE)),
        (Operator::Times, 2..) => Some((" * ", PREC_MULTIPLICATIVE)),
        (Operator::Minus, 2) => Some((" - ", PREC_ADDITIVE)),
        (Operator::Divide, 2) => Some((" / ", PREC_MULTIPLICATIVE)),
        (Operator::Power, 2) => Some(("^", PREC_POWER)),
        _ => None,
    };

    if let Some((symbol, prec)) = infix {
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.write_str(symbol)?;
            }
            let side = if i == 0 { Side::Left } else { Side::Right };
            write_operand(out, prec, arg, side)?;
        }
        return Ok(());
    }

    if let (Operator::Minus, [operand]) = (op, args) {
        out.write_char('-')?;
        // `-(2)` keeps a negated literal apart from the literal -2.
        if let ExprNode::Number(number) = operand {
            if !number.is_negative() && !is_rational(number) {
                out.write_char('(')?;
                write_number(out, number)?;
                return out.write_char(')');
            }
        }
        return write_operand(out, PREC_UNARY, operand, Side::Right);
    }

    write_call(out, op.as_str(), args.iter())
}

fn write_function<W: Write>(out: &mut W, func: &Function, args: &[ExprNode]) -> fmt::Result {
    match (func, args) {
        (Function::Log, [base, arg]) if is_default(base, 10) => write_call(out, "log10", [arg]),
        (Function::Root, [degree, arg]) if is_default(degree, 2) => write_call(out, "sqrt", [arg]),
        _ => write_call(out, func.name(), args.iter()),
    }
}

fn is_default(node: &ExprNode, value: i64) -> bool {
    matches!(node, ExprNode::Number(Number { value: NumberValue::Integer(v), units: None }) if *v == value)
}

fn write_call<'a, W: Write>(
    out: &mut W,
    name: &str,
    args: impl IntoIterator<Item = &'a ExprNode>,
) -> fmt::Result {
    out.write_str(name)?;
    out.write_char('(')?;
    for (i, arg) in args.into_iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write_node(out, arg)?;
    }
    out.write_char(')')
}

fn write_number<W: Write>(out: &mut W, number: &Number) -> fmt::Result {
    match number.value {
        NumberValue::Integer(i) => write!(out, "{}", i),
        NumberValue::Real(r) => write_real(out, r),
        NumberValue::RealWithExponent { mantissa, exponent } => {
            write!(out, "{}e{}", mantissa, exponent)
        }
        NumberValue::Rational {
            numerator,
            denominator,
        } => write!(out, "({}/{})", numerator, denominator),
        NumberValue::Constant(constant) => out.write_str(match constant {
            Constant::Pi => "pi",
            Constant::ExponentialE => "exponentiale",
            Constant::True => "true",
            Constant::False => "false",
            Constant::NaN => "NaN",
            Constant::Infinity => "INF",
            Constant::NegativeInfinity => "-INF",
            Constant::Avogadro => "avogadro",
        }),
    }
}

/// Reals always carry a point so they read back as reals.
fn write_real<W: Write>(out: &mut W, value: f64) -> fmt::Result {
    let text = value.to_string();
    out.write_str(&text)?;
    if !text.contains(['.', 'e', 'E']) {
        out.write_str(".0")?;
    }
    Ok(())
}
