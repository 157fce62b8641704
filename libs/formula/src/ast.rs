//! Expression tree for model formulas
//!
//! One [`ExprNode`] per formula node; every interior node owns its children.
//! The tree is shared by both concrete syntaxes (infix text and MathML) and
//! by the unit checker.
//!
//! # Node kinds
//!
//! - `Number`: integer, real, e-notation, rational literals and the constant
//!   symbols (`pi`, `exponentiale`, `true`, `false`, NaN, ±infinity, avogadro)
//! - `Identifier`: reference to a model symbol
//! - `Time`: the simulation-time symbol
//! - `Operator`: arithmetic, relational and logical operators
//! - `Function`: built-in functions, `log`/`root` with explicit base/degree,
//!   `delay`, and calls to user-defined functions
//! - `Piecewise`, `Lambda`, `Semantics`
//!
//! `log` and `root` always hold two children: the base (or degree) first,
//! then the argument. The one-argument spellings exist only in the syntaxes.

use crate::error::{Error, Result};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;

/// Allowed child count of a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exactly(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    pub const fn between(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "exactly {} argument(s)", max),
            Some(max) if max == self.min + 1 => write!(f, "{} or {} arguments", self.min, max),
            Some(max) => write!(f, "{} to {} arguments", self.min, max),
            None => write!(f, "at least {} argument(s)", self.min),
        }
    }
}

/// Constant symbols. NaN and the infinities live here rather than in
/// `Real` so that structural equality stays reflexive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    Pi,
    ExponentialE,
    True,
    False,
    NaN,
    Infinity,
    NegativeInfinity,
    Avogadro,
}

/// Literal payload; the variant records the literal form it was written in.
#[derive(Debug, Clone, PartialEq)]
pub enum NumberValue {
    Integer(i64),
    Real(f64),
    RealWithExponent { mantissa: f64, exponent: i64 },
    Rational { numerator: i64, denominator: i64 },
    Constant(Constant),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Number {
    pub value: NumberValue,
    /// Id of the unit definition declared on the literal, if any.
    pub units: Option<String>,
}

impl Number {
    pub fn integer(value: i64) -> Self {
        NumberValue::Integer(value).into()
    }

    /// A real literal; non-finite values become the matching constant.
    pub fn real(value: f64) -> Self {
        let value = if value.is_nan() {
            NumberValue::Constant(Constant::NaN)
        } else if value == f64::INFINITY {
            NumberValue::Constant(Constant::Infinity)
        } else if value == f64::NEG_INFINITY {
            NumberValue::Constant(Constant::NegativeInfinity)
        } else {
            NumberValue::Real(value)
        };
        value.into()
    }

    pub fn real_with_exponent(mantissa: f64, exponent: i64) -> Self {
        NumberValue::RealWithExponent { mantissa, exponent }.into()
    }

    pub fn rational(numerator: i64, denominator: i64) -> Self {
        NumberValue::Rational {
            numerator,
            denominator,
        }
        .into()
    }

    pub fn constant(constant: Constant) -> Self {
        NumberValue::Constant(constant).into()
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Numeric value as a double, `None` for the boolean constants.
    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            NumberValue::Integer(i) => Some(i as f64),
            NumberValue::Real(r) => Some(r),
            NumberValue::RealWithExponent { mantissa, exponent } => {
                Some(mantissa * 10f64.powf(exponent as f64))
            }
            NumberValue::Rational {
                numerator,
                denominator,
            } => Some(numerator as f64 / denominator as f64),
            NumberValue::Constant(c) => match c {
                Constant::Pi => Some(std::f64::consts::PI),
                Constant::ExponentialE => Some(std::f64::consts::E),
                Constant::NaN => Some(f64::NAN),
                Constant::Infinity => Some(f64::INFINITY),
                Constant::NegativeInfinity => Some(f64::NEG_INFINITY),
                Constant::Avogadro => Some(6.022_140_76e23),
                Constant::True | Constant::False => None,
            },
        }
    }

    /// Whether the literal is written with a leading minus sign.
    pub fn is_negative(&self) -> bool {
        match self.value {
            NumberValue::Integer(i) => i < 0,
            NumberValue::Real(r) => r.is_sign_negative(),
            NumberValue::RealWithExponent { mantissa, .. } => mantissa.is_sign_negative(),
            NumberValue::Rational { numerator, .. } => numerator < 0,
            NumberValue::Constant(c) => c == Constant::NegativeInfinity,
        }
    }
}

impl From<NumberValue> for Number {
    fn from(value: NumberValue) -> Self {
        Number { value, units: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Plus,
    Minus,
    Times,
    Divide,
    Power,
    Eq,
    Neq,
    Gt,
    Lt,
    Geq,
    Leq,
    And,
    Or,
    Xor,
    Not,
}

impl Operator {
    pub fn arity(self) -> Arity {
        match self {
            Operator::Plus | Operator::Times | Operator::And | Operator::Or | Operator::Xor => {
                Arity::at_least(0)
            }
            Operator::Minus => Arity::between(1, 2),
            Operator::Divide | Operator::Power | Operator::Neq => Arity::exactly(2),
            Operator::Eq | Operator::Gt | Operator::Lt | Operator::Geq | Operator::Leq => {
                Arity::at_least(2)
            }
            Operator::Not => Arity::exactly(1),
        }
    }

    /// MathML element name, also the function-call spelling in infix text.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Plus => "plus",
            Operator::Minus => "minus",
            Operator::Times => "times",
            Operator::Divide => "divide",
            Operator::Power => "power",
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Geq => "geq",
            Operator::Leq => "leq",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Xor => "xor",
            Operator::Not => "not",
        }
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::Neq | Operator::Gt | Operator::Lt | Operator::Geq | Operator::Leq
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(
            self,
            Operator::And | Operator::Or | Operator::Xor | Operator::Not
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Function {
    Abs,
    Ceiling,
    Floor,
    Exp,
    Ln,
    Factorial,
    Sin,
    Cos,
    Tan,
    Sec,
    Csc,
    Cot,
    Sinh,
    Cosh,
    Tanh,
    Sech,
    Csch,
    Coth,
    Arcsin,
    Arccos,
    Arctan,
    Arcsec,
    Arccsc,
    Arccot,
    Arcsinh,
    Arccosh,
    Arctanh,
    Arcsech,
    Arccsch,
    Arccoth,
    /// Base first, then argument.
    Log,
    /// Degree first, then radicand.
    Root,
    /// Delayed value: expression, then delay.
    Delay,
    /// Call to a function definition by id.
    User(String),
}

impl Function {
    pub fn arity(&self) -> Arity {
        match self {
            Function::Log | Function::Root | Function::Delay => Arity::exactly(2),
            Function::User(_) => Arity::at_least(0),
            _ => Arity::exactly(1),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Function::Abs => "abs",
            Function::Ceiling => "ceiling",
            Function::Floor => "floor",
            Function::Exp => "exp",
            Function::Ln => "ln",
            Function::Factorial => "factorial",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Sec => "sec",
            Function::Csc => "csc",
            Function::Cot => "cot",
            Function::Sinh => "sinh",
            Function::Cosh => "cosh",
            Function::Tanh => "tanh",
            Function::Sech => "sech",
            Function::Csch => "csch",
            Function::Coth => "coth",
            Function::Arcsin => "arcsin",
            Function::Arccos => "arccos",
            Function::Arctan => "arctan",
            Function::Arcsec => "arcsec",
            Function::Arccsc => "arccsc",
            Function::Arccot => "arccot",
            Function::Arcsinh => "arcsinh",
            Function::Arccosh => "arccosh",
            Function::Arctanh => "arctanh",
            Function::Arcsech => "arcsech",
            Function::Arccsch => "arccsch",
            Function::Arccoth => "arccoth",
            Function::Log => "log",
            Function::Root => "root",
            Function::Delay => "delay",
            Function::User(name) => name,
        }
    }

    /// Trigonometric, hyperbolic and their inverses.
    pub fn is_trigonometric(&self) -> bool {
        matches!(
            self,
            Function::Sin
                | Function::Cos
                | Function::Tan
                | Function::Sec
                | Function::Csc
                | Function::Cot
                | Function::Sinh
                | Function::Cosh
                | Function::Tanh
                | Function::Sech
                | Function::Csch
                | Function::Coth
                | Function::Arcsin
                | Function::Arccos
                | Function::Arctan
                | Function::Arcsec
                | Function::Arccsc
                | Function::Arccot
                | Function::Arcsinh
                | Function::Arccosh
                | Function::Arctanh
                | Function::Arcsech
                | Function::Arccsch
                | Function::Arccoth
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub value: ExprNode,
    pub condition: ExprNode,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Piecewise {
    pub pieces: Vec<Piece>,
    pub otherwise: Option<Box<ExprNode>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Box<ExprNode>,
}

impl Lambda {
    pub fn new(params: Vec<String>, body: ExprNode) -> Self {
        Self {
            params,
            body: Box::new(body),
        }
    }
}

/// Foreign annotation markup carried verbatim (`annotation` or
/// `annotation-xml` element, including its tags).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation(pub String);

#[derive(Debug, Clone, PartialEq)]
pub struct Semantics {
    pub definition_url: Option<String>,
    pub inner: Box<ExprNode>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Number(Number),
    Identifier(String),
    /// Simulation time; the name is the text the document uses for it.
    Time(String),
    Operator { op: Operator, args: Vec<ExprNode> },
    Function { func: Function, args: Vec<ExprNode> },
    Piecewise(Piecewise),
    Lambda(Lambda),
    Semantics(Semantics),
}

/// Location of a node: child indices from the root, in the flat child order
/// of [`ExprNode::children`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath(SmallVec<[usize; 8]>);

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, index: usize) -> Self {
        let mut path = self.clone();
        path.0.push(index);
        path
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for index in &self.0 {
            write!(f, "/{}", index)?;
        }
        Ok(())
    }
}

impl From<Number> for ExprNode {
    fn from(number: Number) -> Self {
        ExprNode::Number(number)
    }
}

impl ExprNode {
    // ============================================
    // Construction
    // ============================================

    pub fn integer(value: i64) -> Self {
        Number::integer(value).into()
    }

    pub fn real(value: f64) -> Self {
        Number::real(value).into()
    }

    pub fn rational(numerator: i64, denominator: i64) -> Self {
        Number::rational(numerator, denominator).into()
    }

    pub fn constant(constant: Constant) -> Self {
        Number::constant(constant).into()
    }

    pub fn ident(name: impl Into<String>) -> Self {
        ExprNode::Identifier(name.into())
    }

    /// Operator node with its child count checked against the operator's arity.
    pub fn operator(op: Operator, args: Vec<ExprNode>) -> Result<Self> {
        check_arity(op.as_str(), op.arity(), args.len())?;
        Ok(ExprNode::Operator { op, args })
    }

    /// Function node with its child count checked against the function's arity.
    pub fn function(func: Function, args: Vec<ExprNode>) -> Result<Self> {
        check_arity(func.name(), func.arity(), args.len())?;
        Ok(ExprNode::Function { func, args })
    }

    pub fn call(name: impl Into<String>, args: Vec<ExprNode>) -> Self {
        ExprNode::Function {
            func: Function::User(name.into()),
            args,
        }
    }

    pub fn plus(lhs: ExprNode, rhs: ExprNode) -> Self {
        Self::binary(Operator::Plus, lhs, rhs)
    }

    pub fn minus(lhs: ExprNode, rhs: ExprNode) -> Self {
        Self::binary(Operator::Minus, lhs, rhs)
    }

    pub fn times(lhs: ExprNode, rhs: ExprNode) -> Self {
        Self::binary(Operator::Times, lhs, rhs)
    }

    pub fn divide(lhs: ExprNode, rhs: ExprNode) -> Self {
        Self::binary(Operator::Divide, lhs, rhs)
    }

    pub fn power(base: ExprNode, exponent: ExprNode) -> Self {
        Self::binary(Operator::Power, base, exponent)
    }

    pub fn negate(operand: ExprNode) -> Self {
        ExprNode::Operator {
            op: Operator::Minus,
            args: vec![operand],
        }
    }

    fn binary(op: Operator, lhs: ExprNode, rhs: ExprNode) -> Self {
        debug_assert!(op.arity().accepts(2));
        ExprNode::Operator {
            op,
            args: vec![lhs, rhs],
        }
    }

    pub fn log(base: ExprNode, arg: ExprNode) -> Self {
        ExprNode::Function {
            func: Function::Log,
            args: vec![base, arg],
        }
    }

    pub fn log10(arg: ExprNode) -> Self {
        Self::log(ExprNode::integer(10), arg)
    }

    pub fn root(degree: ExprNode, radicand: ExprNode) -> Self {
        ExprNode::Function {
            func: Function::Root,
            args: vec![degree, radicand],
        }
    }

    pub fn sqrt(radicand: ExprNode) -> Self {
        Self::root(ExprNode::integer(2), radicand)
    }

    pub fn delay(expr: ExprNode, delay: ExprNode) -> Self {
        ExprNode::Function {
            func: Function::Delay,
            args: vec![expr, delay],
        }
    }

    /// One-argument function node; fails for functions that take more.
    pub fn unary(func: Function, arg: ExprNode) -> Result<Self> {
        Self::function(func, vec![arg])
    }

    // ============================================
    // Children
    // ============================================

    /// All child nodes in document order. A piecewise yields value, condition
    /// pairs followed by the otherwise value; a lambda yields its body only.
    pub fn children(&self) -> Vec<&ExprNode> {
        match self {
            ExprNode::Number(_) | ExprNode::Identifier(_) | ExprNode::Time(_) => Vec::new(),
            ExprNode::Operator { args, .. } | ExprNode::Function { args, .. } => {
                args.iter().collect()
            }
            ExprNode::Piecewise(pw) => {
                let mut out = Vec::with_capacity(pw.pieces.len() * 2 + 1);
                for piece in &pw.pieces {
                    out.push(&piece.value);
                    out.push(&piece.condition);
                }
                if let Some(otherwise) = &pw.otherwise {
                    out.push(otherwise.as_ref());
                }
                out
            }
            ExprNode::Lambda(lambda) => vec![lambda.body.as_ref()],
            ExprNode::Semantics(sem) => vec![sem.inner.as_ref()],
        }
    }

    pub fn num_children(&self) -> usize {
        match self {
            ExprNode::Number(_) | ExprNode::Identifier(_) | ExprNode::Time(_) => 0,
            ExprNode::Operator { args, .. } | ExprNode::Function { args, .. } => args.len(),
            ExprNode::Piecewise(pw) => pw.pieces.len() * 2 + usize::from(pw.otherwise.is_some()),
            ExprNode::Lambda(_) | ExprNode::Semantics(_) => 1,
        }
    }

    pub fn child(&self, index: usize) -> Option<&ExprNode> {
        match self {
            ExprNode::Operator { args, .. } | ExprNode::Function { args, .. } => args.get(index),
            ExprNode::Piecewise(pw) => {
                let paired = pw.pieces.len() * 2;
                if index < paired {
                    let piece = &pw.pieces[index / 2];
                    Some(if index % 2 == 0 {
                        &piece.value
                    } else {
                        &piece.condition
                    })
                } else if index == paired {
                    pw.otherwise.as_deref()
                } else {
                    None
                }
            }
            ExprNode::Lambda(lambda) if index == 0 => Some(&lambda.body),
            ExprNode::Semantics(sem) if index == 0 => Some(&sem.inner),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut ExprNode> {
        match self {
            ExprNode::Operator { args, .. } | ExprNode::Function { args, .. } => {
                args.get_mut(index)
            }
            ExprNode::Piecewise(pw) => {
                let paired = pw.pieces.len() * 2;
                if index < paired {
                    let piece = &mut pw.pieces[index / 2];
                    Some(if index % 2 == 0 {
                        &mut piece.value
                    } else {
                        &mut piece.condition
                    })
                } else if index == paired {
                    pw.otherwise.as_deref_mut()
                } else {
                    None
                }
            }
            ExprNode::Lambda(lambda) if index == 0 => Some(&mut lambda.body),
            ExprNode::Semantics(sem) if index == 0 => Some(&mut sem.inner),
            _ => None,
        }
    }

    /// Node at `path`, if the path exists in this tree.
    pub fn at(&self, path: &NodePath) -> Option<&ExprNode> {
        path.indices()
            .iter()
            .try_fold(self, |node, &index| node.child(index))
    }

    /// Short label used in error messages.
    pub fn label(&self) -> String {
        match self {
            ExprNode::Number(_) => "number".to_string(),
            ExprNode::Identifier(name) | ExprNode::Time(name) => name.clone(),
            ExprNode::Operator { op, .. } => op.as_str().to_string(),
            ExprNode::Function { func, .. } => func.name().to_string(),
            ExprNode::Piecewise(_) => "piecewise".to_string(),
            ExprNode::Lambda(_) => "lambda".to_string(),
            ExprNode::Semantics(_) => "semantics".to_string(),
        }
    }

    fn args_with_arity(&mut self) -> Result<(&mut Vec<ExprNode>, Arity, String)> {
        match self {
            ExprNode::Operator { op, args } => Ok((args, op.arity(), op.as_str().to_string())),
            ExprNode::Function { func, args } => Ok((args, func.arity(), func.name().to_string())),
            other => Err(Error::Unsupported(format!(
                "'{}' has no argument list",
                other.label()
            ))),
        }
    }

    pub fn add_child(&mut self, child: ExprNode) -> Result<()> {
        let (args, arity, node) = self.args_with_arity()?;
        check_arity(&node, arity, args.len() + 1)?;
        args.push(child);
        Ok(())
    }

    pub fn insert_child(&mut self, index: usize, child: ExprNode) -> Result<()> {
        let (args, arity, node) = self.args_with_arity()?;
        if index > args.len() {
            return Err(Error::IndexOutOfRange {
                node,
                index,
                len: args.len(),
            });
        }
        check_arity(&node, arity, args.len() + 1)?;
        args.insert(index, child);
        Ok(())
    }

    pub fn remove_child(&mut self, index: usize) -> Result<ExprNode> {
        let (args, arity, node) = self.args_with_arity()?;
        if index >= args.len() {
            return Err(Error::IndexOutOfRange {
                node,
                index,
                len: args.len(),
            });
        }
        check_arity(&node, arity, args.len() - 1)?;
        Ok(args.remove(index))
    }

    /// Replaces the child at `index`, returning the old one. Works on every
    /// interior node since the child count does not change.
    pub fn replace_child(&mut self, index: usize, child: ExprNode) -> Result<ExprNode> {
        let len = self.num_children();
        let label = self.label();
        match self.child_mut(index) {
            Some(slot) => Ok(std::mem::replace(slot, child)),
            None if len == 0 => Err(Error::Unsupported(format!("'{}' has no children", label))),
            None => Err(Error::IndexOutOfRange {
                node: label,
                index,
                len,
            }),
        }
    }

    /// Exchanges the argument lists of two operator/function nodes. Both
    /// resulting nodes must stay within their arity; nothing changes otherwise.
    pub fn swap_children(&mut self, other: &mut ExprNode) -> Result<()> {
        let (mine, my_arity, my_name) = self.args_with_arity()?;
        let (theirs, their_arity, their_name) = other.args_with_arity()?;
        check_arity(&my_name, my_arity, theirs.len())?;
        check_arity(&their_name, their_arity, mine.len())?;
        std::mem::swap(mine, theirs);
        Ok(())
    }

    // ============================================
    // Predicates
    // ============================================

    /// Numeric literal (integer, real, e-notation, rational, NaN or infinity).
    pub fn is_number(&self) -> bool {
        match self {
            ExprNode::Number(n) => !matches!(
                n.value,
                NumberValue::Constant(
                    Constant::Pi
                        | Constant::ExponentialE
                        | Constant::True
                        | Constant::False
                        | Constant::Avogadro
                )
            ),
            _ => false,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ExprNode::Number(Number {
                value: NumberValue::Integer(_),
                ..
            })
        )
    }

    pub fn is_rational(&self) -> bool {
        matches!(
            self,
            ExprNode::Number(Number {
                value: NumberValue::Rational { .. },
                ..
            })
        )
    }

    /// `pi`, `exponentiale`, `true`, `false` or `avogadro`.
    pub fn is_constant(&self) -> bool {
        matches!(self, ExprNode::Number(_)) && !self.is_number()
    }

    /// Nodes whose value is a truth value.
    pub fn is_boolean(&self) -> bool {
        match self {
            ExprNode::Number(n) => matches!(
                n.value,
                NumberValue::Constant(Constant::True | Constant::False)
            ),
            ExprNode::Operator { op, .. } => op.is_relational() || op.is_logical(),
            _ => false,
        }
    }

    pub fn is_relational(&self) -> bool {
        matches!(self, ExprNode::Operator { op, .. } if op.is_relational())
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, ExprNode::Operator { op, .. } if op.is_logical())
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self, ExprNode::Identifier(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, ExprNode::Function { .. })
    }

    pub fn is_user_function(&self) -> bool {
        matches!(
            self,
            ExprNode::Function {
                func: Function::User(_),
                ..
            }
        )
    }

    pub fn is_unary_minus(&self) -> bool {
        matches!(self, ExprNode::Operator { op: Operator::Minus, args } if args.len() == 1)
    }

    /// `log` whose base is the plain integer literal 10.
    pub fn is_log10(&self) -> bool {
        matches!(self, ExprNode::Function { func: Function::Log, args }
            if args.len() == 2 && is_plain_integer(&args[0], 10))
    }

    /// `root` whose degree is the plain integer literal 2.
    pub fn is_sqrt(&self) -> bool {
        matches!(self, ExprNode::Function { func: Function::Root, args }
            if args.len() == 2 && is_plain_integer(&args[0], 2))
    }

    /// Checks every node of the tree against its arity.
    pub fn has_correct_arity(&self) -> bool {
        let own = match self {
            ExprNode::Operator { op, args } => op.arity().accepts(args.len()),
            ExprNode::Function { func, args } => func.arity().accepts(args.len()),
            ExprNode::Number(Number {
                value: NumberValue::Rational { denominator, .. },
                ..
            }) => *denominator != 0,
            _ => true,
        };
        own && self.children().into_iter().all(ExprNode::has_correct_arity)
    }

    // ============================================
    // Symbols
    // ============================================

    /// Referenced identifiers, each once, in first-seen order.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        self.walk(&mut |node| {
            if let ExprNode::Identifier(name) = node {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
        });
        out
    }

    /// Ids of the user-defined functions this tree calls.
    pub fn called_functions(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        self.walk(&mut |node| {
            if let ExprNode::Function {
                func: Function::User(name),
                ..
            } = node
            {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
        });
        out
    }

    /// Pre-order traversal.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ExprNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Renames identifier references and user-function calls.
    pub fn rename_identifier(&mut self, old: &str, new: &str) {
        match self {
            ExprNode::Identifier(name) if name.as_str() == old => *name = new.to_string(),
            ExprNode::Function {
                func: Function::User(name),
                ..
            } if name.as_str() == old => *name = new.to_string(),
            _ => {}
        }
        for index in 0..self.num_children() {
            if let Some(child) = self.child_mut(index) {
                child.rename_identifier(old, new);
            }
        }
    }

    /// Replaces every free occurrence of identifier `name` with `replacement`.
    pub fn replace_identifier(&mut self, name: &str, replacement: &ExprNode) {
        let mut bindings = HashMap::new();
        bindings.insert(name, replacement);
        *self = self.substitute(&bindings);
    }

    /// Simultaneous substitution of free identifiers; lambda parameters
    /// shadow outer bindings.
    pub fn substitute(&self, bindings: &HashMap<&str, &ExprNode>) -> ExprNode {
        match self {
            ExprNode::Identifier(name) => match bindings.get(name.as_str()) {
                Some(replacement) => (*replacement).clone(),
                None => self.clone(),
            },
            ExprNode::Lambda(lambda) => {
                let inner: HashMap<&str, &ExprNode> = bindings
                    .iter()
                    .filter(|(k, _)| !lambda.params.iter().any(|p| p == *k))
                    .map(|(k, v)| (*k, *v))
                    .collect();
                ExprNode::Lambda(Lambda {
                    params: lambda.params.clone(),
                    body: Box::new(lambda.body.substitute(&inner)),
                })
            }
            _ => {
                let mut copy = self.clone();
                for index in 0..copy.num_children() {
                    if let Some(child) = copy.child_mut(index) {
                        *child = child.substitute(bindings);
                    }
                }
                copy
            }
        }
    }

    /// Instantiates a function definition's body with call arguments.
    pub fn expand_call(lambda: &Lambda, args: &[ExprNode]) -> Result<ExprNode> {
        check_arity(
            "lambda",
            Arity::exactly(lambda.params.len()),
            args.len(),
        )?;
        let bindings: HashMap<&str, &ExprNode> = lambda
            .params
            .iter()
            .map(String::as_str)
            .zip(args.iter())
            .collect();
        Ok(lambda.body.substitute(&bindings))
    }
}

fn is_plain_integer(node: &ExprNode, value: i64) -> bool {
    matches!(node, ExprNode::Number(Number { value: NumberValue::Integer(v), units: None }) if *v == value)
}

fn check_arity(node: &str, arity: Arity, count: usize) -> Result<()> {
    if arity.accepts(count) {
        Ok(())
    } else {
        Err(Error::InvalidArity {
            node: node.to_string(),
            count,
            expected: arity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> ExprNode {
        ExprNode::ident("x")
    }

    #[test]
    fn operator_construction_checks_arity() {
        assert!(ExprNode::operator(Operator::Divide, vec![x()]).is_err());
        assert!(ExprNode::operator(Operator::Plus, vec![]).is_ok());
        assert!(ExprNode::operator(Operator::Neq, vec![x(), x(), x()]).is_err());
        assert!(ExprNode::function(Function::Sin, vec![x(), x()]).is_err());
        assert!(ExprNode::function(Function::User("f".into()), vec![x(), x()]).is_ok());
        assert!(ExprNode::unary(Function::Delay, x()).is_err());
        assert!(ExprNode::unary(Function::Exp, x()).unwrap().is_function());
    }

    #[test]
    fn add_child_respects_arity() {
        let mut div = ExprNode::divide(x(), x());
        let err = div.add_child(x()).unwrap_err();
        assert!(matches!(err, Error::InvalidArity { count: 3, .. }));

        let mut neg = ExprNode::negate(x());
        neg.add_child(ExprNode::integer(1)).unwrap();
        assert_eq!(neg, ExprNode::minus(x(), ExprNode::integer(1)));
        assert!(neg.add_child(x()).is_err());
    }

    #[test]
    fn remove_child_respects_arity() {
        let mut sum = ExprNode::plus(x(), ExprNode::integer(1));
        assert_eq!(sum.remove_child(1).unwrap(), ExprNode::integer(1));
        assert_eq!(sum.remove_child(0).unwrap(), x());
        assert!(matches!(
            sum.remove_child(0),
            Err(Error::IndexOutOfRange { .. })
        ));

        let mut pow = ExprNode::power(x(), ExprNode::integer(2));
        assert!(matches!(
            pow.remove_child(0),
            Err(Error::InvalidArity { .. })
        ));
    }

    #[test]
    fn leaves_have_no_argument_list() {
        let mut leaf = x();
        assert!(matches!(leaf.add_child(x()), Err(Error::Unsupported(_))));
        assert!(matches!(
            leaf.replace_child(0, x()),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn insert_child_positions() {
        let mut sum = ExprNode::plus(ExprNode::ident("a"), ExprNode::ident("c"));
        sum.insert_child(1, ExprNode::ident("b")).unwrap();
        assert_eq!(sum.identifiers(), vec!["a", "b", "c"]);
        assert!(sum.insert_child(9, x()).is_err());
    }

    #[test]
    fn swap_children_between_kinds() {
        let mut sum = ExprNode::plus(ExprNode::ident("a"), ExprNode::ident("b"));
        let mut call = ExprNode::call("f", vec![ExprNode::ident("c"), ExprNode::ident("d")]);
        sum.swap_children(&mut call).unwrap();
        assert_eq!(sum.identifiers(), vec!["c", "d"]);
        assert_eq!(call.identifiers(), vec!["a", "b"]);

        let mut three = ExprNode::operator(Operator::Times, vec![x(), x(), x()]).unwrap();
        let mut div = ExprNode::divide(ExprNode::ident("p"), ExprNode::ident("q"));
        assert!(matches!(
            three.swap_children(&mut div),
            Err(Error::InvalidArity { .. })
        ));
        assert_eq!(div.identifiers(), vec!["p", "q"]);

        let mut leaf = ExprNode::integer(3);
        assert!(matches!(
            div.swap_children(&mut leaf),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn replace_child_in_piecewise() {
        let mut pw = ExprNode::Piecewise(Piecewise {
            pieces: vec![Piece {
                value: ExprNode::integer(1),
                condition: ExprNode::constant(Constant::True),
            }],
            otherwise: Some(Box::new(ExprNode::integer(0))),
        });
        assert_eq!(pw.num_children(), 3);
        let old = pw.replace_child(2, ExprNode::integer(5)).unwrap();
        assert_eq!(old, ExprNode::integer(0));
        assert_eq!(pw.child(2), Some(&ExprNode::integer(5)));
        assert!(pw.replace_child(3, x()).is_err());
    }

    #[test]
    fn clone_is_deep() {
        let original = ExprNode::plus(x(), ExprNode::sqrt(ExprNode::ident("y")));
        let mut copy = original.clone();
        copy.rename_identifier("y", "z");
        assert_eq!(original.identifiers(), vec!["x", "y"]);
        assert_eq!(copy.identifiers(), vec!["x", "z"]);
    }

    #[test]
    fn special_forms() {
        assert!(ExprNode::log10(x()).is_log10());
        assert!(!ExprNode::log(ExprNode::integer(2), x()).is_log10());
        assert!(!ExprNode::log(ExprNode::real(10.0), x()).is_log10());
        assert!(ExprNode::sqrt(x()).is_sqrt());
        assert!(!ExprNode::root(ExprNode::integer(3), x()).is_sqrt());
        let with_units = ExprNode::root(Number::integer(2).with_units("dimensionless").into(), x());
        assert!(!with_units.is_sqrt());
    }

    #[test]
    fn classification() {
        assert!(ExprNode::integer(1).is_number());
        assert!(ExprNode::constant(Constant::NaN).is_number());
        assert!(!ExprNode::constant(Constant::Pi).is_number());
        assert!(ExprNode::constant(Constant::Pi).is_constant());
        assert!(ExprNode::constant(Constant::True).is_boolean());
        let lt = ExprNode::operator(Operator::Lt, vec![x(), ExprNode::integer(1)]).unwrap();
        assert!(lt.is_relational());
        assert!(lt.is_boolean());
        assert!(!ExprNode::plus(x(), x()).is_boolean());
        assert!(ExprNode::negate(x()).is_unary_minus());
    }

    #[test]
    fn real_maps_non_finite_to_constants() {
        assert_eq!(ExprNode::real(f64::NAN), ExprNode::constant(Constant::NaN));
        assert_eq!(
            ExprNode::real(f64::NEG_INFINITY),
            ExprNode::constant(Constant::NegativeInfinity)
        );
    }

    #[test]
    fn expand_call_substitutes_simultaneously() {
        let lambda = Lambda::new(
            vec!["a".into(), "b".into()],
            ExprNode::minus(ExprNode::ident("a"), ExprNode::ident("b")),
        );
        let body =
            ExprNode::expand_call(&lambda, &[ExprNode::ident("b"), ExprNode::ident("a")]).unwrap();
        assert_eq!(body, ExprNode::minus(ExprNode::ident("b"), ExprNode::ident("a")));
        assert!(ExprNode::expand_call(&lambda, &[x()]).is_err());
    }

    #[test]
    fn substitution_respects_lambda_scope() {
        let mut tree = ExprNode::plus(
            x(),
            ExprNode::Lambda(Lambda::new(vec!["x".into()], x())),
        );
        tree.replace_identifier("x", &ExprNode::integer(3));
        let expected = ExprNode::plus(
            ExprNode::integer(3),
            ExprNode::Lambda(Lambda::new(vec!["x".into()], x())),
        );
        assert_eq!(tree, expected);
    }

    #[test]
    fn node_paths() {
        let tree = ExprNode::plus(x(), ExprNode::sqrt(ExprNode::ident("y")));
        let path = NodePath::root().child(1).child(1);
        assert_eq!(path.to_string(), "/1/1");
        assert_eq!(tree.at(&path), Some(&ExprNode::ident("y")));
        assert_eq!(NodePath::root().to_string(), "/");
        assert_eq!(tree.at(&NodePath::root().child(7)), None);
    }
}
