//! Content MathML writer
//!
//! Structural inverse of the reader: reading the output gives back the same
//! tree. Defaults are left implicit where the reader restores them (`real`
//! cn type, log base 10, root degree 2).

use crate::error::Result;
use crate::{AVOGADRO_URL, DELAY_URL, MATHML_NS, SBML_NS, TIME_URL};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use sbmlmath_formula::{Constant, ExprNode, Function, Number, NumberValue, Operator};
use std::io::Cursor;

/// Writer configuration
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Spaces per nesting level; 0 writes everything on one line.
    pub indent: usize,
    /// Emit `<?xml version="1.0" encoding="UTF-8"?>` first.
    pub xml_declaration: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            xml_declaration: false,
        }
    }
}

/// Write `node` as a `<math>` element.
pub fn write_math(node: &ExprNode) -> Result<String> {
    write_math_with(node, &WriteOptions::default())
}

pub fn write_math_with(node: &ExprNode, options: &WriteOptions) -> Result<String> {
    let cursor = Cursor::new(Vec::new());
    let writer = if options.indent > 0 {
        Writer::new_with_indent(cursor, b' ', options.indent)
    } else {
        Writer::new(cursor)
    };
    let mut out = MathWriter { writer };

    if options.xml_declaration {
        out.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    }

    let mut math = BytesStart::new("math");
    math.push_attribute(("xmlns", MATHML_NS));
    if uses_units(node) {
        math.push_attribute(("xmlns:sbml", SBML_NS));
    }
    out.writer.write_event(Event::Start(math))?;
    out.node(node)?;
    out.writer.write_event(Event::End(BytesEnd::new("math")))?;

    let bytes = out.writer.into_inner().into_inner();
    Ok(String::from_utf8(bytes)?)
}

fn uses_units(node: &ExprNode) -> bool {
    let mut found = false;
    node.walk(&mut |n| {
        if matches!(n, ExprNode::Number(Number { units: Some(_), .. })) {
            found = true;
        }
    });
    found
}

struct MathWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl MathWriter {
    fn empty(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::Empty(BytesStart::new(name)))?;
        Ok(())
    }

    fn open(&mut self, start: BytesStart<'_>) -> Result<()> {
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    /// `<name attrs>text</name>`
    fn leaf(&mut self, start: BytesStart<'_>, text: &str) -> Result<()> {
        let name = String::from_utf8(start.name().as_ref().to_vec())?;
        self.open(start)?;
        self.text(text)?;
        self.close(&name)
    }

    fn csymbol(&mut self, url: &str, name: &str) -> Result<()> {
        let mut start = BytesStart::new("csymbol");
        start.push_attribute(("encoding", "text"));
        start.push_attribute(("definitionURL", url));
        self.leaf(start, name)
    }

    fn node(&mut self, node: &ExprNode) -> Result<()> {
        match node {
            ExprNode::Number(number) => self.number(number),
            ExprNode::Identifier(name) => self.leaf(BytesStart::new("ci"), name),
            ExprNode::Time(name) => self.csymbol(TIME_URL, name),
            ExprNode::Operator { op, args } => {
                self.open(BytesStart::new("apply"))?;
                self.empty(op.as_str())?;
                self.children(args)?;
                self.close("apply")
            }
            ExprNode::Function { func, args } => self.function(func, args),
            ExprNode::Piecewise(pw) => {
                if pw.pieces.is_empty() && pw.otherwise.is_none() {
                    return self.empty("piecewise");
                }
                self.open(BytesStart::new("piecewise"))?;
                for piece in &pw.pieces {
                    self.open(BytesStart::new("piece"))?;
                    self.node(&piece.value)?;
                    self.node(&piece.condition)?;
                    self.close("piece")?;
                }
                if let Some(otherwise) = &pw.otherwise {
                    self.open(BytesStart::new("otherwise"))?;
                    self.node(otherwise)?;
                    self.close("otherwise")?;
                }
                self.close("piecewise")
            }
            ExprNode::Lambda(lambda) => {
                self.open(BytesStart::new("lambda"))?;
                for param in &lambda.params {
                    self.open(BytesStart::new("bvar"))?;
                    self.leaf(BytesStart::new("ci"), param)?;
                    self.close("bvar")?;
                }
                self.node(&lambda.body)?;
                self.close("lambda")
            }
            ExprNode::Semantics(sem) => {
                let mut start = BytesStart::new("semantics");
                if let Some(url) = &sem.definition_url {
                    start.push_attribute(("definitionURL", url.as_str()));
                }
                self.open(start)?;
                self.node(&sem.inner)?;
                for annotation in &sem.annotations {
                    // Already markup; written as-is.
                    self.writer
                        .write_event(Event::Text(BytesText::from_escaped(annotation.0.as_str())))?;
                }
                self.close("semantics")
            }
        }
    }

    fn children(&mut self, args: &[ExprNode]) -> Result<()> {
        for arg in args {
            self.node(arg)?;
        }
        Ok(())
    }

    fn function(&mut self, func: &Function, args: &[ExprNode]) -> Result<()> {
        self.open(BytesStart::new("apply"))?;
        match func {
            Function::User(name) => {
                self.leaf(BytesStart::new("ci"), name)?;
                self.children(args)?;
            }
            Function::Delay => {
                self.csymbol(DELAY_URL, "delay")?;
                self.children(args)?;
            }
            Function::Log | Function::Root => {
                let (qualifier, default) = if *func == Function::Log {
                    ("logbase", 10)
                } else {
                    ("degree", 2)
                };
                self.empty(func.name())?;
                if let [first, rest @ ..] = args {
                    if !is_plain_integer(first, default) {
                        self.open(BytesStart::new(qualifier))?;
                        self.node(first)?;
                        self.close(qualifier)?;
                    }
                    self.children(rest)?;
                }
            }
            builtin => {
                self.empty(builtin.name())?;
                self.children(args)?;
            }
        }
        self.close("apply")
    }

    fn number(&mut self, number: &Number) -> Result<()> {
        let mut cn = BytesStart::new("cn");
        let units = number.units.as_deref();

        let (kind, first, second) = match number.value {
            NumberValue::Integer(i) => (Some("integer"), i.to_string(), None),
            NumberValue::Real(r) => (None, r.to_string(), None),
            NumberValue::RealWithExponent { mantissa, exponent } => (
                Some("e-notation"),
                mantissa.to_string(),
                Some(exponent.to_string()),
            ),
            NumberValue::Rational {
                numerator,
                denominator,
            } => (
                Some("rational"),
                numerator.to_string(),
                Some(denominator.to_string()),
            ),
            NumberValue::Constant(constant) => return self.constant(constant, units),
        };

        if let Some(kind) = kind {
            cn.push_attribute(("type", kind));
        }
        if let Some(units) = units {
            cn.push_attribute(("sbml:units", units));
        }
        self.open(cn)?;
        self.text(&first)?;
        if let Some(second) = second {
            self.empty("sep")?;
            self.text(&second)?;
        }
        self.close("cn")
    }

    fn constant(&mut self, constant: Constant, units: Option<&str>) -> Result<()> {
        // Only <cn> can carry units, so unit-bearing NaN and infinities
        // are written as real literals.
        if let Some(units) = units {
            let text = match constant {
                Constant::NaN => Some("NaN"),
                Constant::Infinity => Some("INF"),
                Constant::NegativeInfinity => Some("-INF"),
                _ => None,
            };
            if let Some(text) = text {
                let mut cn = BytesStart::new("cn");
                cn.push_attribute(("sbml:units", units));
                return self.leaf(cn, text);
            }
            tracing::debug!(?constant, units, "units on a constant symbol are not written");
        }

        match constant {
            Constant::Pi => self.empty("pi"),
            Constant::ExponentialE => self.empty("exponentiale"),
            Constant::True => self.empty("true"),
            Constant::False => self.empty("false"),
            Constant::NaN => self.empty("notanumber"),
            Constant::Infinity => self.empty("infinity"),
            Constant::NegativeInfinity => {
                self.open(BytesStart::new("apply"))?;
                self.empty(Operator::Minus.as_str())?;
                self.empty("infinity")?;
                self.close("apply")
            }
            Constant::Avogadro => self.csymbol(AVOGADRO_URL, "avogadro"),
        }
    }
}

fn is_plain_integer(node: &ExprNode, value: i64) -> bool {
    matches!(node, ExprNode::Number(Number { value: NumberValue::Integer(v), units: None }) if *v == value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compact(node: &ExprNode) -> String {
        write_math_with(
            node,
            &WriteOptions {
                indent: 0,
                xml_declaration: false,
            },
        )
        .unwrap()
    }

    #[test]
    fn writes_apply() {
        let xml = compact(&ExprNode::plus(ExprNode::ident("a"), ExprNode::integer(1)));
        assert_eq!(
            xml,
            r#"<math xmlns="http://www.w3.org/1998/Math/MathML"><apply><plus/><ci>a</ci><cn type="integer">1</cn></apply></math>"#
        );
    }

    #[test]
    fn default_log_base_is_implicit() {
        let xml = compact(&ExprNode::log10(ExprNode::ident("x")));
        assert!(xml.contains("<apply><log/><ci>x</ci></apply>"), "{}", xml);
        let xml = compact(&ExprNode::log(ExprNode::integer(2), ExprNode::ident("x")));
        assert!(xml.contains("<logbase><cn type=\"integer\">2</cn></logbase>"), "{}", xml);
    }

    #[test]
    fn rational_and_e_notation_use_sep() {
        let xml = compact(&ExprNode::rational(1, 3));
        assert!(xml.contains(r#"<cn type="rational">1<sep/>3</cn>"#), "{}", xml);
        let xml = compact(&Number::real_with_exponent(2.5, -3).into());
        assert!(xml.contains(r#"<cn type="e-notation">2.5<sep/>-3</cn>"#), "{}", xml);
    }

    #[test]
    fn units_declare_the_sbml_namespace() {
        let xml = compact(&Number::real(1.5).with_units("mole").into());
        assert!(xml.contains(r#"xmlns:sbml="http://www.sbml.org/sbml/level3/version1/core""#));
        assert!(xml.contains(r#"<cn sbml:units="mole">1.5</cn>"#), "{}", xml);
    }

    #[test]
    fn declaration_is_optional() {
        let xml = write_math_with(
            &ExprNode::ident("x"),
            &WriteOptions {
                indent: 2,
                xml_declaration: true,
            },
        )
        .unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    }
}
