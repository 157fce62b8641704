//! Content MathML reader
//!
//! Reads one formula per `<math>` element. The reader dispatches on the
//! element (or, inside `<apply>`, on the head element) to pick the node
//! kind, then reads the children that kind needs. Markup that does not fit
//! the expected shape is a [`Error::Malformed`] carrying the byte position.

use crate::error::{Error, Result};
use crate::stream::{XmlElement, XmlReader, XmlStream, XmlToken};
use crate::{AVOGADRO_URL, DELAY_URL, TIME_URL};
use phf::phf_map;
use sbmlmath_formula::{
    Annotation, Arity, Constant, ExprNode, Function, Lambda, Number, Operator, Piece, Piecewise,
    Semantics,
};

const MAX_DEPTH: usize = 200;

/// Reader configuration
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Deepest element nesting accepted inside `<math>`.
    pub max_depth: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
        }
    }
}

/// What the head element of an `<apply>` denotes.
#[derive(Debug, Clone)]
enum Head {
    Op(Operator),
    Func(Function),
}

static HEADS_BY_ELEMENT: phf::Map<&'static str, Head> = phf_map! {
    "plus" => Head::Op(Operator::Plus),
    "minus" => Head::Op(Operator::Minus),
    "times" => Head::Op(Operator::Times),
    "divide" => Head::Op(Operator::Divide),
    "power" => Head::Op(Operator::Power),
    "eq" => Head::Op(Operator::Eq),
    "neq" => Head::Op(Operator::Neq),
    "gt" => Head::Op(Operator::Gt),
    "lt" => Head::Op(Operator::Lt),
    "geq" => Head::Op(Operator::Geq),
    "leq" => Head::Op(Operator::Leq),
    "and" => Head::Op(Operator::And),
    "or" => Head::Op(Operator::Or),
    "xor" => Head::Op(Operator::Xor),
    "not" => Head::Op(Operator::Not),

    "abs" => Head::Func(Function::Abs),
    "ceiling" => Head::Func(Function::Ceiling),
    "floor" => Head::Func(Function::Floor),
    "exp" => Head::Func(Function::Exp),
    "ln" => Head::Func(Function::Ln),
    "log" => Head::Func(Function::Log),
    "root" => Head::Func(Function::Root),
    "factorial" => Head::Func(Function::Factorial),
    "sin" => Head::Func(Function::Sin),
    "cos" => Head::Func(Function::Cos),
    "tan" => Head::Func(Function::Tan),
    "sec" => Head::Func(Function::Sec),
    "csc" => Head::Func(Function::Csc),
    "cot" => Head::Func(Function::Cot),
    "sinh" => Head::Func(Function::Sinh),
    "cosh" => Head::Func(Function::Cosh),
    "tanh" => Head::Func(Function::Tanh),
    "sech" => Head::Func(Function::Sech),
    "csch" => Head::Func(Function::Csch),
    "coth" => Head::Func(Function::Coth),
    "arcsin" => Head::Func(Function::Arcsin),
    "arccos" => Head::Func(Function::Arccos),
    "arctan" => Head::Func(Function::Arctan),
    "arcsec" => Head::Func(Function::Arcsec),
    "arccsc" => Head::Func(Function::Arccsc),
    "arccot" => Head::Func(Function::Arccot),
    "arcsinh" => Head::Func(Function::Arcsinh),
    "arccosh" => Head::Func(Function::Arccosh),
    "arctanh" => Head::Func(Function::Arctanh),
    "arcsech" => Head::Func(Function::Arcsech),
    "arccsch" => Head::Func(Function::Arccsch),
    "arccoth" => Head::Func(Function::Arccoth),
};

static CONSTANTS_BY_ELEMENT: phf::Map<&'static str, Constant> = phf_map! {
    "pi" => Constant::Pi,
    "exponentiale" => Constant::ExponentialE,
    "true" => Constant::True,
    "false" => Constant::False,
    "notanumber" => Constant::NaN,
    "infinity" => Constant::Infinity,
};

/// Read the first `<math>` element of `xml`.
pub fn read_math(xml: &str) -> Result<ExprNode> {
    read_math_with(xml, &ReadOptions::default())
}

pub fn read_math_with(xml: &str, options: &ReadOptions) -> Result<ExprNode> {
    let mut stream = XmlReader::new(xml);
    loop {
        stream.skip_text()?;
        match stream.next()? {
            XmlToken::Start(element) if element.name == "math" => {
                return MathReader::new(&mut stream, options).read_math_body(&element);
            }
            XmlToken::Start(element) => {
                tracing::debug!(element = %element.name, "skipping element outside <math>");
            }
            XmlToken::Eof { position } => {
                return Err(Error::malformed(position, "no <math> element found"));
            }
            _ => {}
        }
    }
}

/// Read every `<math>` element of a larger document, one result per
/// element in document order. A malformed formula does not stop the scan;
/// an XML error does, and is the last entry.
pub fn read_all_math(document: &str) -> Vec<Result<ExprNode>> {
    read_all_math_with(document, &ReadOptions::default())
}

pub fn read_all_math_with(document: &str, options: &ReadOptions) -> Vec<Result<ExprNode>> {
    let mut stream = XmlReader::new(document);
    let mut results = Vec::new();
    loop {
        let token = match stream.peek() {
            Ok(token) => token,
            Err(err) => {
                results.push(Err(err));
                return results;
            }
        };
        match token {
            XmlToken::Eof { .. } => return results,
            XmlToken::Start(element) if element.name == "math" => {
                let base = element.position();
                match stream.capture_element() {
                    Ok(fragment) => {
                        let result = read_math_with(&fragment, options)
                            .map_err(|err| err.offset_by(base));
                        if let Err(err) = &result {
                            tracing::debug!(error = %err, "malformed <math> element");
                        }
                        results.push(result);
                    }
                    Err(err) => {
                        results.push(Err(err));
                        return results;
                    }
                }
            }
            _ => {
                if let Err(err) = stream.next() {
                    results.push(Err(err));
                    return results;
                }
            }
        }
    }
}

struct MathReader<'s, S: XmlStream> {
    stream: &'s mut S,
    max_depth: usize,
    depth: usize,
}

impl<'s, S: XmlStream> MathReader<'s, S> {
    fn new(stream: &'s mut S, options: &ReadOptions) -> Self {
        Self {
            stream,
            max_depth: options.max_depth,
            depth: 0,
        }
    }

    fn read_math_body(&mut self, math: &XmlElement) -> Result<ExprNode> {
        self.stream.skip_text()?;
        if let XmlToken::End { position, .. } = self.stream.peek()? {
            return Err(Error::malformed(*position, "<math> has no content"));
        }
        let node = self.read_node()?;
        self.expect_end(&math.name)?;
        Ok(node)
    }

    /// Takes the next start tag, skipping character data before it.
    fn start(&mut self) -> Result<XmlElement> {
        self.stream.skip_text()?;
        match self.stream.next()? {
            XmlToken::Start(element) => Ok(element),
            other => Err(Error::malformed(
                other.position(),
                format!("expected an element, found {}", other.describe()),
            )),
        }
    }

    fn expect_end(&mut self, name: &str) -> Result<()> {
        self.stream.skip_text()?;
        match self.stream.next()? {
            XmlToken::End { name: end, .. } if end == name => Ok(()),
            other => Err(Error::malformed(
                other.position(),
                format!("expected </{}>, found {}", name, other.describe()),
            )),
        }
    }

    /// Whether the enclosing element ends next.
    fn at_end(&mut self) -> Result<bool> {
        self.stream.skip_text()?;
        Ok(matches!(self.stream.peek()?, XmlToken::End { .. }))
    }

    /// Concatenated character data up to the next tag.
    fn text(&mut self) -> Result<String> {
        let mut out = String::new();
        while let XmlToken::Text { text, .. } = self.stream.peek()? {
            out.push_str(text);
            self.stream.next()?;
        }
        Ok(out.trim().to_string())
    }

    fn read_node(&mut self) -> Result<ExprNode> {
        self.depth += 1;
        if self.depth > self.max_depth {
            let position = self.stream.peek()?.position();
            return Err(Error::malformed(
                position,
                format!("nesting deeper than {}", self.max_depth),
            ));
        }
        let result = self.read_node_inner();
        self.depth -= 1;
        result
    }

    fn read_node_inner(&mut self) -> Result<ExprNode> {
        let element = self.start()?;
        let position = element.position();
        match element.name.as_str() {
            "cn" => self.read_cn(&element),
            "ci" => {
                let name = self.text()?;
                self.expect_end("ci")?;
                if name.is_empty() {
                    return Err(Error::malformed(position, "<ci> has no name"));
                }
                Ok(ExprNode::Identifier(name))
            }
            "csymbol" => {
                let url = element.attribute("definitionURL").unwrap_or_default().to_string();
                let name = self.text()?;
                self.expect_end("csymbol")?;
                match url.as_str() {
                    TIME_URL => Ok(ExprNode::Time(name)),
                    AVOGADRO_URL => Ok(ExprNode::constant(Constant::Avogadro)),
                    _ => Err(Error::malformed(
                        position,
                        format!("unsupported csymbol '{}'", url),
                    )),
                }
            }
            "apply" => self.read_apply(position),
            "piecewise" => self.read_piecewise(),
            "lambda" => self.read_lambda(position),
            "semantics" => self.read_semantics(&element),
            name => match CONSTANTS_BY_ELEMENT.get(name) {
                Some(constant) => {
                    self.stream.skip_past_end(&element)?;
                    Ok(ExprNode::constant(*constant))
                }
                None => Err(Error::malformed(
                    position,
                    format!("unrecognised element <{}>", name),
                )),
            },
        }
    }

    fn read_cn(&mut self, element: &XmlElement) -> Result<ExprNode> {
        let position = element.position();
        let kind = element.attribute("type").unwrap_or("real");
        let first = self.text()?;

        let bad = |what: &str, text: &str| {
            Error::malformed(position, format!("invalid {} '{}' in <cn>", what, text))
        };

        let number = match kind {
            "integer" => Number::integer(first.parse().map_err(|_| bad("integer", &first))?),
            "real" => Number::real(first.parse().map_err(|_| bad("real", &first))?),
            "e-notation" | "rational" => {
                let second = self.after_sep(position)?;
                if kind == "rational" {
                    Number::rational(
                        first.parse().map_err(|_| bad("numerator", &first))?,
                        second.parse().map_err(|_| bad("denominator", &second))?,
                    )
                } else {
                    Number::real_with_exponent(
                        first.parse().map_err(|_| bad("mantissa", &first))?,
                        second.parse().map_err(|_| bad("exponent", &second))?,
                    )
                }
            }
            other => {
                return Err(Error::malformed(
                    position,
                    format!("unsupported cn type '{}'", other),
                ))
            }
        };
        self.expect_end("cn")?;

        let number = match element.attribute("units") {
            Some(units) => number.with_units(units),
            None => number,
        };
        Ok(number.into())
    }

    /// Consumes `<sep/>` and returns the text after it.
    fn after_sep(&mut self, position: usize) -> Result<String> {
        match self.stream.next()? {
            XmlToken::Start(sep) if sep.name == "sep" => {
                self.stream.skip_past_end(&sep)?;
                self.text()
            }
            other => Err(Error::malformed(
                position,
                format!("expected <sep/> in <cn>, found {}", other.describe()),
            )),
        }
    }

    fn read_apply(&mut self, position: usize) -> Result<ExprNode> {
        let head = self.start()?;

        let node = match head.name.as_str() {
            "ci" => {
                let name = self.text()?;
                self.expect_end("ci")?;
                let args = self.read_args()?;
                ExprNode::call(name, args)
            }
            "csymbol" => {
                let url = head.attribute("definitionURL").unwrap_or_default().to_string();
                self.stream.skip_past_end(&head)?;
                if url != DELAY_URL {
                    return Err(Error::malformed(
                        head.position(),
                        format!("unsupported function csymbol '{}'", url),
                    ));
                }
                let args = self.read_args()?;
                function_node(Function::Delay, args, position)?
            }
            name => {
                let Some(kind) = HEADS_BY_ELEMENT.get(name).cloned() else {
                    return Err(Error::malformed(
                        head.position(),
                        format!("unrecognised operator <{}>", name),
                    ));
                };
                self.stream.skip_past_end(&head)?;
                match kind {
                    Head::Op(op) => {
                        let args = self.read_args()?;
                        // `-infinity` is how negative infinity is spelled.
                        if op == Operator::Minus
                            && args.len() == 1
                            && args[0] == ExprNode::constant(Constant::Infinity)
                        {
                            ExprNode::constant(Constant::NegativeInfinity)
                        } else {
                            if !op.arity().accepts(args.len()) {
                                return Err(arity_error(op.as_str(), op.arity(), args.len(), position));
                            }
                            ExprNode::Operator { op, args }
                        }
                    }
                    Head::Func(func @ (Function::Log | Function::Root)) => {
                        let (qualifier, default) = if func == Function::Log {
                            ("logbase", 10)
                        } else {
                            ("degree", 2)
                        };
                        let first = self.read_qualifier(qualifier)?;
                        let mut args = self.read_args()?;
                        args.insert(0, first.unwrap_or_else(|| ExprNode::integer(default)));
                        function_node(func, args, position)?
                    }
                    Head::Func(func) => {
                        let args = self.read_args()?;
                        function_node(func, args, position)?
                    }
                }
            }
        };

        self.expect_end("apply")?;
        Ok(node)
    }

    /// `<logbase>` / `<degree>` wrapping one expression, if present.
    fn read_qualifier(&mut self, name: &str) -> Result<Option<ExprNode>> {
        self.stream.skip_text()?;
        if !self.stream.peek()?.is_start_of(name) {
            return Ok(None);
        }
        self.stream.next()?;
        let value = self.read_node()?;
        self.expect_end(name)?;
        Ok(Some(value))
    }

    fn read_args(&mut self) -> Result<Vec<ExprNode>> {
        let mut args = Vec::new();
        while !self.at_end()? {
            args.push(self.read_node()?);
        }
        Ok(args)
    }

    fn read_piecewise(&mut self) -> Result<ExprNode> {
        let mut piecewise = Piecewise::default();
        while !self.at_end()? {
            let part = self.start()?;
            match part.name.as_str() {
                "piece" if piecewise.otherwise.is_none() => {
                    let value = self.read_node()?;
                    let condition = self.read_node()?;
                    self.expect_end("piece")?;
                    piecewise.pieces.push(Piece { value, condition });
                }
                "otherwise" if piecewise.otherwise.is_none() => {
                    piecewise.otherwise = Some(Box::new(self.read_node()?));
                    self.expect_end("otherwise")?;
                }
                other => {
                    return Err(Error::malformed(
                        part.position(),
                        format!("unexpected <{}> in <piecewise>", other),
                    ))
                }
            }
        }
        self.expect_end("piecewise")?;
        Ok(ExprNode::Piecewise(piecewise))
    }

    fn read_lambda(&mut self, position: usize) -> Result<ExprNode> {
        let mut params = Vec::new();
        loop {
            self.stream.skip_text()?;
            if !self.stream.peek()?.is_start_of("bvar") {
                break;
            }
            self.stream.next()?;
            match self.read_node()? {
                ExprNode::Identifier(name) => params.push(name),
                other => {
                    return Err(Error::malformed(
                        position,
                        format!("<bvar> must hold a <ci>, found {}", other.label()),
                    ))
                }
            }
            self.expect_end("bvar")?;
        }
        if self.at_end()? {
            return Err(Error::malformed(position, "<lambda> has no body"));
        }
        let body = self.read_node()?;
        self.expect_end("lambda")?;
        Ok(ExprNode::Lambda(Lambda::new(params, body)))
    }

    fn read_semantics(&mut self, element: &XmlElement) -> Result<ExprNode> {
        let definition_url = element.attribute("definitionURL").map(str::to_string);
        let inner = self.read_node()?;
        let mut annotations = Vec::new();
        while !self.at_end()? {
            let token = self.stream.peek()?;
            if token.is_start_of("annotation") || token.is_start_of("annotation-xml") {
                annotations.push(Annotation(self.stream.capture_element()?));
            } else {
                let position = token.position();
                let found = token.describe();
                return Err(Error::malformed(
                    position,
                    format!("expected an annotation in <semantics>, found {}", found),
                ));
            }
        }
        self.expect_end("semantics")?;
        Ok(ExprNode::Semantics(Semantics {
            definition_url,
            inner: Box::new(inner),
            annotations,
        }))
    }
}

fn function_node(func: Function, args: Vec<ExprNode>, position: usize) -> Result<ExprNode> {
    let arity = func.arity();
    if !arity.accepts(args.len()) {
        return Err(arity_error(func.name(), arity, args.len(), position));
    }
    Ok(ExprNode::Function { func, args })
}

fn arity_error(name: &str, arity: Arity, count: usize, position: usize) -> Error {
    Error::malformed(
        position,
        format!("<{}> takes {}, got {}", name, arity, count),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn math(body: &str) -> String {
        format!(r#"<math xmlns="http://www.w3.org/1998/Math/MathML">{}</math>"#, body)
    }

    #[test]
    fn reads_apply() {
        let node = read_math(&math("<apply><plus/><ci> a </ci><cn type=\"integer\"> 1 </cn></apply>"))
            .unwrap();
        assert_eq!(node, ExprNode::plus(ExprNode::ident("a"), ExprNode::integer(1)));
    }

    #[test]
    fn missing_children_are_malformed() {
        let err = read_math(&math("<apply><divide/><ci>a</ci></apply>")).unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }), "{}", err);
    }

    #[test]
    fn unknown_operator_is_malformed() {
        let err = read_math(&math("<apply><frobnicate/><ci>a</ci></apply>")).unwrap_err();
        match err {
            Error::Malformed { message, .. } => assert!(message.contains("frobnicate")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn truncated_document_is_an_error() {
        assert!(read_math("<math><apply><plus/><ci>a</ci>").is_err());
    }

    #[test]
    fn log_base_is_materialised() {
        let node = read_math(&math("<apply><log/><ci>x</ci></apply>")).unwrap();
        assert!(node.is_log10());
        let node = read_math(&math(
            "<apply><root/><degree><cn type=\"integer\">3</cn></degree><ci>x</ci></apply>",
        ))
        .unwrap();
        assert_eq!(node, ExprNode::root(ExprNode::integer(3), ExprNode::ident("x")));
    }

    #[test]
    fn depth_guard() {
        let mut body = String::from("<ci>x</ci>");
        for _ in 0..10 {
            body = format!("<apply><abs/>{}</apply>", body);
        }
        let options = ReadOptions { max_depth: 5 };
        assert!(read_math_with(&math(&body), &options).is_err());
        assert!(read_math(&math(&body)).is_ok());
    }
}
