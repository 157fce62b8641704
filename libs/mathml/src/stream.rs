//! Pull-based XML token stream
//!
//! The MathML reader only needs a handful of primitives from an XML
//! backend: look at the next token, take it, skip to the end of an element,
//! skip character data, and copy an element out verbatim. [`XmlStream`]
//! names those; [`XmlReader`] provides them over `quick_xml`.
//!
//! Empty elements (`<plus/>`) come out as a start token followed by an end
//! token, so consumers never special-case them.

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::ops::Range;

/// Start tag of an element.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    /// Name without namespace prefix.
    pub name: String,
    /// Attributes as written, keys including any prefix.
    pub attributes: Vec<(String, String)>,
    /// Byte range of the start tag in the source.
    pub span: Range<usize>,
}

impl XmlElement {
    /// Attribute value by local name; namespace declarations never match.
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes.iter().find_map(|(key, value)| {
            let matches = match key.split_once(':') {
                Some((prefix, name)) => prefix != "xmlns" && name == local,
                None => key == local,
            };
            matches.then_some(value.as_str())
        })
    }

    pub fn position(&self) -> usize {
        self.span.start
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlToken {
    Start(XmlElement),
    End { name: String, position: usize },
    Text { text: String, position: usize },
    Eof { position: usize },
}

impl XmlToken {
    pub fn position(&self) -> usize {
        match self {
            XmlToken::Start(element) => element.position(),
            XmlToken::End { position, .. }
            | XmlToken::Text { position, .. }
            | XmlToken::Eof { position } => *position,
        }
    }

    pub fn is_start_of(&self, name: &str) -> bool {
        matches!(self, XmlToken::Start(element) if element.name == name)
    }

    /// Short rendering for error messages.
    pub fn describe(&self) -> String {
        match self {
            XmlToken::Start(element) => format!("<{}>", element.name),
            XmlToken::End { name, .. } => format!("</{}>", name),
            XmlToken::Text { text, .. } => format!("text '{}'", text.trim()),
            XmlToken::Eof { .. } => "end of document".to_string(),
        }
    }
}

/// The primitives the MathML reader consumes.
pub trait XmlStream {
    /// Next token without consuming it.
    fn peek(&mut self) -> Result<&XmlToken>;

    fn next(&mut self) -> Result<XmlToken>;

    /// Consumes tokens through the end tag matching `element`, whose start
    /// tag has already been taken.
    fn skip_past_end(&mut self, element: &XmlElement) -> Result<()>;

    /// Consumes character data up to the next tag.
    fn skip_text(&mut self) -> Result<()>;

    /// Consumes the next element and returns its exact source text.
    fn capture_element(&mut self) -> Result<String>;
}

/// [`XmlStream`] over a `quick_xml` reader on a borrowed document.
pub struct XmlReader<'a> {
    source: &'a str,
    reader: Reader<&'a [u8]>,
    lookahead: Option<XmlToken>,
    /// End token owed after an empty element.
    pending_end: Option<XmlToken>,
}

impl<'a> XmlReader<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            reader: Reader::from_str(source),
            lookahead: None,
            pending_end: None,
        }
    }

    fn read_token(&mut self) -> Result<XmlToken> {
        if let Some(end) = self.pending_end.take() {
            return Ok(end);
        }
        loop {
            let start = self.reader.buffer_position() as usize;
            let event = self.reader.read_event()?;
            let end = self.reader.buffer_position() as usize;
            match event {
                Event::Start(tag) => {
                    return Ok(XmlToken::Start(element(&tag, start..end)?));
                }
                Event::Empty(tag) => {
                    let element = element(&tag, start..end)?;
                    self.pending_end = Some(XmlToken::End {
                        name: element.name.clone(),
                        position: end,
                    });
                    return Ok(XmlToken::Start(element));
                }
                Event::End(tag) => {
                    let name = String::from_utf8(tag.local_name().as_ref().to_vec())?;
                    return Ok(XmlToken::End {
                        name,
                        position: start,
                    });
                }
                Event::Text(text) => {
                    return Ok(XmlToken::Text {
                        text: text.unescape()?.into_owned(),
                        position: start,
                    });
                }
                Event::CData(data) => {
                    return Ok(XmlToken::Text {
                        text: String::from_utf8(data.into_inner().into_owned())?,
                        position: start,
                    });
                }
                Event::Eof => return Ok(XmlToken::Eof { position: start }),
                Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_) => {
                    tracing::trace!(position = start, "skipping non-element markup");
                }
            }
        }
    }
}

fn element(tag: &BytesStart<'_>, span: Range<usize>) -> Result<XmlElement> {
    let name = String::from_utf8(tag.local_name().as_ref().to_vec())?;
    let mut attributes = Vec::new();
    for attr in tag.attributes() {
        let attr = attr?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())?;
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        span,
    })
}

impl XmlStream for XmlReader<'_> {
    fn peek(&mut self) -> Result<&XmlToken> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.read_token()?);
        }
        match &self.lookahead {
            Some(token) => Ok(token),
            None => Err(Error::malformed(
                self.reader.buffer_position() as usize,
                "token stream exhausted",
            )),
        }
    }

    fn next(&mut self) -> Result<XmlToken> {
        match self.lookahead.take() {
            Some(token) => Ok(token),
            None => self.read_token(),
        }
    }

    fn skip_past_end(&mut self, element: &XmlElement) -> Result<()> {
        let mut depth = 0usize;
        loop {
            match self.next()? {
                XmlToken::Start(_) => depth += 1,
                XmlToken::End { .. } if depth == 0 => return Ok(()),
                XmlToken::End { .. } => depth -= 1,
                XmlToken::Text { .. } => {}
                XmlToken::Eof { position } => {
                    return Err(Error::malformed(
                        position,
                        format!("document ends inside <{}>", element.name),
                    ))
                }
            }
        }
    }

    fn skip_text(&mut self) -> Result<()> {
        while let XmlToken::Text { text, position } = self.peek()? {
            if !text.trim().is_empty() {
                tracing::debug!(position = *position, text = text.trim(), "ignoring character data");
            }
            self.next()?;
        }
        Ok(())
    }

    fn capture_element(&mut self) -> Result<String> {
        let token = self.next()?;
        let XmlToken::Start(element) = token else {
            return Err(Error::malformed(
                token.position(),
                format!("expected an element, found {}", token.describe()),
            ));
        };
        let start = element.span.start;
        let mut depth = 0usize;
        loop {
            match self.next()? {
                XmlToken::Start(_) => depth += 1,
                XmlToken::End { .. } if depth == 0 => break,
                XmlToken::End { .. } => depth -= 1,
                XmlToken::Text { .. } => {}
                XmlToken::Eof { position } => {
                    return Err(Error::malformed(
                        position,
                        format!("document ends inside <{}>", element.name),
                    ))
                }
            }
        }
        // The reader now stands just past the closing tag (or past the start
        // tag of an empty element).
        let end = self.reader.buffer_position() as usize;
        Ok(self.source[start..end].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<XmlToken> {
        let mut reader = XmlReader::new(source);
        let mut out = Vec::new();
        loop {
            let token = reader.next().unwrap();
            let done = matches!(token, XmlToken::Eof { .. });
            out.push(token);
            if done {
                return out;
            }
        }
    }

    #[test]
    fn empty_elements_get_an_end_token() {
        let tokens = tokens("<apply><plus/></apply>");
        let names: Vec<String> = tokens.iter().map(XmlToken::describe).collect();
        assert_eq!(
            names,
            vec!["<apply>", "<plus>", "</plus>", "</apply>", "end of document"]
        );
    }

    #[test]
    fn prefixed_attributes_match_by_local_name() {
        let tokens = tokens(r#"<cn xmlns:sbml="urn:x" sbml:units="mole">1</cn>"#);
        let XmlToken::Start(cn) = &tokens[0] else {
            panic!("expected a start tag");
        };
        assert_eq!(cn.attribute("units"), Some("mole"));
        assert_eq!(cn.attribute("sbml"), None);
    }

    #[test]
    fn capture_returns_exact_source() {
        let source = r#"<semantics><ci>x</ci><annotation encoding="text"> a &amp; b </annotation></semantics>"#;
        let mut reader = XmlReader::new(source);
        reader.next().unwrap();
        let ci = reader.next().unwrap();
        let XmlToken::Start(ci) = ci else {
            panic!("expected <ci>");
        };
        reader.skip_past_end(&ci).unwrap();
        let captured = reader.capture_element().unwrap();
        assert_eq!(
            captured,
            r#"<annotation encoding="text"> a &amp; b </annotation>"#
        );
        assert!(matches!(reader.next().unwrap(), XmlToken::End { ref name, .. } if name == "semantics"));
    }

    #[test]
    fn capture_of_empty_element() {
        let mut reader = XmlReader::new(r#"<a><annotation-xml encoding="x"/></a>"#);
        reader.next().unwrap();
        assert_eq!(
            reader.capture_element().unwrap(),
            r#"<annotation-xml encoding="x"/>"#
        );
    }
}
