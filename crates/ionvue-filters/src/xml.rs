//! Minimal XML document model over quick-xml.
//!
//! Filter and session state is attribute-heavy, shallow XML. Rather than
//! hand each filter a streaming reader, documents are parsed into a small
//! element tree that readers walk; writers build the same tree and
//! serialise it in one pass. Unknown attributes and elements are simply
//! left unread, which is what keeps old readers forward-compatible.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("XML syntax error: {0}")]
    Syntax(String),

    #[error("Document has no root element")]
    NoRoot,

    #[error("IO error writing XML: {0}")]
    Io(#[from] std::io::Error),
}

/// One element: name, attributes, children, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElem {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlElem>,
}

impl XmlElem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.attrs.push((key.into(), value.to_string()));
        self
    }

    pub fn child(mut self, child: XmlElem) -> Self {
        self.children.push(child);
        self
    }

    /// Shorthand for the ubiquitous `<name value="..."/>` parameter
    /// element.
    pub fn value_elem(name: impl Into<String>, value: impl Display) -> Self {
        Self::new(name).attr("value", value)
    }

    pub fn get_attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn parse_attr<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get_attr(key)?.parse().ok()
    }

    pub fn get_child(&self, name: &str) -> Option<&XmlElem> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn get_children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElem> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// `value` attribute of a named child, parsed. The usual way filter
    /// parameters are read back.
    pub fn child_value<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get_child(name)?.parse_attr("value")
    }

    // --- serialisation ---

    fn write_into(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), XmlError> {
        let mut start = BytesStart::new(&self.name);
        for (k, v) in &self.attrs {
            start.push_attribute((k.as_str(), v.as_str()));
        }
        if self.children.is_empty() {
            writer
                .write_event(Event::Empty(start))
                .map_err(|e| XmlError::Syntax(e.to_string()))?;
        } else {
            writer
                .write_event(Event::Start(start))
                .map_err(|e| XmlError::Syntax(e.to_string()))?;
            for child in &self.children {
                child.write_into(writer)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(&self.name)))
                .map_err(|e| XmlError::Syntax(e.to_string()))?;
        }
        Ok(())
    }

    /// Serialise as a standalone UTF-8 document.
    pub fn to_document(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| XmlError::Syntax(e.to_string()))?;
        self.write_into(&mut writer)?;
        let bytes = writer.into_inner();
        String::from_utf8(bytes).map_err(|e| XmlError::Syntax(e.to_string()))
    }

    /// Parse a document, returning its root element.
    pub fn parse_document(text: &str) -> Result<XmlElem, XmlError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElem> = Vec::new();
        let mut root: Option<XmlElem> = None;
        loop {
            match reader
                .read_event()
                .map_err(|e| XmlError::Syntax(e.to_string()))?
            {
                Event::Start(start) => {
                    stack.push(elem_from_start(&start)?);
                }
                Event::Empty(start) => {
                    let elem = elem_from_start(&start)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(elem),
                        None => root = Some(elem),
                    }
                }
                Event::End(_) => {
                    let done = stack.pop().ok_or_else(|| {
                        XmlError::Syntax("unbalanced end tag".to_string())
                    })?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(done),
                        None => root = Some(done),
                    }
                }
                Event::Eof => break,
                // Text content, comments, declarations: not part of the
                // state model.
                _ => {}
            }
        }
        root.ok_or(XmlError::NoRoot)
    }
}

fn elem_from_start(start: &BytesStart<'_>) -> Result<XmlElem, XmlError> {
    let mut elem = XmlElem::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Syntax(e.to_string()))?;
        elem.attrs.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            attr.unescape_value()
                .map_err(|e| XmlError::Syntax(e.to_string()))?
                .into_owned(),
        ));
    }
    Ok(elem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_document() {
        let doc = XmlElem::new("state")
            .attr("version", "4")
            .child(XmlElem::value_elem("radius", 1.5))
            .child(
                XmlElem::new("origin")
                    .attr("x", 1)
                    .attr("y", 2)
                    .attr("z", 3),
            );
        let text = doc.to_document().unwrap();
        let reread = XmlElem::parse_document(&text).unwrap();
        assert_eq!(doc, reread);
        assert_eq!(reread.child_value::<f32>("radius"), Some(1.5));
        assert_eq!(reread.get_child("origin").unwrap().parse_attr::<i32>("y"), Some(2));
    }

    #[test]
    fn test_unknown_attrs_ignored() {
        let reread =
            XmlElem::parse_document(r#"<state><radius value="2" future="yes"/></state>"#).unwrap();
        assert_eq!(reread.child_value::<f32>("radius"), Some(2.0));
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(XmlElem::parse_document("<a><b></a>").is_err());
        assert!(XmlElem::parse_document("").is_err());
    }
}
