//! Structured XML documents.
//!
//! A document element owns its whole subtree, so cloning one yields a fully
//! independent tree. The copy engine relies on that: document objects are handed
//! to this clone primitive instead of being walked field by field.

use std::fmt;

use quick_xml::{
    Reader,
    escape::escape,
    events::{BytesStart, Event},
};

/// Error raised while parsing a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The XML reader rejected the input.
    Xml(String),
    /// The input contains no root element.
    NoRoot,
    /// A second top-level element follows the root.
    MultipleRoots(String),
    /// A closing tag does not match the open element.
    MismatchedEnd { expected: String, found: String },
    /// The input ended with elements still open.
    Unclosed(String),
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xml(msg) => write!(f, "malformed XML: {msg}"),
            Self::NoRoot => write!(f, "document has no root element"),
            Self::MultipleRoots(name) => write!(f, "unexpected second root element <{name}>"),
            Self::MismatchedEnd { expected, found } => {
                write!(f, "expected </{expected}>, found </{found}>")
            }
            Self::Unclosed(name) => write!(f, "element <{name}> is never closed"),
        }
    }
}

impl std::error::Error for DocumentError {}

impl From<quick_xml::Error> for DocumentError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for DocumentError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(err.to_string())
    }
}

/// A child of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An XML element with its attributes and children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Creates an empty element.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Appends a child element.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Appends a text node.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Parses a document and returns its root element.
    ///
    /// Whitespace-only text between elements is dropped. Declarations, comments
    /// and processing instructions are skipped.
    pub fn parse(xml: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Self> = Vec::new();
        let mut root: Option<Self> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let element = Self::from_start(&start)?;
                    if stack.is_empty() && root.is_some() {
                        return Err(DocumentError::MultipleRoots(element.name));
                    }
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = Self::from_start(&start)?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Event::End(end) => {
                    let found = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    let Some(element) = stack.pop() else {
                        return Err(DocumentError::MismatchedEnd {
                            expected: String::new(),
                            found,
                        });
                    };
                    if element.name != found {
                        return Err(DocumentError::MismatchedEnd {
                            expected: element.name,
                            found,
                        });
                    }
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::Text(text.unescape()?.into_owned()));
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                        parent.children.push(XmlNode::Text(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(DocumentError::Unclosed(open.name));
        }
        root.ok_or(DocumentError::NoRoot)
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, DocumentError> {
        let mut element = Self::new(String::from_utf8_lossy(start.name().as_ref()));
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    fn attach(stack: &mut [Self], root: &mut Option<Self>, element: Self) -> Result<(), DocumentError> {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(XmlNode::Element(element));
        } else if root.is_some() {
            return Err(DocumentError::MultipleRoots(element.name));
        } else {
            *root = Some(element);
        }
        Ok(())
    }

    /// Returns the value of an attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Sets an attribute, replacing any existing value.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(name, _)| *name == key) {
            Some((_, slot)) => *slot = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Iterates over the direct child elements with the given name.
    pub fn elements<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.children.iter().filter_map(move |child| match child {
            XmlNode::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    /// Returns the concatenated text content of this element and its descendants.
    #[must_use]
    pub fn value(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::Element(element) => element.collect_text(out),
            }
        }
    }

    /// Counts this element and all descendant elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|child| match child {
                XmlNode::Element(element) => element.element_count(),
                XmlNode::Text(_) => 0,
            })
            .sum::<usize>()
    }
}

impl fmt::Display for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (key, value) in &self.attributes {
            write!(f, " {key}=\"{}\"", escape(value.as_str()))?;
        }
        if self.children.is_empty() {
            return write!(f, "/>");
        }
        write!(f, ">")?;
        for child in &self.children {
            match child {
                XmlNode::Element(element) => write!(f, "{element}")?,
                XmlNode::Text(text) => write!(f, "{}", escape(text.as_str()))?,
            }
        }
        write!(f, "</{}>", self.name)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_nested_elements() {
        let root = XmlElement::parse(
            r#"<?xml version="1.0"?>
            <root>
                <child>1</child>
                <child kind="b">2</child>
                <!-- ignored -->
                <empty/>
            </root>"#,
        )
        .unwrap();

        assert_eq!(root.name, "root");
        let children: Vec<_> = root.elements("child").collect();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].attribute("kind"), Some("b"));
        assert_eq!(root.value(), "12");
        assert_eq!(root.element_count(), 4);
    }

    #[test]
    fn display_round_trips_escaped_content() {
        let element = XmlElement::new("note")
            .with_attribute("title", "a < b")
            .with_text("x & y")
            .with_child(XmlElement::new("br"));
        let text = element.to_string();
        assert_eq!(text, r#"<note title="a &lt; b">x &amp; y<br/></note>"#);
        assert_eq!(XmlElement::parse(&text).unwrap(), element);
    }

    #[test]
    fn clone_is_independent() {
        let original = XmlElement::parse("<root><child>1</child></root>").unwrap();
        let mut copy = original.clone();
        copy.set_attribute("changed", "yes");
        copy.children.clear();
        assert_eq!(original.elements("child").count(), 1);
        assert_eq!(original.attribute("changed"), None);
    }

    #[test]
    fn rejects_malformed_documents() {
        assert_eq!(XmlElement::parse("   "), Err(DocumentError::NoRoot));
        assert_eq!(
            XmlElement::parse("<a/><b/>"),
            Err(DocumentError::MultipleRoots("b".into()))
        );
        assert!(XmlElement::parse("<a><b>").is_err());
        assert!(XmlElement::parse("<a></b>").is_err());
    }
}
