//! Owned XML element tree used as the persistence medium.
//!
//! # Responsibility
//! - Parse XML documents into an owned, mutable element tree.
//! - Serialize element trees back to indented XML text and files.
//!
//! # Invariants
//! - Attribute order is preserved; setting an existing attribute replaces it.
//! - Text is kept only for elements without child elements.
//! - Written attribute values escape line breaks, and written text escapes
//!   carriage returns, so both survive re-parsing.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;
const INDENT: &str = "  ";

/// Result type for document-level XML operations.
pub type XmlResult<T> = Result<T, XmlError>;

/// Document-level failure: the bytes could not be read, written, or parsed.
#[derive(Debug)]
pub enum XmlError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(roxmltree::Error),
}

impl Display for XmlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "xml file `{}`: {source}", path.display()),
            Self::Parse(err) => write!(f, "malformed xml document: {err}"),
        }
    }
}

impl Error for XmlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<roxmltree::Error> for XmlError {
    fn from(value: roxmltree::Error) -> Self {
        Self::Parse(value)
    }
}

/// One XML element with its attributes, children and text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: Option<String>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Text of the first direct child with the given name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(XmlElement::text)
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// Appends a new empty child element and returns it for population.
    pub fn append_element(&mut self, name: impl Into<String>) -> &mut XmlElement {
        self.children.push(XmlElement::new(name));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Appends `<name>text</name>` as a child element.
    pub fn append_text_element(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.append_element(name).set_text(text);
    }

    /// Parses a whole document and returns its root element.
    ///
    /// # Errors
    /// - Returns `XmlError::Parse` when `source` is not well-formed XML.
    pub fn parse(source: &str) -> XmlResult<XmlElement> {
        let document = roxmltree::Document::parse(source)?;
        Ok(Self::from_node(document.root_element()))
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> XmlElement {
        let mut element = XmlElement::new(node.tag_name().name());
        for attribute in node.attributes() {
            element
                .attributes
                .push((attribute.name().to_string(), attribute.value().to_string()));
        }

        let mut text = String::new();
        for child in node.children() {
            if child.is_element() {
                element.children.push(Self::from_node(child));
            } else if child.is_text() {
                text.push_str(child.text().unwrap_or_default());
            }
        }
        if element.children.is_empty() && !text.is_empty() {
            element.text = Some(text);
        }
        element
    }

    /// Serializes this element as a complete document with declaration.
    pub fn to_xml_string(&self) -> String {
        let mut output = String::from(XML_DECLARATION);
        output.push('\n');
        self.write_into(&mut output, 0);
        output
    }

    fn write_into(&self, output: &mut String, depth: usize) {
        for _ in 0..depth {
            output.push_str(INDENT);
        }
        output.push('<');
        output.push_str(&self.name);
        for (key, value) in &self.attributes {
            output.push(' ');
            output.push_str(key);
            output.push_str("=\"");
            output.push_str(&escape_attribute(value));
            output.push('"');
        }

        if !self.children.is_empty() {
            output.push_str(">\n");
            for child in &self.children {
                child.write_into(output, depth + 1);
            }
            for _ in 0..depth {
                output.push_str(INDENT);
            }
            output.push_str("</");
            output.push_str(&self.name);
            output.push_str(">\n");
            return;
        }

        match self.text.as_deref() {
            Some(text) if !text.is_empty() => {
                output.push('>');
                output.push_str(&escape_text(text));
                output.push_str("</");
                output.push_str(&self.name);
                output.push_str(">\n");
            }
            _ => output.push_str(" />\n"),
        }
    }

    /// Reads and parses an XML file.
    ///
    /// # Errors
    /// - Returns `XmlError::Io` when the file cannot be read.
    /// - Returns `XmlError::Parse` when the content is not well-formed.
    pub fn read_file(path: impl AsRef<Path>) -> XmlResult<XmlElement> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| XmlError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source)
    }

    /// Writes this element as a complete document, replacing the file.
    ///
    /// # Errors
    /// - Returns `XmlError::Io` when the file cannot be written.
    pub fn write_file(&self, path: impl AsRef<Path>) -> XmlResult<()> {
        let path = path.as_ref();
        fs::write(path, self.to_xml_string()).map_err(|source| XmlError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\r' => escaped.push_str("&#13;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            '\t' => escaped.push_str("&#9;"),
            other => escaped.push(other),
        }
    }
    escaped
}
