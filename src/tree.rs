//! Tagged drawing tree shared by the skin library and the output document.
//!
//! The skin is an SVG document, but the pipeline only ever treats it as an
//! opaque tree of elements and text navigated through typed attribute
//! accessors. This module provides that tree together with a reader for the
//! markup subset skins use (elements, attributes, text, comments) and a
//! writer for the final drawing.

use indexmap::IndexMap;

use crate::error::{RenderError, Result};

/// One node of a drawing tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attrs: IndexMap<String, String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element { name: name.into(), attrs: IndexMap::new(), children: Vec::new() }
    }

    /// Raw attribute lookup.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Attribute coerced to a number.
    pub fn num_attr(&self, key: &str) -> Option<f64> {
        self.attr(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// First child element with the given name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Replace the element's text content, leaving child elements in place.
    pub fn set_text(&mut self, value: impl Into<String>) {
        self.children.retain(|child| matches!(child, Node::Element(_)));
        self.children.push(Node::Text(value.into()));
    }

    /// Depth-first walk over this element and every descendant element.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        f(self);
        for child in self.children.iter_mut() {
            if let Node::Element(el) = child {
                el.walk_mut(f);
            }
        }
    }
}

/// Parse a skin document into its root element.
pub fn parse(text: &str) -> Result<Element> {
    let mut parser = Parser { bytes: text.as_bytes(), pos: 0 };
    parser.skip_misc();
    let root = parser.element()?;
    parser.skip_misc();
    Ok(root)
}

/// Serialize a tree back to markup text.
pub fn serialize(root: &Element) -> String {
    let mut out = String::new();
    write_element(root, &mut out);
    out
}

fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for (key, value) in &el.attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_into(value, true, out);
        out.push('"');
    }
    if el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &el.children {
        match child {
            Node::Element(e) => write_element(e, out),
            Node::Text(t) => escape_into(t, false, out),
        }
    }
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

fn escape_into(value: &str, in_attr: bool, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attr => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        let (replacement, consumed) = if rest.starts_with("&amp;") {
            ("&", 5)
        } else if rest.starts_with("&lt;") {
            ("<", 4)
        } else if rest.starts_with("&gt;") {
            (">", 4)
        } else if rest.starts_with("&quot;") {
            ("\"", 6)
        } else if rest.starts_with("&apos;") {
            ("'", 6)
        } else {
            ("&", 1)
        };
        out.push_str(replacement);
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    out
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn err(&self, message: &str) -> RenderError {
        RenderError::SkinParse(format!("{message} at byte {}", self.pos))
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.bytes[self.pos..].starts_with(prefix.as_bytes())
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn skip_until(&mut self, marker: &str) {
        while self.pos < self.bytes.len() && !self.starts_with(marker) {
            self.pos += 1;
        }
        self.pos = (self.pos + marker.len()).min(self.bytes.len());
    }

    /// Skip prolog noise: declarations, doctypes, comments, whitespace.
    fn skip_misc(&mut self) {
        loop {
            self.skip_ws();
            if self.starts_with("<?") {
                self.skip_until("?>");
            } else if self.starts_with("<!--") {
                self.skip_until("-->");
            } else if self.starts_with("<!") {
                self.skip_until(">");
            } else {
                break;
            }
        }
    }

    fn name(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || matches!(b, b'_' | b':' | b'-' | b'.') {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.err("expected a name"));
        }
        Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
    }

    fn attribute(&mut self) -> Result<(String, String)> {
        let key = self.name()?;
        self.skip_ws();
        if self.peek() != Some(b'=') {
            return Err(self.err("expected '=' after attribute name"));
        }
        self.pos += 1;
        self.skip_ws();
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.err("expected a quoted attribute value")),
        };
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|b| b != quote) {
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err(self.err("unterminated attribute value"));
        }
        let raw = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        self.pos += 1;
        Ok((key, unescape(&raw)))
    }

    fn element(&mut self) -> Result<Element> {
        if self.peek() != Some(b'<') {
            return Err(self.err("expected an element"));
        }
        self.pos += 1;
        let name = self.name()?;
        let mut el = Element::new(name);
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'/') => {
                    self.pos += 1;
                    if self.peek() != Some(b'>') {
                        return Err(self.err("malformed self-closing tag"));
                    }
                    self.pos += 1;
                    return Ok(el);
                }
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {
                    let (key, value) = self.attribute()?;
                    el.attrs.insert(key, value);
                }
                None => return Err(self.err("unexpected end of input inside tag")),
            }
        }
        loop {
            if self.starts_with("</") {
                self.pos += 2;
                let close = self.name()?;
                if close != el.name {
                    return Err(self.err("mismatched closing tag"));
                }
                self.skip_ws();
                if self.peek() != Some(b'>') {
                    return Err(self.err("malformed closing tag"));
                }
                self.pos += 1;
                return Ok(el);
            } else if self.starts_with("<!--") {
                self.skip_until("-->");
            } else if self.peek() == Some(b'<') {
                el.children.push(Node::Element(self.element()?));
            } else if self.peek().is_none() {
                return Err(self.err("unexpected end of input inside element"));
            } else {
                let start = self.pos;
                while self.peek().is_some_and(|b| b != b'<') {
                    self.pos += 1;
                }
                let raw = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
                if !raw.trim().is_empty() {
                    el.children.push(Node::Text(unescape(&raw)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_elements() {
        let root = parse(r#"<svg width="10"><g s:pid="A" s:x="0"/><g><text>hi</text></g></svg>"#)
            .expect("parse");
        assert_eq!(root.name, "svg");
        assert_eq!(root.num_attr("width"), Some(10.0));
        assert_eq!(root.elements().count(), 2);
        let first = root.elements().next().unwrap();
        assert_eq!(first.attr("s:pid"), Some("A"));
        let text = root.elements().nth(1).unwrap().find("text").unwrap();
        assert_eq!(text.text(), "hi");
    }

    #[test]
    fn test_parse_skips_prolog_and_comments() {
        let root = parse("<?xml version=\"1.0\"?>\n<!-- skin -->\n<svg><!-- c --><g/></svg>")
            .expect("parse");
        assert_eq!(root.elements().count(), 1);
    }

    #[test]
    fn test_entities_round_trip() {
        let root = parse(r#"<svg label="a &amp; b"><text>x &lt; y</text></svg>"#).expect("parse");
        assert_eq!(root.attr("label"), Some("a & b"));
        assert_eq!(root.find("text").unwrap().text(), "x < y");
        let out = serialize(&root);
        assert!(out.contains("a &amp; b"));
        assert!(out.contains("x &lt; y"));
    }

    #[test]
    fn test_serialize_self_closing() {
        let mut el = Element::new("circle");
        el.set_attr("r", "2");
        assert_eq!(serialize(&el), r#"<circle r="2"/>"#);
    }

    #[test]
    fn test_mismatched_tag_is_an_error() {
        assert!(parse("<svg><g></svg>").is_err());
    }
}
