pub mod serialize;

use std::fmt;

use crate::path::{ElementPath, PathError};

/// A qualified element name.
///
/// The prefix is only kept for display: two names are the same element type
/// when namespace and local part agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    pub fn local(name: impl Into<String>) -> Self {
        QName {
            namespace: None,
            prefix: None,
            local: name.into(),
        }
    }

    pub fn qualified(
        namespace: impl Into<String>,
        prefix: Option<String>,
        local: impl Into<String>,
    ) -> Self {
        QName {
            namespace: Some(namespace.into()),
            prefix,
            local: local.into(),
        }
    }

    /// True if this name is `local` in namespace `namespace`.
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.local == local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// A node of an owned document tree.
///
/// Text handling follows the element/tail convention: `text` is the character
/// data before the first child, `tail` is the character data between this
/// element's end tag and the next sibling (or the parent's end tag).
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: QName,
    /// Attributes in document order.
    pub attributes: Vec<Attribute>,
    pub text: Option<String>,
    pub tail: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element::named(QName::local(name))
    }

    pub fn named(name: QName) -> Self {
        Element {
            name,
            attributes: Vec::new(),
            text: None,
            tail: None,
            children: Vec::new(),
        }
    }

    pub fn with_children(name: impl Into<String>, children: Vec<Element>) -> Self {
        let mut element = Element::new(name);
        element.children = children;
        element
    }

    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut element = Element::new(name);
        element.text = Some(text.into());
        element
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute { name, value }),
        }
    }

    pub fn append(&mut self, child: Element) {
        self.children.push(child);
    }

    /// All descendants in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        collect_descendants(self, &mut out);
        out
    }

    pub fn find_all(&self, path: &str) -> Result<Vec<&Element>, PathError> {
        Ok(ElementPath::parse(path)?.select(self))
    }

    pub fn find(&self, path: &str) -> Result<Option<&Element>, PathError> {
        Ok(ElementPath::parse(path)?.first(self))
    }

    /// Text of the first match; empty when the match has no text, `None` when
    /// nothing matches.
    pub fn find_text(&self, path: &str) -> Result<Option<&str>, PathError> {
        Ok(ElementPath::parse(path)?.first_text(self))
    }
}

fn collect_descendants<'a>(element: &'a Element, out: &mut Vec<&'a Element>) {
    for child in &element.children {
        out.push(child);
        collect_descendants(child, out);
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml_string())
    }
}
