use roxmltree::Node;

use crate::document::{Attribute, Element, QName};
use crate::parser::error::ParseError;

pub(crate) fn parse_tree(source: &str, file_id: usize) -> Result<Element, ParseError> {
    let doc = roxmltree::Document::parse(source).map_err(|e| {
        let pos = e.pos();
        let start = byte_offset(source, pos.row as usize, pos.col as usize);
        ParseError::error(format!("malformed XML: {}", e), start..start, file_id)
    })?;
    Ok(convert(doc.root_element()))
}

fn convert(node: Node<'_, '_>) -> Element {
    let tag = node.tag_name();
    let name = match tag.namespace() {
        Some(namespace) => QName::qualified(namespace, prefix_of(node, namespace), tag.name()),
        None => QName::local(tag.name()),
    };

    let mut element = Element::named(name);
    for attr in node.attributes() {
        let name = match attr.namespace() {
            Some(namespace) => match prefix_of(node, namespace) {
                Some(prefix) => format!("{}:{}", prefix, attr.name()),
                None => format!("{{{}}}{}", namespace, attr.name()),
            },
            None => attr.name().to_string(),
        };
        element.attributes.push(Attribute {
            name,
            value: attr.value().to_string(),
        });
    }

    // Comments and processing instructions are skipped, so text on either
    // side of them lands in the same text/tail slot.
    for child in node.children() {
        if child.is_element() {
            element.children.push(convert(child));
        } else if child.is_text() {
            let text = child.text().unwrap_or("");
            let slot = match element.children.last_mut() {
                Some(last) => &mut last.tail,
                None => &mut element.text,
            };
            slot.get_or_insert_with(String::new).push_str(text);
        }
    }
    element
}

fn prefix_of(node: Node<'_, '_>, namespace: &str) -> Option<String> {
    node.lookup_prefix(namespace)
        .filter(|prefix| !prefix.is_empty())
        .map(str::to_string)
}

/// Convert a 1-based row/column (in characters) into a byte offset.
fn byte_offset(source: &str, row: usize, col: usize) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(row.saturating_sub(1))
        .map(str::len)
        .sum();
    let line = &source[line_start.min(source.len())..];
    let within: usize = line
        .chars()
        .take(col.saturating_sub(1))
        .map(char::len_utf8)
        .sum();
    (line_start + within).min(source.len())
}
