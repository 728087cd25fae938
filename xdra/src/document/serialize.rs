use crate::document::Element;

/// Escape character data for element content.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value for a double-quoted attribute.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            _ => out.push(c),
        }
    }
    out
}

/// Write `<name a="v"` followed by `>` or ` />`.
pub fn write_start_tag(out: &mut String, element: &Element, self_closing: bool) {
    out.push('<');
    out.push_str(&element.name.to_string());
    for attr in &element.attributes {
        out.push(' ');
        out.push_str(&attr.name);
        out.push_str("=\"");
        out.push_str(&escape_attr(&attr.value));
        out.push('"');
    }
    out.push_str(if self_closing { " />" } else { ">" });
}

pub fn write_end_tag(out: &mut String, element: &Element) {
    out.push_str("</");
    out.push_str(&element.name.to_string());
    out.push('>');
}

impl Element {
    /// Serialize this element, its subtree and its tail.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        write_element(&mut out, self);
        out
    }

    /// Serialize only the content of this element: its text followed by each
    /// child with its tail.
    pub fn inner_xml(&self) -> String {
        let mut out = String::new();
        if let Some(text) = &self.text {
            out.push_str(&escape_text(text));
        }
        for child in &self.children {
            write_element(&mut out, child);
        }
        out
    }
}

fn write_element(out: &mut String, element: &Element) {
    let empty = element.children.is_empty() && element.text.as_deref().is_none_or(str::is_empty);
    if empty {
        write_start_tag(out, element, true);
    } else {
        write_start_tag(out, element, false);
        if let Some(text) = &element.text {
            out.push_str(&escape_text(text));
        }
        for child in &element.children {
            write_element(out, child);
        }
        write_end_tag(out, element);
    }
    if let Some(tail) = &element.tail {
        out.push_str(&escape_text(tail));
    }
}
