//! The extension script language run by `custom` sources and actions.
//!
//! A script only ever sees two things: the bound tree, whose children are the
//! records, and an output buffer. Statements are line oriented; see
//! `parser::script` for the grammar.

use std::ops::Range;

use crate::document::Element;
use crate::path::ElementPath;

/// A compiled script.
#[derive(Debug, Clone)]
pub struct Script {
    pub statements: Vec<Statement>,
}

impl Script {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub command: Command,
    /// Byte span of the statement in the script text.
    pub span: Range<usize>,
}

#[derive(Debug, Clone)]
pub enum Command {
    /// `append <xml/>`: add a record.
    Append(Element),
    /// `sort KEY` / `reversesort KEY`
    Sort { key: String, descending: bool },
    Reverse,
    Keep(Condition),
    Drop(Condition),
    Limit(usize),
    Skip(usize),
    /// `set TAG "value"`
    SetText { tag: String, value: String },
    /// `attr NAME "value"`
    SetAttr { name: String, value: String },
    /// `remove TAG`
    Remove(String),
    /// `emit "text"`, with `{count}` and `{name}` placeholders.
    Emit(String),
    /// `print PATH`
    Print(ElementPath),
    /// `assert PATH`
    Assert(ElementPath),
}

/// A record filter used by `keep` and `drop`.
#[derive(Debug, Clone)]
pub enum Condition {
    Exists(ElementPath),
    Equals(ElementPath, String),
    Contains(ElementPath, String),
}

impl Condition {
    pub fn holds(&self, record: &Element) -> bool {
        match self {
            Condition::Exists(path) => path.first(record).is_some(),
            Condition::Equals(path, value) => path.first_text(record) == Some(value.as_str()),
            Condition::Contains(path, value) => path
                .first_text(record)
                .is_some_and(|text| text.contains(value.as_str())),
        }
    }
}
