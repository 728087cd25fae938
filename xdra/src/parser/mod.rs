pub mod error;
pub mod script;
mod xml;

pub use error::ParseError;

use crate::document::Element;
use crate::script::Script;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the source XML into an owned element tree, returning its root.
    pub fn parse(&self) -> Result<Element, ParseError> {
        xml::parse_tree(&self.source, self.file_id)
    }

    /// Parse the source as extension script text.
    pub fn parse_script(&self) -> Result<Script, ParseError> {
        script::parse_script(&self.source, self.file_id)
    }
}
