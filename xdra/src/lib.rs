pub mod directive;
pub mod document;
pub mod parser;
pub mod path;
pub mod script;

pub use document::{Attribute, Element, QName};
pub use path::{ElementPath, PathError};
