use std::fs;
use std::io::{self, Read};
use std::path::Path;

use log::debug;
use walkdir::WalkDir;
use xdra::Element;
use xdra::parser::Parser;

use crate::error::RuntimeError;

/// Turns external data into a single source tree under a synthetic root.
pub trait SourceLoader {
    /// Every `*.xml` file in `dir` (and below it when `recursive`), each
    /// parsed and appended under a new `root_name` element.
    fn load_files(&self, dir: &Path, root_name: &str, recursive: bool) -> Result<Element, RuntimeError>;

    /// A single document from a URL, a file path (relative to `base_dir`),
    /// standard input (`-`) or an inline XML string, appended under a new
    /// `root_name` element.
    fn load_location(&self, location: &str, base_dir: &Path, root_name: &str) -> Result<Element, RuntimeError>;
}

/// The default loader: filesystem, HTTP and inline documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct Aggregator;

impl SourceLoader for Aggregator {
    fn load_files(&self, dir: &Path, root_name: &str, recursive: bool) -> Result<Element, RuntimeError> {
        let location = dir.display().to_string();
        let mut walker = WalkDir::new(dir).min_depth(1).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut root = Element::new(root_name);
        for entry in walker {
            let entry = entry.map_err(|e| load_error(&location, e.to_string()))?;
            let is_xml = entry.path().extension().is_some_and(|ext| ext == "xml");
            if !entry.file_type().is_file() || !is_xml {
                continue;
            }
            let file = entry.path().display().to_string();
            let text = fs::read_to_string(entry.path()).map_err(|e| load_error(&file, e.to_string()))?;
            root.append(parse_document(&text, &file)?);
            debug!("aggregated {} into <{}>", file, root_name);
        }
        Ok(root)
    }

    fn load_location(&self, location: &str, base_dir: &Path, root_name: &str) -> Result<Element, RuntimeError> {
        let text = read_location(location, base_dir)?;
        let mut root = Element::new(root_name);
        root.append(parse_document(&text, location)?);
        Ok(root)
    }
}

fn read_location(location: &str, base_dir: &Path) -> Result<String, RuntimeError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        debug!("fetching {}", location);
        let response = reqwest::blocking::get(location)
            .and_then(|response| response.error_for_status())
            .map_err(|e| load_error(location, e.to_string()))?;
        return response.text().map_err(|e| load_error(location, e.to_string()));
    }
    if location == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| load_error(location, e.to_string()))?;
        return Ok(text);
    }
    if location.trim_start().starts_with('<') {
        return Ok(location.to_string());
    }
    let path = location.strip_prefix("file://").unwrap_or(location);
    fs::read_to_string(base_dir.join(path)).map_err(|e| load_error(location, e.to_string()))
}

fn parse_document(text: &str, location: &str) -> Result<Element, RuntimeError> {
    Parser::new(text.to_string(), 0)
        .parse()
        .map_err(|e| load_error(location, e.to_string()))
}

fn load_error(location: &str, message: String) -> RuntimeError {
    RuntimeError::SourceLoad {
        location: location.to_string(),
        message,
    }
}
