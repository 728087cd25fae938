use std::rc::Rc;

use log::debug;
use xdra::Element;
use xdra::parser::Parser;
use xdra::script::{Command, Script, Statement};

use crate::cache::{ContentCache, normalize_newlines};
use crate::error::RuntimeError;
use crate::sort::sort_records;

/// What a script run leaves behind: the bound tree after execution and the
/// text it emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutput {
    pub tree: Element,
    pub text: String,
}

/// Compiles extension scripts once per distinct text and runs them against a
/// bound tree.
pub struct ScriptRunner {
    cache: ContentCache<Script>,
    /// Source of the custom action waiting for its records.
    primed: Option<String>,
    compilations: usize,
    executions: usize,
}

impl ScriptRunner {
    pub fn new() -> Self {
        ScriptRunner {
            cache: ContentCache::new(),
            primed: None,
            compilations: 0,
            executions: 0,
        }
    }

    /// Compile `source`, or fetch the compiled script from the cache.
    pub fn compile(&mut self, source: &str) -> Result<Rc<Script>, RuntimeError> {
        let key = ContentCache::<Script>::key_for(source);
        if let Some(script) = self.cache.get(&key) {
            debug!("script cache hit for {:?}", key);
            return Ok(script);
        }

        let normalized = normalize_newlines(source);
        let script = Parser::new(normalized.clone(), 0)
            .parse_script()
            .map_err(|error| RuntimeError::ScriptCompile {
                script: normalized,
                error,
            })?;
        self.compilations += 1;
        debug!(
            "compiled script {:?} ({} statements)",
            key,
            script.statements.len()
        );
        Ok(self.cache.insert(key, script))
    }

    /// Compile (or reuse) `source` and execute it against `tree` with a fresh
    /// output buffer.
    pub fn run(&mut self, source: &str, tree: Element) -> Result<ScriptOutput, RuntimeError> {
        let script = self.compile(source)?;
        self.execute(&script, tree)
    }

    pub fn execute(&mut self, script: &Script, mut tree: Element) -> Result<ScriptOutput, RuntimeError> {
        self.executions += 1;
        let mut text = String::new();
        for statement in &script.statements {
            apply(statement, &mut tree, &mut text)?;
        }
        Ok(ScriptOutput { tree, text })
    }

    /// Hold `source` until the records of the enclosing action are known.
    pub fn prime(&mut self, source: &str) {
        self.primed = Some(source.to_string());
    }

    pub fn clear_primed(&mut self) {
        self.primed = None;
    }

    pub fn is_primed(&self) -> bool {
        self.primed.is_some()
    }

    /// Run the primed script. With nothing primed the tree comes back as is.
    pub fn run_primed(&mut self, tree: Element) -> Result<ScriptOutput, RuntimeError> {
        match self.primed.clone() {
            Some(source) => self.run(&source, tree),
            None => Ok(ScriptOutput {
                tree,
                text: String::new(),
            }),
        }
    }

    pub fn compilations(&self) -> usize {
        self.compilations
    }

    pub fn executions(&self) -> usize {
        self.executions
    }

    pub fn cached_scripts(&self) -> usize {
        self.cache.len()
    }
}

impl Default for ScriptRunner {
    fn default() -> Self {
        ScriptRunner::new()
    }
}

fn apply(statement: &Statement, tree: &mut Element, out: &mut String) -> Result<(), RuntimeError> {
    match &statement.command {
        Command::Append(element) => tree.append(element.clone()),
        Command::Sort { key, descending } => {
            sort_records(&mut tree.children, key, *descending)
                .map_err(|e| RuntimeError::ScriptExecution(e.to_string()))?;
        }
        Command::Reverse => tree.children.reverse(),
        Command::Keep(condition) => tree.children.retain(|record| condition.holds(record)),
        Command::Drop(condition) => tree.children.retain(|record| !condition.holds(record)),
        Command::Limit(n) => tree.children.truncate(*n),
        Command::Skip(n) => {
            let n = (*n).min(tree.children.len());
            tree.children.drain(..n);
        }
        Command::SetText { tag, value } => {
            for record in &mut tree.children {
                match record.children.iter_mut().find(|c| c.name.local == *tag) {
                    Some(child) => child.text = Some(value.clone()),
                    None => record.append(Element::with_text(tag.clone(), value.clone())),
                }
            }
        }
        Command::SetAttr { name, value } => {
            for record in &mut tree.children {
                record.set_attr(name.clone(), value.clone());
            }
        }
        Command::Remove(tag) => {
            for record in &mut tree.children {
                record.children.retain(|c| c.name.local != *tag);
            }
        }
        Command::Emit(template) => {
            let text = template
                .replace("{count}", &tree.children.len().to_string())
                .replace("{name}", &tree.name.to_string());
            out.push_str(&text);
        }
        Command::Print(path) => {
            for record in &tree.children {
                if let Some(text) = path.first_text(record) {
                    out.push_str(text);
                }
            }
        }
        Command::Assert(path) => {
            if let Some(index) = tree.children.iter().position(|r| path.first(r).is_none()) {
                return Err(RuntimeError::ScriptExecution(format!(
                    "record {} has no match for '{}'",
                    index + 1,
                    path
                )));
            }
        }
    }
    Ok(())
}
