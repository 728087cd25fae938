//! The model interpreter: walks an `xdra:model` tree, resolves getnode paths
//! against the registered sources and renders the output text.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, info, warn};
use xdra::directive::{ActionType, DirectiveKind, SourceType, attr, is_flag_set};
use xdra::document::serialize::{write_end_tag, write_start_tag};
use xdra::parser::Parser;
use xdra::{Element, ElementPath};

use crate::context::{Context, LocalSources, SharedSources};
use crate::error::RuntimeError;
use crate::runner::ScriptRunner;
use crate::sort::sort_records;
use crate::source::{Aggregator, SourceLoader};

/// Deepest chain of nested models before evaluation gives up.
pub const MAX_NESTING: usize = 64;

/// Tag of the synthetic root a custom action's records are bound under.
const CUSTOM_ACTION_ROOT: &str = "root";

/// Root name for url sources declared without a `name`.
const DEFAULT_SOURCE_ROOT: &str = "source";

#[derive(Debug, Clone)]
pub struct Options {
    /// One level of pass-through indentation.
    pub indent: String,
    pub local_sources: LocalSources,
    /// Directory relative source, model and output paths resolve against.
    pub base_dir: PathBuf,
    /// Honor the root model's `output` attribute.
    pub write_output: bool,
    pub max_nesting: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            indent: "    ".to_string(),
            local_sources: LocalSources::default(),
            base_dir: PathBuf::from("."),
            write_output: true,
            max_nesting: MAX_NESTING,
        }
    }
}

/// Where a source declaration registers its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Global,
    /// Declared directly inside an `xdra:query`.
    Local,
}

pub struct ModelInterpreter {
    options: Options,
    sources: SharedSources,
    context: Context,
    runner: ScriptRunner,
    loader: Rc<dyn SourceLoader>,
    /// How many models enclose this one.
    nesting: usize,
}

impl ModelInterpreter {
    pub fn new() -> Self {
        ModelInterpreter::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        ModelInterpreter {
            options,
            sources: SharedSources::default(),
            context: Context::new(),
            runner: ScriptRunner::new(),
            loader: Rc::new(Aggregator),
            nesting: 0,
        }
    }

    /// Seed the interpreter with global sources.
    pub fn with_sources(mut self, sources: Vec<Element>) -> Self {
        self.sources.borrow_mut().global.extend(sources);
        self
    }

    pub fn with_loader(mut self, loader: impl SourceLoader + 'static) -> Self {
        self.loader = Rc::new(loader);
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn runner(&self) -> &ScriptRunner {
        &self.runner
    }

    pub fn add_source(&mut self, source: Element) {
        self.sources.borrow_mut().global.push(source);
    }

    pub fn global_sources(&self) -> Vec<Element> {
        self.sources.borrow().global.clone()
    }

    pub fn local_source_count(&self) -> usize {
        self.sources.borrow().local.len()
    }

    /// Return to the freshly constructed state, optionally keeping the
    /// registered sources. Compiled scripts stay cached.
    pub fn reset(&mut self, keep_sources: bool) {
        if !keep_sources {
            self.sources = SharedSources::default();
        }
        self.context.reset();
        self.runner.clear_primed();
    }

    /// Evaluate a model document and return its output text.
    ///
    /// The only recoverable failure reported here is a root that is not an
    /// `xdra:model`; malformed directives inside the model are skipped.
    pub fn run(&mut self, model: &Element) -> Result<String, RuntimeError> {
        if DirectiveKind::of(model) != DirectiveKind::Model {
            return Err(RuntimeError::InvalidRoot(model.name.to_string()));
        }

        let mut output = String::new();
        for child in &model.children {
            output.push_str(&self.eval_nested(child, None, Scope::Global)?);
        }

        if let Some(target) = model.attr(attr::OUTPUT) {
            let target = self.options.base_dir.join(target);
            if self.options.write_output {
                fs::write(&target, &output)?;
                info!("wrote output to {}", target.display());
            } else {
                debug!("not writing output to {}", target.display());
            }
        }
        Ok(output)
    }

    /// A child interpreter for a nested model: same sources and loader,
    /// fresh context and script runner.
    fn child(&self, base_dir: PathBuf) -> ModelInterpreter {
        ModelInterpreter {
            options: Options {
                base_dir,
                ..self.options.clone()
            },
            sources: Rc::clone(&self.sources),
            context: Context::new(),
            runner: ScriptRunner::new(),
            loader: Rc::clone(&self.loader),
            nesting: self.nesting + 1,
        }
    }

    fn eval_node(
        &mut self,
        node: &Element,
        item: Option<&Element>,
        scope: Scope,
    ) -> Result<String, RuntimeError> {
        let kind = DirectiveKind::of(node);
        debug!("evaluating <{}> as {}", node.name, kind.tag());
        match kind {
            DirectiveKind::Source => {
                self.eval_source(node, scope)?;
                Ok(String::new())
            }
            DirectiveKind::Query => self.eval_query(node, item),
            DirectiveKind::Action => self.eval_action(node, item),
            DirectiveKind::GetNode => self.eval_getnode(node),
            DirectiveKind::GetContent => Ok(eval_getcontent(node, item)),
            DirectiveKind::Literal => Ok(eval_literal(node)),
            DirectiveKind::Model => self.eval_nested_model(node),
            DirectiveKind::PassThrough => self.eval_pass_through(node, item),
        }
    }

    fn eval_children(
        &mut self,
        node: &Element,
        item: Option<&Element>,
        scope: Scope,
    ) -> Result<String, RuntimeError> {
        let mut output = String::new();
        for child in &node.children {
            output.push_str(&self.eval_node(child, item, scope)?);
        }
        Ok(output)
    }

    /// Evaluate a child of a model, query or getnode. A pass-through child
    /// renders one indentation level deeper than its parent directive.
    fn eval_nested(
        &mut self,
        node: &Element,
        item: Option<&Element>,
        scope: Scope,
    ) -> Result<String, RuntimeError> {
        if DirectiveKind::of(node) != DirectiveKind::PassThrough {
            return self.eval_node(node, item, scope);
        }
        self.context.depth += 1;
        let result = self.eval_node(node, item, scope);
        self.context.depth -= 1;
        result
    }

    fn eval_source(&mut self, node: &Element, scope: Scope) -> Result<(), RuntimeError> {
        let declared = node.attr(attr::TYPE);
        let Some(source_type) = declared.and_then(SourceType::parse) else {
            debug!("source: undefined source type {:?}", declared);
            return Ok(());
        };
        let path = node.attr(attr::PATH);
        let name = node.attr(attr::NAME);

        let loaded = match source_type {
            SourceType::Files => {
                let (Some(path), Some(name)) = (path, name) else {
                    debug!("source: files source needs both a path and a name");
                    return Ok(());
                };
                let recursive = is_flag_set(node.attr(attr::RECURSIVE));
                self.loader
                    .load_files(&self.options.base_dir.join(path), name, recursive)
            }
            SourceType::Url => {
                let Some(path) = path else {
                    debug!("source: url source without a path");
                    return Ok(());
                };
                self.loader.load_location(
                    path,
                    &self.options.base_dir,
                    name.unwrap_or(DEFAULT_SOURCE_ROOT),
                )
            }
            SourceType::Custom => {
                let Some(name) = name else {
                    debug!("source: custom source without a name");
                    return Ok(());
                };
                let script = node.text.as_deref().unwrap_or("");
                let output = self.runner.run(script, Element::new(name))?;
                if !output.text.is_empty() {
                    debug!("source: discarding text emitted by custom source '{}'", name);
                }
                Ok(output.tree)
            }
        };

        match loaded {
            Ok(source) => {
                self.register(source, scope);
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                warn!("skipping source: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn register(&mut self, source: Element, scope: Scope) {
        let mut sources = self.sources.borrow_mut();
        match (scope, self.options.local_sources) {
            (Scope::Local, LocalSources::Scoped) => sources.local.push(source),
            _ => sources.global.push(source),
        }
    }

    fn eval_query(&mut self, node: &Element, item: Option<&Element>) -> Result<String, RuntimeError> {
        let path = match node.attr(attr::PATH) {
            Some(path) => path.strip_suffix('/').unwrap_or(path).to_string(),
            None => {
                debug!("query: no path");
                String::new()
            }
        };
        if let Some(kind) = node.attr(attr::TYPE).filter(|kind| *kind != "fetch") {
            debug!("query: unsupported type '{}', fetching", kind);
        }

        let outer_path = std::mem::replace(&mut self.context.query_path, path);
        let outer_locals = std::mem::take(&mut self.sources.borrow_mut().local);

        let result = node
            .children
            .iter()
            .try_fold(String::new(), |mut output, child| -> Result<String, RuntimeError> {
                output.push_str(&self.eval_nested(child, item, Scope::Local)?);
                Ok(output)
            });

        self.sources.borrow_mut().local = outer_locals;
        self.context.query_path = outer_path;
        result
    }

    fn eval_action(&mut self, node: &Element, item: Option<&Element>) -> Result<String, RuntimeError> {
        let action = match node.attr(attr::TYPE) {
            None => ActionType::None,
            Some(declared) => ActionType::parse(declared).unwrap_or_else(|| {
                debug!("action: unknown type '{}'", declared);
                ActionType::None
            }),
        };
        let key = node.attr(attr::KEY).map(str::to_string);

        self.context.begin_action(action, key);
        if action == ActionType::Custom {
            self.runner.prime(node.text.as_deref().unwrap_or(""));
        }

        let result = self.eval_children(node, item, Scope::Global);

        self.context.end_action();
        self.runner.clear_primed();
        result
    }

    fn eval_getnode(&mut self, node: &Element) -> Result<String, RuntimeError> {
        let path = node
            .attr(attr::PATH)
            .unwrap_or(self.context.query_path.as_str())
            .to_string();
        if path.is_empty() {
            debug!("getnode: no path and no enclosing query path");
            return Ok(String::new());
        }
        let compiled = match ElementPath::parse(&path) {
            Ok(compiled) => compiled,
            Err(e) => {
                debug!("getnode: {}", e);
                return Ok(String::new());
            }
        };

        let mut records: Vec<Element> = self
            .sources
            .borrow()
            .visible()
            .flat_map(|source| compiled.select(source))
            .cloned()
            .collect();
        debug!("getnode: '{}' matched {} records", path, records.len());

        let mut output = String::new();
        match self.context.action {
            ActionType::Sort | ActionType::ReverseSort => match self.context.key.as_deref() {
                Some(key) => {
                    let descending = self.context.action == ActionType::ReverseSort;
                    if let Err(e) = sort_records(&mut records, key, descending) {
                        debug!("getnode: cannot sort by '{}': {}", key, e);
                    }
                }
                None => debug!("getnode: sort action without a key"),
            },
            ActionType::Custom => {
                let bound = Element::with_children(CUSTOM_ACTION_ROOT, records);
                let result = self.runner.run_primed(bound)?;
                output.push_str(&result.text);
                records = result.tree.children;
            }
            ActionType::None => {}
        }

        if node.is_leaf() {
            for record in &records {
                output.push_str(&record.to_xml_string());
            }
        } else {
            for record in &records {
                for child in &node.children {
                    output.push_str(&self.eval_nested(child, Some(record), Scope::Global)?);
                }
            }
        }
        Ok(output)
    }

    fn eval_nested_model(&mut self, node: &Element) -> Result<String, RuntimeError> {
        if self.nesting >= self.options.max_nesting {
            return Err(RuntimeError::NestingTooDeep(self.options.max_nesting));
        }

        let result = match node.attr(attr::PATH) {
            Some(path) => {
                let resolved = self.options.base_dir.join(path);
                load_model(&resolved).and_then(|model| {
                    let base_dir = resolved
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.options.base_dir.clone());
                    self.child(base_dir).run(&model)
                })
            }
            None if node.is_leaf() => {
                debug!("model: a nested model without a path needs children");
                return Ok(String::new());
            }
            None => self.child(self.options.base_dir.clone()).run(node),
        };

        match result {
            Err(e) if e.is_recoverable() => {
                debug!("model: skipping nested model: {}", e);
                Ok(String::new())
            }
            other => other,
        }
    }

    /// Render an element outside the directive vocabulary.
    ///
    /// Attributes are kept, directive children are evaluated in place and
    /// other children are rendered recursively. Character data directly
    /// inside the element is dropped; emit text with `xdra:literal`.
    /// Nested pass-through elements share their parent's depth.
    fn eval_pass_through(
        &mut self,
        node: &Element,
        item: Option<&Element>,
    ) -> Result<String, RuntimeError> {
        let depth = self.context.depth;
        let indent = self.options.indent.repeat(depth.saturating_sub(1));

        let mut out = String::new();
        if depth > 1 {
            out.push('\n');
        }
        out.push_str(&indent);
        if node.is_leaf() {
            write_start_tag(&mut out, node, true);
            return Ok(out);
        }

        write_start_tag(&mut out, node, false);
        for child in &node.children {
            let data = self.eval_node(child, item, Scope::Global)?;
            if data.is_empty() {
                continue;
            }
            if matches!(
                DirectiveKind::of(child),
                DirectiveKind::GetNode | DirectiveKind::GetContent | DirectiveKind::Model
            ) {
                out.push('\n');
            }
            out.push_str(&data);
        }
        out.push('\n');
        out.push_str(&indent);
        write_end_tag(&mut out, node);
        Ok(out)
    }
}

impl Default for ModelInterpreter {
    fn default() -> Self {
        ModelInterpreter::new()
    }
}

/// Text of the first match of `path` inside the current record.
fn eval_getcontent(node: &Element, item: Option<&Element>) -> String {
    let Some(path) = node.attr(attr::PATH) else {
        debug!("getcontent: no path");
        return String::new();
    };
    let Some(item) = item else {
        debug!("getcontent: '{}' outside a getnode", path);
        return String::new();
    };
    match item.find_text(path) {
        Ok(text) => text.unwrap_or_default().to_string(),
        Err(e) => {
            debug!("getcontent: {}", e);
            String::new()
        }
    }
}

/// The literal's own text exactly as parsed (entities already resolved),
/// followed by its child elements serialized verbatim.
fn eval_literal(node: &Element) -> String {
    let mut out = node.text.clone().unwrap_or_default();
    for child in &node.children {
        out.push_str(&child.to_xml_string());
    }
    out
}

/// Read and parse a model file.
pub fn load_model(path: &Path) -> Result<Element, RuntimeError> {
    let source = fs::read_to_string(path).map_err(|e| RuntimeError::ModelLoad {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Parser::new(source, 0)
        .parse()
        .map_err(|error| RuntimeError::ModelParse {
            path: path.display().to_string(),
            error,
        })
}
