use std::cell::RefCell;
use std::rc::Rc;

use xdra::Element;
use xdra::directive::ActionType;

/// How sources declared inside an `xdra:query` are scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalSources {
    /// Visible to getnodes inside the declaring query only, and dropped when
    /// the query ends.
    #[default]
    Scoped,
    /// Registered as global sources, visible to everything evaluated later.
    Global,
}

/// Registered sources. Child interpreters for nested models hold the same
/// lists, so a source declared in a child is visible to its parent afterwards.
#[derive(Debug, Default)]
pub struct SourceLists {
    pub global: Vec<Element>,
    pub local: Vec<Element>,
}

impl SourceLists {
    /// Sources a getnode may draw records from, in registration order.
    pub fn visible(&self) -> impl Iterator<Item = &Element> {
        self.global.iter().chain(self.local.iter())
    }
}

pub type SharedSources = Rc<RefCell<SourceLists>>;

/// Interpreter state threaded through the directive handlers.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Default path for getnodes without their own `path`.
    pub query_path: String,
    /// Transform applied by getnodes inside the current action.
    pub action: ActionType,
    /// Sort key of the current action.
    pub key: Option<String>,
    /// Indentation level, raised when a model, query or getnode renders a
    /// pass-through child.
    pub depth: usize,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    pub fn reset(&mut self) {
        *self = Context::default();
    }

    pub fn begin_action(&mut self, action: ActionType, key: Option<String>) {
        self.action = action;
        self.key = key;
    }

    /// Clear the transform so it cannot reach getnodes outside the action.
    pub fn end_action(&mut self) {
        self.action = ActionType::None;
        self.key = None;
    }
}
