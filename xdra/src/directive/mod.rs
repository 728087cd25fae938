use crate::document::Element;

/// Namespace URI every directive element lives in.
pub const NAMESPACE: &str = "xdra";

/// Attribute names understood by the directives.
pub mod attr {
    pub const PATH: &str = "path";
    pub const NAME: &str = "name";
    pub const RECURSIVE: &str = "recursive";
    pub const TYPE: &str = "type";
    pub const KEY: &str = "key";
    pub const OUTPUT: &str = "output";
}

/// The kind of a model node, decided by its qualified tag name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Model,
    Source,
    Query,
    Action,
    GetNode,
    GetContent,
    Literal,
    /// Any element outside the directive vocabulary.
    PassThrough,
}

impl DirectiveKind {
    pub fn of(element: &Element) -> Self {
        if element.name.namespace.as_deref() != Some(NAMESPACE) {
            return DirectiveKind::PassThrough;
        }
        match element.name.local.as_str() {
            "model" => DirectiveKind::Model,
            "source" => DirectiveKind::Source,
            "query" => DirectiveKind::Query,
            "action" => DirectiveKind::Action,
            "getnode" => DirectiveKind::GetNode,
            "getcontent" => DirectiveKind::GetContent,
            "literal" => DirectiveKind::Literal,
            _ => DirectiveKind::PassThrough,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            DirectiveKind::Model => "model",
            DirectiveKind::Source => "source",
            DirectiveKind::Query => "query",
            DirectiveKind::Action => "action",
            DirectiveKind::GetNode => "getnode",
            DirectiveKind::GetContent => "getcontent",
            DirectiveKind::Literal => "literal",
            DirectiveKind::PassThrough => "(pass-through)",
        }
    }
}

/// `type` of an `xdra:source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Files,
    Url,
    Custom,
}

impl SourceType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "files" => Some(SourceType::Files),
            "url" => Some(SourceType::Url),
            "custom" => Some(SourceType::Custom),
            _ => None,
        }
    }
}

/// `type` of an `xdra:action`, i.e. the transform applied by enclosed getnodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionType {
    #[default]
    None,
    Sort,
    ReverseSort,
    Custom,
}

impl ActionType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sort" => Some(ActionType::Sort),
            "reversesort" => Some(ActionType::ReverseSort),
            "custom" => Some(ActionType::Custom),
            _ => None,
        }
    }
}

/// Boolean attribute convention: `"1"` and `"yes"` are true, anything else false.
pub fn is_flag_set(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "yes"))
}
