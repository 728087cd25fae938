use thiserror::Error;
use xdra::parser::ParseError;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid root: expected xdra:model, found <{0}>")]
    InvalidRoot(String),

    /// Extension code that does not compile. `script` is the normalized
    /// script text the error span points into.
    #[error("extension script does not compile: {error}")]
    ScriptCompile { script: String, error: ParseError },

    #[error("extension script failed: {0}")]
    ScriptExecution(String),

    #[error("cannot load source '{location}': {message}")]
    SourceLoad { location: String, message: String },

    #[error("cannot read model '{path}': {message}")]
    ModelLoad { path: String, message: String },

    #[error("cannot parse model '{path}': {error}")]
    ModelParse { path: String, error: ParseError },

    #[error("models nested deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Failures the interpreter absorbs locally: the directive that caused
    /// them produces no output and evaluation continues with its siblings.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RuntimeError::InvalidRoot(_)
                | RuntimeError::SourceLoad { .. }
                | RuntimeError::ModelLoad { .. }
                | RuntimeError::ModelParse { .. }
        )
    }
}
