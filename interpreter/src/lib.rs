pub mod cache;
pub mod context;
pub mod error;
pub mod model;
pub mod runner;
pub mod sort;
pub mod source;

pub use cache::ContentCache;
pub use context::LocalSources;
pub use error::RuntimeError;
pub use model::{MAX_NESTING, ModelInterpreter, Options, load_model};
pub use runner::{ScriptOutput, ScriptRunner};
pub use sort::sort_records;
pub use source::{Aggregator, SourceLoader};
