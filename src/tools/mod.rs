//! Tool-call interpretation and execution subsystem
//!
//! - Extractor: decodes tool invocations from four incompatible model
//!   output encodings
//! - Registry: resolves tool names to native callables or Lua script tools
//! - Executor: runs a resolved implementation with isolated input/output
//!   channels and folds every failure into a recoverable result

pub mod executor;
pub mod extract;
pub mod native;
pub mod registry;
pub mod script;
pub mod types;

// Re-export commonly used types
pub use executor::ToolExecutor;
pub use extract::{extract, extract_from_text, Extraction};
pub use registry::{Callable, ImplementationKind, ToolRegistry};
pub use script::{ScriptEngine, ScriptTool};
pub use types::{flatten_arguments, ExecutionResult, ToolArguments, ToolInvocation};
