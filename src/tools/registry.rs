//! Tool registry
//!
//! Maps a tool name to an executable implementation. Two kinds exist: a
//! native callable from the startup registration table, and a script tool
//! resolved by file convention (`<script_dir>/<name>.lua`: presence of
//! the file is the registration, no manifest is consulted at call time).
//!
//! The registry is populated once at startup and read-only for the
//! lifetime of every chat session; reloading is out of scope.

use crate::errors::{BridgeError, Result};
use crate::tools::native::{builtin_natives, NativeCallable, NativeFn};
use crate::tools::script::{ScriptEngine, ScriptTool};
use crate::tools::types::{ExecutionResult, ToolInvocation};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Implementation kind, for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplementationKind {
    Native,
    Script,
}

/// Capability set every tool implementation provides
#[async_trait]
pub trait Callable: Send + Sync + std::fmt::Debug {
    /// Registered tool name
    fn name(&self) -> &str;

    /// Which kind of implementation this is
    fn kind(&self) -> ImplementationKind;

    /// Run the tool against one invocation.
    ///
    /// Faults inside the implementation are reported through
    /// [`ExecutionResult::error`], never propagated as a process-fatal
    /// condition.
    async fn invoke(&self, invocation: &ToolInvocation) -> ExecutionResult;
}

/// Process-wide tool registry
pub struct ToolRegistry {
    /// Explicit native registration table, built at startup
    natives: HashMap<String, Arc<NativeCallable>>,

    /// Directory holding one script source file per tool
    script_dir: PathBuf,

    /// Shared script engine configuration
    engine: Arc<ScriptEngine>,
}

impl ToolRegistry {
    /// Create a registry over a script directory, with the built-in
    /// native callables registered
    pub fn new(script_dir: impl Into<PathBuf>) -> Self {
        Self {
            natives: builtin_natives(),
            script_dir: script_dir.into(),
            engine: Arc::new(ScriptEngine::new()),
        }
    }

    /// Register a native callable under a name, replacing any previous
    /// entry with that name
    pub fn register_native(&mut self, name: impl Into<String>, func: NativeFn) {
        let name = name.into();
        self.natives
            .insert(name.clone(), Arc::new(NativeCallable::new(name, func)));
    }

    /// Resolve a tool name to an implementation.
    ///
    /// The native table is consulted first, then the script directory.
    /// Not finding a tool is non-fatal: callers fall back to emitting the
    /// model's original text verbatim.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Callable>> {
        if name.is_empty() {
            return Err(BridgeError::Resolution("(empty tool name)".to_string()));
        }

        if let Some(native) = self.natives.get(name) {
            return Ok(native.clone() as Arc<dyn Callable>);
        }

        let path = self.script_path(name);
        if path.is_file() {
            return Ok(Arc::new(ScriptTool::new(name, path, self.engine.clone())));
        }

        Err(BridgeError::Resolution(name.to_string()))
    }

    /// Check whether a tool name resolves
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// Conventional script path for a tool name
    pub fn script_path(&self, name: &str) -> PathBuf {
        self.script_dir.join(format!("{name}.lua"))
    }

    /// Script directory this registry resolves against
    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }

    /// Names in the native registration table
    pub fn native_names(&self) -> Vec<String> {
        self.natives.keys().cloned().collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new("lua-tools")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_native_is_registered() {
        let registry = ToolRegistry::default();
        assert!(registry.contains("Get_current_weather"));

        let implementation = registry.resolve("Get_current_weather").unwrap();
        assert_eq!(implementation.kind(), ImplementationKind::Native);
        assert_eq!(implementation.name(), "Get_current_weather");
    }

    #[test]
    fn test_unknown_tool_is_not_found() {
        let registry = ToolRegistry::default();

        let err = registry.resolve("unknown_tool").unwrap_err();
        assert!(matches!(err, BridgeError::Resolution(_)));
        assert!(!registry.contains("unknown_tool"));
    }

    #[test]
    fn test_empty_name_is_not_found() {
        let registry = ToolRegistry::default();
        assert!(!registry.contains(""));
    }

    #[test]
    fn test_script_resolution_by_file_existence() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("echo_input.lua"), "print('ok')").unwrap();

        let registry = ToolRegistry::new(dir.path());
        let implementation = registry.resolve("echo_input").unwrap();
        assert_eq!(implementation.kind(), ImplementationKind::Script);

        // No file, no tool
        assert!(!registry.contains("other_tool"));
    }

    #[test]
    fn test_native_table_wins_over_script_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Get_current_weather.lua"), "print('shadowed')").unwrap();

        let registry = ToolRegistry::new(dir.path());
        let implementation = registry.resolve("Get_current_weather").unwrap();
        assert_eq!(implementation.kind(), ImplementationKind::Native);
    }

    #[test]
    fn test_register_native_replaces_entry() {
        let mut registry = ToolRegistry::default();
        registry.register_native(
            "Get_current_weather",
            Box::new(|_: &[String]| Ok("weather:ok".to_string())),
        );

        assert!(registry.native_names().contains(&"Get_current_weather".to_string()));
    }
}
