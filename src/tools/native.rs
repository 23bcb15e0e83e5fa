//! Native callable tools
//!
//! An explicit registration table (name to function) built at startup
//! replaces dynamic plugin loading by exported-symbol name. The callable
//! contract is unchanged: an ordered list of string arguments in, a single
//! string out. Mapping arguments are flattened positionally; see
//! [`crate::tools::types::flatten_arguments`] for the ordering caveat.

use crate::tools::registry::{Callable, ImplementationKind};
use crate::tools::types::{flatten_arguments, ExecutionResult, ToolInvocation};
use async_trait::async_trait;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// Signature of a native callable: variadic string arguments, string out
pub type NativeFn =
    Box<dyn Fn(&[String]) -> std::result::Result<String, String> + Send + Sync>;

/// A named in-process tool implementation
pub struct NativeCallable {
    name: String,
    func: NativeFn,
}

impl NativeCallable {
    pub fn new(name: impl Into<String>, func: NativeFn) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl std::fmt::Debug for NativeCallable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeCallable")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl Callable for NativeCallable {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ImplementationKind {
        ImplementationKind::Native
    }

    async fn invoke(&self, invocation: &ToolInvocation) -> ExecutionResult {
        let start = Instant::now();

        let args = match flatten_arguments(&invocation.arguments) {
            Ok(args) => args,
            Err(err) => {
                return ExecutionResult::failure(&self.name, err.to_string(), start.elapsed())
            }
        };

        // A panicking callable must never take the host process down
        match catch_unwind(AssertUnwindSafe(|| (self.func)(&args))) {
            Ok(Ok(output)) => {
                ExecutionResult::success(&self.name, output.into_bytes(), start.elapsed())
            }
            Ok(Err(err)) => ExecutionResult::failure(&self.name, err, start.elapsed()),
            Err(_) => ExecutionResult::failure(
                &self.name,
                "native callable panicked".to_string(),
                start.elapsed(),
            ),
        }
    }
}

/// Build the startup registration table.
///
/// Ships the weather example so a fresh deployment has one working native
/// tool to exercise the pipeline against.
pub fn builtin_natives() -> HashMap<String, Arc<NativeCallable>> {
    let mut table = HashMap::new();
    register(&mut table, "Get_current_weather", Box::new(get_current_weather));
    table
}

fn register(
    table: &mut HashMap<String, Arc<NativeCallable>>,
    name: &str,
    func: NativeFn,
) {
    table.insert(name.to_string(), Arc::new(NativeCallable::new(name, func)));
}

/// Demonstration callable: echoes its arguments back.
///
/// Declare it to the backend with a descriptor like:
/// `{"type": "function", "function": {"name": "Get_current_weather", ...}}`.
fn get_current_weather(args: &[String]) -> std::result::Result<String, String> {
    let mut out = String::from("Function Get_current_weather called with arguments: ");
    for value in args {
        out.push_str(" '");
        out.push_str(value);
        out.push('\'');
    }
    Ok(out)
}
