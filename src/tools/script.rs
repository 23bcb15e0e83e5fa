//! Script tools run by the embedded Lua engine
//!
//! A script tool is one Lua source file resolved by path convention. Its
//! arguments arrive as a single JSON document through a temporary file
//! whose path is exported in the `INPUT_DATA_FILE` environment variable;
//! everything the script prints is captured and returned as the tool's
//! output.
//!
//! Output capture binds the engine's `print` and `io.write` to an
//! in-memory sink supplied per execution, so script output can never
//! interleave with the host's own stdout and capture cannot deadlock on a
//! pipe buffer. The input channel is still process-global (an environment
//! variable), so at most one script execution is in flight per process:
//! [`SCRIPT_EXEC_LOCK`] serializes the set-execute-clear sequence and is
//! released on every exit path.
//!
//! Scripts interact with the outside world only through four host-provided
//! capability modules: `http`, `re`, `yaml` and `json`.

use crate::errors::{BridgeError, Result};
use crate::tools::registry::{Callable, ImplementationKind};
use crate::tools::types::{ExecutionResult, ToolInvocation};
use async_trait::async_trait;
use mlua::{Function, Lua, LuaSerdeExt, MultiValue, Table, Value, Variadic};
use std::cell::RefCell;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tempfile::NamedTempFile;

/// Environment variable naming the input artifact, the script-facing half
/// of the input channel contract
pub const INPUT_DATA_FILE_VAR: &str = "INPUT_DATA_FILE";

/// One script execution in flight per process; see module docs
static SCRIPT_EXEC_LOCK: Mutex<()> = Mutex::new(());

/// Embedded Lua engine shared by all script tools
#[derive(Debug, Default)]
pub struct ScriptEngine;

impl ScriptEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run a script file with the given argument document and return the
    /// bytes it printed.
    ///
    /// Blocking; callers run this on a blocking thread. Error kinds are
    /// distinct: open failure, channel setup failure, runtime failure.
    pub fn run_file(&self, path: &Path, input: &[u8]) -> Result<Vec<u8>> {
        let source = fs::read_to_string(path).map_err(|e| BridgeError::ScriptOpen {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let _guard = SCRIPT_EXEC_LOCK
            .lock()
            .map_err(|_| BridgeError::Channel("script execution lock poisoned".to_string()))?;

        let _channel = InputChannel::open(input)?;
        self.exec(&source, &path.display().to_string())
    }

    /// Execute Lua source with the sink and capability modules bound.
    fn exec(&self, source: &str, chunk_name: &str) -> Result<Vec<u8>> {
        let lua = Lua::new();
        let sink: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));

        bind_output_sink(&lua, &sink).map_err(runtime_error)?;
        install_capabilities(&lua).map_err(runtime_error)?;

        lua.load(source)
            .set_name(chunk_name)
            .exec()
            .map_err(runtime_error)?;

        let captured = sink.borrow().clone();
        Ok(captured)
    }
}

fn runtime_error(err: mlua::Error) -> BridgeError {
    BridgeError::ScriptRuntime(err.to_string())
}

/// The input half of the channel: a temporary artifact referenced by
/// `INPUT_DATA_FILE`. Dropping it clears the variable and deletes the
/// artifact, on every exit path.
struct InputChannel {
    _artifact: NamedTempFile,
}

impl InputChannel {
    fn open(input: &[u8]) -> Result<Self> {
        let mut artifact = NamedTempFile::new()
            .map_err(|e| BridgeError::Channel(format!("failed to create input artifact: {e}")))?;
        artifact
            .write_all(input)
            .map_err(|e| BridgeError::Channel(format!("failed to write input artifact: {e}")))?;
        artifact
            .flush()
            .map_err(|e| BridgeError::Channel(format!("failed to flush input artifact: {e}")))?;

        env::set_var(INPUT_DATA_FILE_VAR, artifact.path());
        Ok(Self { _artifact: artifact })
    }
}

impl Drop for InputChannel {
    fn drop(&mut self) {
        env::remove_var(INPUT_DATA_FILE_VAR);
    }
}

/// Rebind `print` and `io.write` to an in-memory sink.
fn bind_output_sink(lua: &Lua, sink: &Rc<RefCell<Vec<u8>>>) -> mlua::Result<()> {
    let globals = lua.globals();
    let tostring: Function = globals.get("tostring")?;

    let print_sink = sink.clone();
    let print_tostring = tostring.clone();
    let print = lua.create_function(move |_, values: Variadic<Value>| {
        let mut buf = print_sink.borrow_mut();
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                buf.push(b'\t');
            }
            let text: String = print_tostring.call(value.clone())?;
            buf.extend_from_slice(text.as_bytes());
        }
        buf.push(b'\n');
        Ok(())
    })?;
    globals.set("print", print)?;

    let write_sink = sink.clone();
    let write = lua.create_function(move |_, values: MultiValue| {
        let mut buf = write_sink.borrow_mut();
        for value in values.iter() {
            let text: String = tostring.call(value.clone())?;
            buf.extend_from_slice(text.as_bytes());
        }
        Ok(())
    })?;
    let io: Table = globals.get("io")?;
    io.set("write", write)?;

    Ok(())
}

/// Install the four host capability modules under `package.loaded` so
/// scripts reach them with `require(...)`.
fn install_capabilities(lua: &Lua) -> mlua::Result<()> {
    let package: Table = lua.globals().get("package")?;
    let loaded: Table = package.get("loaded")?;

    loaded.set("json", json_module(lua)?)?;
    loaded.set("yaml", yaml_module(lua)?)?;
    loaded.set("re", re_module(lua)?)?;
    loaded.set("http", http_module(lua)?)?;

    Ok(())
}

/// `json` capability: encode/decode between Lua values and JSON text
fn json_module(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;

    module.set(
        "encode",
        lua.create_function(|lua, value: Value| {
            let json: serde_json::Value = lua.from_value(value)?;
            serde_json::to_string(&json).map_err(mlua::Error::external)
        })?,
    )?;

    module.set(
        "decode",
        lua.create_function(|lua, text: String| {
            let json: serde_json::Value =
                serde_json::from_str(&text).map_err(mlua::Error::external)?;
            lua.to_value(&json)
        })?,
    )?;

    Ok(module)
}

/// `yaml` capability: encode/decode between Lua values and YAML text
fn yaml_module(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;

    module.set(
        "encode",
        lua.create_function(|lua, value: Value| {
            let json: serde_json::Value = lua.from_value(value)?;
            serde_yaml::to_string(&json).map_err(mlua::Error::external)
        })?,
    )?;

    module.set(
        "decode",
        lua.create_function(|lua, text: String| {
            let json: serde_json::Value =
                serde_yaml::from_str(&text).map_err(mlua::Error::external)?;
            lua.to_value(&json)
        })?,
    )?;

    Ok(module)
}

/// `re` capability: regex find, capture and replace
fn re_module(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;

    module.set(
        "find",
        lua.create_function(|_, (text, pattern): (String, String)| {
            let re = regex::Regex::new(&pattern).map_err(mlua::Error::external)?;
            Ok(re.find(&text).map(|m| m.as_str().to_string()))
        })?,
    )?;

    module.set(
        "match",
        lua.create_function(|lua, (text, pattern): (String, String)| {
            let re = regex::Regex::new(&pattern).map_err(mlua::Error::external)?;
            match re.captures(&text) {
                None => Ok(Value::Nil),
                Some(captures) => {
                    let groups = lua.create_table()?;
                    for (i, group) in captures.iter().enumerate() {
                        if let Some(m) = group {
                            groups.set(i, m.as_str())?;
                        }
                    }
                    Ok(Value::Table(groups))
                }
            }
        })?,
    )?;

    module.set(
        "gsub",
        lua.create_function(|_, (text, pattern, replacement): (String, String, String)| {
            let re = regex::Regex::new(&pattern).map_err(mlua::Error::external)?;
            Ok(re.replace_all(&text, replacement.as_str()).into_owned())
        })?,
    )?;

    Ok(module)
}

/// `http` capability: a blocking client for scripts, safe because the
/// engine always runs on a blocking thread
fn http_module(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    let client = reqwest::blocking::Client::new();

    let get_client = client.clone();
    module.set(
        "get",
        lua.create_function(move |lua, url: String| {
            let response = get_client.get(&url).send().map_err(mlua::Error::external)?;
            http_response_table(lua, response)
        })?,
    )?;

    module.set(
        "post",
        lua.create_function(
            move |lua, (url, body, content_type): (String, String, Option<String>)| {
                let response = client
                    .post(&url)
                    .header(
                        "Content-Type",
                        content_type.unwrap_or_else(|| "application/json".to_string()),
                    )
                    .body(body)
                    .send()
                    .map_err(mlua::Error::external)?;
                http_response_table(lua, response)
            },
        )?,
    )?;

    Ok(module)
}

fn http_response_table(lua: &Lua, response: reqwest::blocking::Response) -> mlua::Result<Table> {
    let status = response.status().as_u16();
    let body = response.text().map_err(mlua::Error::external)?;

    let table = lua.create_table()?;
    table.set("status_code", status)?;
    table.set("body", body)?;
    Ok(table)
}

/// A script tool resolved from the conventional directory
#[derive(Debug)]
pub struct ScriptTool {
    name: String,
    path: PathBuf,
    engine: Arc<ScriptEngine>,
}

impl ScriptTool {
    pub fn new(name: impl Into<String>, path: PathBuf, engine: Arc<ScriptEngine>) -> Self {
        Self {
            name: name.into(),
            path,
            engine,
        }
    }
}

#[async_trait]
impl Callable for ScriptTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ImplementationKind {
        ImplementationKind::Script
    }

    async fn invoke(&self, invocation: &ToolInvocation) -> ExecutionResult {
        let start = Instant::now();

        let input = match invocation.input_document() {
            Ok(input) => input,
            Err(err) => {
                return ExecutionResult::failure(&self.name, err.to_string(), start.elapsed())
            }
        };

        // Single-value handoff: the blocking engine call delivers its
        // captured bytes once through the join future. If the request is
        // cancelled the task runs to completion and the result is
        // discarded with the dropped handle.
        let engine = self.engine.clone();
        let path = self.path.clone();
        let handoff = tokio::task::spawn_blocking(move || engine.run_file(&path, &input));

        match handoff.await {
            Ok(Ok(output)) => ExecutionResult::success(&self.name, output, start.elapsed()),
            Ok(Err(err)) => ExecutionResult::failure(&self.name, err.to_string(), start.elapsed()),
            Err(join_err) => ExecutionResult::failure(
                &self.name,
                format!("script task aborted: {join_err}"),
                start.elapsed(),
            ),
        }
    }
}
