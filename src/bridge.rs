//! Bootstrap and boundary for the embedded scripting runtime.
//!
//! One `ScriptBridge` per process. The runtime engine is created lazily on
//! first eval: the support-file cache is verified (or rebuilt), the support
//! modules are loaded, and the dispatcher command is registered. A bootstrap
//! failure is latched; later evals observe it instead of retrying.
//!
//! The entire API assumes a single caller context. The bridge is `!Send` by
//! construction and additionally asserts that every call comes from the
//! thread that created it.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::thread::{self, ThreadId};

use anyhow::{anyhow, bail, Context, Result};
use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString, Module, Position, Scope};

use crate::cache;
use crate::config::BridgeConfig;
use crate::dispatch::{self, DispatchStatus, EventCallback, EventDispatcher};
use crate::tokenizer::contains_math;

enum BootState {
    Pending,
    Ready,
    Failed(String),
}

pub struct ScriptBridge {
    config: BridgeConfig,
    engine: Option<Engine>,
    scope: Scope<'static>,
    dispatcher: Rc<RefCell<EventDispatcher>>,
    targets: BTreeSet<String>,
    boot: BootState,
    scratch: Vec<PathBuf>,
    owner: ThreadId,
    last_error: Option<String>,
    finalized: bool,
}

impl ScriptBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            engine: None,
            scope: Scope::new(),
            dispatcher: Rc::new(RefCell::new(EventDispatcher::default())),
            targets: BTreeSet::new(),
            boot: BootState::Pending,
            scratch: Vec::new(),
            owner: thread::current().id(),
            last_error: None,
            finalized: false,
        }
    }

    /// Latest error text from any bridge operation, for callers that poll
    /// instead of checking per-call results.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn record_error(&mut self, text: impl Into<String>) {
        self.last_error = Some(text.into());
    }

    pub(crate) fn ensure_owner(&self) -> Result<()> {
        if thread::current().id() != self.owner {
            bail!("bridge accessed outside its owning thread");
        }
        Ok(())
    }

    /// Evaluates `script` in the embedded runtime, bootstrapping it first if
    /// needed. The runtime's scope persists between calls.
    pub fn eval(&mut self, script: &str) -> Result<String> {
        let outcome = self.eval_inner(script);
        if let Err(err) = &outcome {
            self.last_error = Some(format!("{err:#}"));
        }
        outcome
    }

    fn eval_inner(&mut self, script: &str) -> Result<String> {
        self.ensure_owner()?;
        if self.finalized {
            bail!("bridge already finalized");
        }
        self.lazy_init()?;
        let engine = self.engine.as_ref().context("runtime engine missing after bootstrap")?;
        match engine.eval_with_scope::<Dynamic>(&mut self.scope, script) {
            Ok(value) => Ok(value.to_string()),
            Err(err) => Err(anyhow!("script evaluation failed: {err}")),
        }
    }

    fn lazy_init(&mut self) -> Result<()> {
        match &self.boot {
            BootState::Ready => Ok(()),
            BootState::Failed(message) => Err(anyhow!("bridge bootstrap previously failed: {message}")),
            BootState::Pending => match self.bootstrap() {
                Ok(()) => {
                    self.boot = BootState::Ready;
                    Ok(())
                }
                Err(err) => {
                    let message = format!("{err:#}");
                    self.boot = BootState::Failed(message.clone());
                    self.last_error = Some(message);
                    Err(err)
                }
            },
        }
    }

    fn bootstrap(&mut self) -> Result<()> {
        let root = self.config.cache_root.clone().unwrap_or_else(cache::default_root);
        let prepared = cache::prepare(&root)?;
        if let Some(scratch) = prepared.scratch.clone() {
            self.scratch.push(scratch);
        }

        let mut engine = Engine::new();
        engine.set_fast_operators(true);

        for artifact in &cache::ARTIFACTS {
            let path = prepared.dir.join(artifact.file_name);
            let source = fs::read_to_string(&path)
                .with_context(|| format!("reading support file {}", path.display()))?;
            let ast = engine
                .compile(&source)
                .map_err(|err| anyhow!("compiling {}: {err}", artifact.file_name))?;
            let module = Module::eval_ast_as_new(Scope::new(), &ast, &engine)
                .map_err(|err| anyhow!("loading {}: {err}", artifact.file_name))?;
            engine.register_global_module(module.into());
        }

        let dispatcher = Rc::clone(&self.dispatcher);
        engine.register_fn(
            self.config.dispatch_command.as_str(),
            move |id: ImmutableString, args: rhai::Array| -> Result<Dynamic, Box<EvalAltResult>> {
                let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
                let reply = dispatcher.borrow_mut().dispatch(id.as_str(), &args);
                match reply.status {
                    DispatchStatus::Completed(_) => Ok(reply.text.into()),
                    DispatchStatus::CallbackFailed | DispatchStatus::InternalError => {
                        Err(EvalAltResult::ErrorRuntime(reply.text.into(), Position::NONE).into())
                    }
                }
            },
        );

        self.engine = Some(engine);
        Ok(())
    }

    /// Idempotent teardown: drops the runtime instance and sweeps any
    /// staging directories left from a lost publish race.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        self.engine = None;
        self.scope = Scope::new();

        let mut failures = Vec::new();
        for dir in self.scratch.drain(..) {
            if dir.exists() {
                if let Err(err) = fs::remove_dir_all(&dir) {
                    failures.push(format!("{}: {err}", dir.display()));
                }
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            bail!("failed to remove scratch directories: {}", failures.join("; "))
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Stores `callback` in the dispatcher and returns its id. The id, as a
    /// string, is what runtime-side command text must pass back.
    pub fn bind_event(&mut self, target: &str, callback: EventCallback) -> u64 {
        self.dispatcher.borrow_mut().bind(target, callback)
    }

    pub fn unbind_event(&mut self, id: u64) -> bool {
        self.dispatcher.borrow_mut().unbind(id)
    }

    /// Command text that fires handler `id` from inside the runtime.
    pub fn event_invocation(&self, id: u64, args: &[&str]) -> String {
        dispatch::invocation(&self.config.dispatch_command, id, args)
    }

    /// Registers a new addressable target object under a path-like
    /// identifier. Duplicate paths fail.
    pub fn register_target(&mut self, path: &str) -> Result<String> {
        if !is_target_path(path) {
            bail!("target path '{path}' must start with '.' and use only [a-z0-9_.]");
        }
        if !self.targets.insert(path.to_string()) {
            bail!("target '{path}' is already registered");
        }
        Ok(path.to_string())
    }

    pub fn has_target(&self, path: &str) -> bool {
        self.targets.contains(path)
    }
}

fn is_target_path(path: &str) -> bool {
    if path == "." {
        return true;
    }
    let Some(rest) = path.strip_prefix('.') else {
        return false;
    };
    !rest.is_empty()
        && rest.split('.').all(|part| {
            !part.is_empty()
                && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        })
}

const SPECIALS: &[char] =
    &[' ', '\t', '\n', '\r', '"', '$', ';', '[', ']', '{', '}', '\\'];

/// Runtime-safe quoted form of an arbitrary string. The empty string becomes
/// the explicit empty group `{}` so it survives as a distinct argument.
pub fn safe_string(s: &str) -> String {
    if s.is_empty() {
        return "{}".to_string();
    }
    if !s.chars().any(|c| SPECIALS.contains(&c)) {
        return s.to_string();
    }
    if braces_balanced(s) && !s.contains('\\') {
        return format!("{{{s}}}");
    }
    let mut out = String::with_capacity(s.len() * 2);
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if SPECIALS.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

fn braces_balanced(s: &str) -> bool {
    let mut depth = 0i32;
    for c in s.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// One value in a heterogeneous option list.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Text(String),
    Int(i64),
    Real(f64),
    Flag(bool),
}

/// Serializes `-name value` pairs into a single runtime argument string.
/// Plain text values are quoted; values containing math segments are
/// forwarded verbatim so the runtime-side renderer sees the delimiters.
pub fn options_to_args(options: &[(&str, OptionValue)]) -> String {
    let mut parts = Vec::with_capacity(options.len() * 2);
    for (name, value) in options {
        parts.push(format!("-{name}"));
        parts.push(match value {
            OptionValue::Text(text) => {
                if contains_math(text) {
                    text.clone()
                } else {
                    safe_string(text)
                }
            }
            OptionValue::Int(v) => v.to_string(),
            OptionValue::Real(v) => v.to_string(),
            OptionValue::Flag(v) => if *v { "1" } else { "0" }.to_string(),
        });
    }
    parts.join(" ")
}
