//! Event dispatch registry: the table behind the single runtime-side
//! dispatcher command. Host callbacks are stored under small integer ids; the
//! runtime hands the id back as its first argument when an event fires.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::bridge::safe_string;

/// Control-flow signal a callback returns to the runtime alongside its
/// result text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnCode {
    #[default]
    Ok,
    Break,
    Continue,
}

/// Per-fire record handed to a callback. Created on demand, never persisted.
pub struct Event {
    pub id: u64,
    pub target: String,
    pub args: Vec<String>,
    result: String,
    code: ReturnCode,
    error: Option<String>,
}

impl Event {
    fn new(id: u64, target: String, args: Vec<String>) -> Self {
        Self { id, target, args, result: String::new(), code: ReturnCode::Ok, error: None }
    }

    pub fn set_result(&mut self, text: impl Into<String>) {
        self.result = text.into();
    }

    pub fn set_code(&mut self, code: ReturnCode) {
        self.code = code;
    }

    /// Records a failure; the dispatcher reports it through the runtime's
    /// error channel instead of the result channel.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn result(&self) -> &str {
        &self.result
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

pub type EventCallback = Box<dyn FnMut(&mut Event)>;

struct Handler {
    target: String,
    callback: EventCallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// Callback ran and reported no failure.
    Completed(ReturnCode),
    /// Callback ran and recorded a failure; `text` is the escaped message.
    CallbackFailed,
    /// The invocation never reached a callback (bad or unknown id).
    InternalError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReply {
    pub status: DispatchStatus,
    pub text: String,
}

impl DispatchReply {
    fn internal(text: String) -> Self {
        Self { status: DispatchStatus::InternalError, text }
    }
}

/// Renders the runtime-side command text that fires handler `id` with the
/// given literal arguments.
pub fn invocation(command: &str, id: u64, args: &[&str]) -> String {
    let rendered: Vec<String> = args.iter().map(|arg| format!("{arg:?}")).collect();
    format!("{command}(\"{id}\", [{}])", rendered.join(", "))
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<u64, Handler>,
    next_id: u64,
}

impl EventDispatcher {
    /// Stores `callback` under a fresh id and returns it. Ids start at 1 and
    /// are never reused within a process.
    pub fn bind(&mut self, target: impl Into<String>, callback: EventCallback) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.handlers.insert(id, Handler { target: target.into(), callback });
        id
    }

    pub fn unbind(&mut self, id: u64) -> bool {
        self.handlers.remove(&id).is_some()
    }

    pub fn target(&self, id: u64) -> Option<&str> {
        self.handlers.get(&id).map(|handler| handler.target.as_str())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs the handler named by `id_text` with the remaining invocation
    /// arguments. Parse failures and unknown ids never reach a callback and
    /// report as internal errors; callback failures (including caught
    /// panics) come back as `CallbackFailed` with the message escaped
    /// runtime-safe.
    pub fn dispatch(&mut self, id_text: &str, args: &[String]) -> DispatchReply {
        let id: u64 = match id_text.trim().parse() {
            Ok(id) => id,
            Err(_) => {
                return DispatchReply::internal(format!("event id '{id_text}' is not an integer"));
            }
        };
        let Some(handler) = self.handlers.get_mut(&id) else {
            return DispatchReply::internal(format!("no handler bound for event id {id}"));
        };

        let mut event = Event::new(id, handler.target.clone(), args.to_vec());
        let outcome = catch_unwind(AssertUnwindSafe(|| (handler.callback)(&mut event)));
        if let Err(payload) = outcome {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "opaque panic payload".to_string());
            event.error = Some(format!("callback panicked: {message}"));
        }

        match event.error {
            Some(err) => {
                DispatchReply { status: DispatchStatus::CallbackFailed, text: safe_string(&err) }
            }
            None => DispatchReply { status: DispatchStatus::Completed(event.code), text: event.result },
        }
    }
}
