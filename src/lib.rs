pub mod bridge;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod session;
pub mod tokenizer;

pub use bridge::{options_to_args, safe_string, OptionValue, ScriptBridge};
pub use config::{BridgeConfig, ErrorMode};
pub use dispatch::{DispatchReply, DispatchStatus, Event, EventDispatcher, ReturnCode};
pub use error::LifecycleError;
pub use host::Host;
pub use lifecycle::{ComponentKey, Extension, ExtensionContext, LifecycleState, ScriptContext, Theme};
pub use session::Session;
