use thiserror::Error;

/// Typed lifecycle violations surfaced by the registries and the host.
///
/// These travel inside `anyhow::Error` so call sites keep the usual `?`
/// propagation; callers that care about the kind use
/// `err.downcast_ref::<LifecycleError>()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("component '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("theme '{0}' is already activated")]
    AlreadyActivated(String),
    #[error("component '{0}' is already initialized")]
    AlreadyInitialized(String),
    #[error("theme '{0}' is not activated")]
    NotActivated(String),
    #[error("component '{0}' is not initialized")]
    NotInitialized(String),
    #[error("component '{0}' was finalized and cannot be used")]
    Finalized(String),
    #[error("no component matches '{0}'")]
    NotFound(String),
}
