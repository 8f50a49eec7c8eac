//! Error types for remote hooks.
//!
//! - [`LoadError`] - why a remote hook could not be resolved; surfaced in the
//!   consumer's `error` field, never raised into the tree
//! - [`BoxError`] - failures returned by argument listeners

use thiserror::Error;

/// A boxed error type for listener failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure to resolve a remote hook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// No remote container is registered under this scope.
    #[error("scope `{scope}` not found")]
    ScopeNotFound { scope: String },

    /// The scope exists but does not expose the module.
    #[error("module `{module}` not found in scope `{scope}`")]
    ModuleNotFound { scope: String, module: String },

    /// The module exists but has no export under this name.
    #[error("import `{import_name}` not found in `{scope}/{module}`")]
    ImportNotFound {
        scope: String,
        module: String,
        import_name: String,
    },

    /// The resolver failed for another reason; the message is passed through.
    #[error("{0}")]
    Failed(String),
}

impl LoadError {
    pub fn message(message: impl Into<String>) -> Self {
        LoadError::Failed(message.into())
    }
}

impl From<BoxError> for LoadError {
    fn from(err: BoxError) -> Self {
        LoadError::Failed(err.to_string())
    }
}
