use thiserror::Error;

/// Failures raised by the composition runtime itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// `render` or `process_invalid_scopes` was called while this thread was
    /// already composing.
    #[error("composition is already in progress on this thread")]
    Reentrant,

    /// Invalid scopes kept re-invalidating each other.
    #[error("recomposition did not settle after {passes} passes")]
    RecompositionLimit { passes: usize },
}
