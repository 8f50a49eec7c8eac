//! Platform abstraction for runtime services.
//!
//! The runtime never drives itself: it asks the host for a frame whenever
//! a scope is invalidated or a task becomes ready, and the host calls back
//! into [`Composition`](crate::Composition) to do the work.

/// Receives frame requests from the runtime.
///
/// Task wakers may fire on any thread, so implementations must be
/// `Send + Sync`.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host schedule a new frame.
    fn schedule_frame(&self);
}
