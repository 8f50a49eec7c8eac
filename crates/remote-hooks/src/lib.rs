//! Remote hooks: stateful behavior loaded by name at runtime and run inside a
//! composition.
//!
//! A [`RemoteHookProvider`] owns the per-consumer stores and renders one
//! [`HookExecutionUnit`] per loaded hook. Descendants call [`useRemoteHook`]
//! to load a hook, feed it arguments and read its latest result.

#![allow(non_snake_case)]

pub mod args;
pub mod consumer;
pub mod error;
pub mod hook;
pub mod provider;
pub mod registry;
pub mod service;
pub mod value;

pub use args::{ArgChannel, ArgListener, ArgListenerHandle};
pub use consumer::{useRemoteHook, RemoteHookOptions, RemoteHookState};
pub use error::{BoxError, LoadError};
pub use hook::{
    HookResolver, ModuleRequest, RemoteHook, ResolveFuture, StaticResolver, DEFAULT_IMPORT_NAME,
};
pub use provider::{HookExecutionUnit, LocalRemoteHooks, RemoteHookProvider};
pub use registry::{ConsumerId, HookState, Notify, RegistryStore, StatePatch};
pub use service::{LiveCounts, RemoteHooks, Subscription};
pub use value::{args_shallow_eq, Callback, HookArgs, Value};
