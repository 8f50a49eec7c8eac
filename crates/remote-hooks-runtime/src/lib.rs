#![doc = r"Composition runtime for remotely loaded hooks: slot table, restartable groups, observable state, effects and composition locals."]
#![allow(non_snake_case)]

extern crate self as remote_hooks_runtime;

pub mod collections;
pub mod composer;
pub mod composition;
pub mod effects;
pub mod error;
pub mod hash;
pub mod locals;
pub mod owned;
pub mod platform;
pub mod runtime;
pub mod scope;
pub mod slot_table;
pub mod state;

pub use composer::{with_current_composer, Composer};
pub use composition::{Composition, MAX_RECOMPOSE_PASSES};
pub use effects::{
    DisposableEffectResult, DisposableEffectScope, SideEffect, __disposable_effect_impl,
};
pub use error::ComposeError;
pub use locals::{
    staticCompositionLocalOf, CompositionLocalProvider, ProvidedValue, StaticCompositionLocal,
};
pub use owned::Owned;
pub use platform::RuntimeScheduler;
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle, TaskId};
pub use scope::{RecomposeScope, WeakRecomposeScope};
pub use slot_table::SlotTable;
pub use state::MutableState;

use std::hash::Hash;
use std::rc::Rc;

pub type Key = u64;

pub fn location_key(file: &str, line: u32, column: u32) -> Key {
    hash::hash_one(&(file, line, column))
}

pub(crate) fn hash_key<K: Hash + ?Sized>(key: &K) -> Key {
    hash::hash_one(key)
}

/// Value that survives recomposition at this call position. Outside
/// composition the value is created fresh on every call.
pub fn remember<T: 'static>(init: impl FnOnce() -> T) -> Owned<T> {
    match composer::current_composer() {
        Some(composer) => composer.remember(init),
        None => Owned::new(init()),
    }
}

pub fn mutableStateOf<T: 'static>(initial: T) -> MutableState<T> {
    MutableState::new(initial)
}

pub fn useState<T: 'static>(init: impl FnOnce() -> T) -> MutableState<T> {
    remember(|| mutableStateOf(init())).with(|state| state.clone())
}

pub fn with_key<K: Hash + ?Sized, R>(key: &K, content: impl FnOnce() -> R) -> R {
    with_group(hash_key(key), content)
}

pub fn with_group<R>(key: Key, content: impl FnOnce() -> R) -> R {
    match composer::current_composer() {
        Some(composer) => composer.with_group(key, content),
        None => content(),
    }
}

/// Compose `body` in a group that recomposes on its own when state it read
/// changes. Outside composition `body` simply runs once.
pub fn compose_restartable(key: Key, body: impl Fn() + 'static) {
    match composer::current_composer() {
        Some(composer) => composer.restartable_group(key, Rc::new(body)),
        None => body(),
    }
}

pub fn current_recompose_scope() -> Option<RecomposeScope> {
    with_current_composer(|composer| composer.current_recompose_scope()).flatten()
}

pub fn current_runtime_handle() -> Option<RuntimeHandle> {
    with_current_composer(|composer| composer.runtime_handle())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
