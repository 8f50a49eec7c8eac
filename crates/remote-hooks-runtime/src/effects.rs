use std::hash::Hash;

use crate::composer::with_current_composer;
use crate::{hash_key, Key};

/// Run `effect` after the current pass completes.
#[allow(non_snake_case)]
pub fn SideEffect(effect: impl FnOnce() + 'static) {
    if with_current_composer(|composer| composer.register_side_effect(effect)).is_none() {
        log::warn!("SideEffect called outside of composition; dropped");
    }
}

#[derive(Default)]
struct DisposableEffectState {
    key: Option<Key>,
    cleanup: Option<Box<dyn FnOnce()>>,
}

impl DisposableEffectState {
    fn should_run(&self, key: Key) -> bool {
        self.key != Some(key)
    }

    fn run_cleanup(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl Drop for DisposableEffectState {
    fn drop(&mut self) {
        self.run_cleanup();
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DisposableEffectScope;

impl DisposableEffectScope {
    pub fn on_dispose(&self, cleanup: impl FnOnce() + 'static) -> DisposableEffectResult {
        DisposableEffectResult::new(cleanup)
    }
}

#[derive(Default)]
pub struct DisposableEffectResult {
    cleanup: Option<Box<dyn FnOnce()>>,
}

impl DisposableEffectResult {
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    fn into_cleanup(self) -> Option<Box<dyn FnOnce()>> {
        self.cleanup
    }
}

pub fn __disposable_effect_impl<K, F>(group_key: Key, keys: K, effect: F)
where
    K: Hash,
    F: FnOnce(DisposableEffectScope) -> DisposableEffectResult + 'static,
{
    let composed = with_current_composer(|composer| {
        composer.with_group(group_key, || {
            let key_hash = hash_key(&keys);
            let state = composer.remember(DisposableEffectState::default);
            if !state.with(|state| state.should_run(key_hash)) {
                return;
            }
            state.update(|state| state.key = Some(key_hash));
            let state_for_effect = state.clone();
            composer.register_side_effect(move || {
                // The previous cleanup runs after the pass, right before the
                // replacement effect, never in the middle of composition.
                let previous = state_for_effect.update(|state| state.cleanup.take());
                if let Some(cleanup) = previous {
                    cleanup();
                }
                let cleanup = effect(DisposableEffectScope).into_cleanup();
                state_for_effect.update(|state| state.cleanup = cleanup);
            });
        });
    });
    if composed.is_none() {
        log::warn!("DisposableEffect called outside of composition; dropped");
    }
}

#[macro_export]
macro_rules! DisposableEffect {
    ($keys:expr, $effect:expr) => {
        $crate::__disposable_effect_impl(
            $crate::location_key(file!(), line!(), column!()),
            $keys,
            $effect,
        )
    };
}
