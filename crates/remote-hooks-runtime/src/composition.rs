use std::sync::Arc;

use crate::composer::{is_composing, Composer, PassOutput};
use crate::error::ComposeError;
use crate::runtime::{DefaultScheduler, Runtime, RuntimeHandle};
use crate::scope::RecomposeScope;
use crate::slot_table::SlotTable;
use crate::Key;

/// Upper bound on consecutive recomposition batches before giving up.
pub const MAX_RECOMPOSE_PASSES: usize = 1024;

/// A composition: slot table plus the runtime that schedules its work.
pub struct Composition {
    // Dropped before the runtime so disposal callbacks can still invalidate.
    slots: SlotTable,
    runtime: Runtime,
}

impl Default for Composition {
    fn default() -> Self {
        Self::new()
    }
}

impl Composition {
    pub fn new() -> Self {
        Self::with_runtime(Runtime::new(Arc::new(DefaultScheduler)))
    }

    pub fn with_runtime(runtime: Runtime) -> Self {
        Self {
            slots: SlotTable::new(),
            runtime,
        }
    }

    /// Compose `content` from the root, then run effects and settle any
    /// scopes they invalidated.
    pub fn render(&mut self, key: Key, mut content: impl FnMut()) -> Result<(), ComposeError> {
        if is_composing() {
            return Err(ComposeError::Reentrant);
        }
        let composer = Composer::new(self.runtime_handle(), self.slots.root(), 0);
        let output = composer.install(|composer| {
            composer.with_group(key, || content());
            composer.finish_root()
        });
        apply(output);
        self.process_invalid_scopes()
    }

    pub fn should_render(&self) -> bool {
        self.runtime.needs_frame()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn slot_table(&self) -> &SlotTable {
        &self.slots
    }

    /// Recompose invalidated scopes, parents before children, until none are
    /// left.
    pub fn process_invalid_scopes(&mut self) -> Result<(), ComposeError> {
        if is_composing() {
            return Err(ComposeError::Reentrant);
        }
        let runtime = self.runtime_handle();
        let mut passes = 0;
        loop {
            let pending = runtime.take_invalidated_scopes();
            if pending.is_empty() {
                break;
            }
            passes += 1;
            if passes > MAX_RECOMPOSE_PASSES {
                log::error!("recomposition did not settle after {MAX_RECOMPOSE_PASSES} passes");
                return Err(ComposeError::RecompositionLimit {
                    passes: MAX_RECOMPOSE_PASSES,
                });
            }
            let mut scopes: Vec<RecomposeScope> = pending
                .into_iter()
                .filter_map(|(_, weak)| weak.upgrade())
                .map(|inner| RecomposeScope { inner })
                .collect();
            scopes.sort_by_key(RecomposeScope::depth);
            for scope in scopes {
                // A parent earlier in this batch may already have recomposed
                // or removed it.
                if !scope.is_active() || !scope.is_invalid() {
                    continue;
                }
                let Some(group) = scope.group() else {
                    continue;
                };
                let composer =
                    Composer::new(runtime.clone(), group, scope.depth().saturating_sub(1));
                let output = composer.install(|composer| {
                    composer.recompose(&scope);
                    composer.finish()
                });
                apply(output);
            }
        }
        if !runtime.has_invalid_scopes() && !runtime.has_ready_tasks() {
            self.runtime.set_needs_frame(false);
        }
        Ok(())
    }

    /// Poll ready tasks, then settle the scopes they invalidated.
    pub fn run_tasks(&mut self) -> Result<usize, ComposeError> {
        let polled = self.runtime_handle().drain_tasks();
        self.process_invalid_scopes()?;
        Ok(polled)
    }
}

fn apply(output: PassOutput) {
    let PassOutput {
        discarded,
        side_effects,
    } = output;
    drop(discarded);
    for effect in side_effects {
        effect();
    }
}
