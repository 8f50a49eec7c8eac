use std::any::Any;
use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

use crate::locals::{self, LocalChain, ProvidedValue};
use crate::owned::Owned;
use crate::runtime::RuntimeHandle;
use crate::scope::{RecomposeBody, RecomposeScope};
use crate::slot_table::{GroupRef, RememberSlot, Slot, SlotWriter};
use crate::{hash_key, Key};

thread_local! {
    static CURRENT_COMPOSER: RefCell<Vec<Composer>> = const { RefCell::new(Vec::new()) };
}

/// Run `f` against the composer driving the current pass, if any.
pub fn with_current_composer<R>(f: impl FnOnce(&Composer) -> R) -> Option<R> {
    current_composer().map(|composer| f(&composer))
}

pub(crate) fn current_composer() -> Option<Composer> {
    CURRENT_COMPOSER.with(|stack| stack.borrow().last().cloned())
}

pub(crate) fn is_composing() -> bool {
    CURRENT_COMPOSER.with(|stack| !stack.borrow().is_empty())
}

struct ComposerInner {
    runtime: RuntimeHandle,
    slots: RefCell<SlotWriter>,
    base_depth: usize,
    scope_stack: RefCell<Vec<RecomposeScope>>,
    locals: RefCell<LocalChain>,
    side_effects: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// Handle to the state of one composition pass.
///
/// Every method takes `&self`; no internal borrow is held while user code
/// runs, so composables may freely call back into the composer.
#[derive(Clone)]
pub struct Composer {
    inner: Rc<ComposerInner>,
}

/// Work left over after a pass: slots that left the table and effects to run.
pub(crate) struct PassOutput {
    pub(crate) discarded: Vec<Slot>,
    pub(crate) side_effects: Vec<Box<dyn FnOnce()>>,
}

impl Composer {
    pub(crate) fn new(runtime: RuntimeHandle, group: GroupRef, base_depth: usize) -> Self {
        Self {
            inner: Rc::new(ComposerInner {
                runtime,
                slots: RefCell::new(SlotWriter::new(group)),
                base_depth,
                scope_stack: RefCell::new(Vec::new()),
                locals: RefCell::new(None),
                side_effects: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Make this composer current for the duration of `f`.
    pub(crate) fn install<R>(&self, f: impl FnOnce(&Composer) -> R) -> R {
        CURRENT_COMPOSER.with(|stack| stack.borrow_mut().push(self.clone()));
        struct Guard;
        impl Drop for Guard {
            fn drop(&mut self) {
                CURRENT_COMPOSER.with(|stack| {
                    stack.borrow_mut().pop();
                });
            }
        }
        let _guard = Guard;
        f(self)
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.inner.runtime.clone()
    }

    pub fn with_group<R>(&self, key: Key, f: impl FnOnce() -> R) -> R {
        self.inner.slots.borrow_mut().start_group(key);
        let result = f();
        self.inner.slots.borrow_mut().end_group();
        result
    }

    pub fn with_key<K: Hash + ?Sized, R>(&self, key: &K, f: impl FnOnce() -> R) -> R {
        self.with_group(hash_key(key), f)
    }

    /// Compose `body` inside a group that can later be recomposed on its own.
    pub fn restartable_group(&self, key: Key, body: RecomposeBody) {
        let (group, depth) = {
            let mut slots = self.inner.slots.borrow_mut();
            let group = slots.start_group(key);
            (group, self.inner.base_depth + slots.depth())
        };
        let existing = group.borrow().scope();
        let scope = match existing {
            Some(scope) => scope,
            None => {
                let scope = RecomposeScope::new(self.runtime_handle(), depth);
                group.borrow_mut().set_scope(scope.clone());
                scope
            }
        };
        self.run_scope(&scope, &group, body);
        self.inner.slots.borrow_mut().end_group();
    }

    /// Re-run an invalidated scope from the start of its group. The composer
    /// must have been created over that group.
    pub(crate) fn recompose(&self, scope: &RecomposeScope) {
        let Some(group) = scope.group() else {
            return;
        };
        let Some(body) = scope.body() else {
            return;
        };
        *self.inner.locals.borrow_mut() = scope.locals();
        self.run_scope(scope, &group, body);
        self.inner.slots.borrow_mut().end_group();
    }

    fn run_scope(&self, scope: &RecomposeScope, group: &GroupRef, body: RecomposeBody) {
        let locals = self.inner.locals.borrow().clone();
        scope.begin_compose(group, locals, Rc::clone(&body));
        self.inner.scope_stack.borrow_mut().push(scope.clone());
        body();
        self.inner.scope_stack.borrow_mut().pop();
        scope.end_compose();
    }

    pub fn remember<T: 'static>(&self, init: impl FnOnce() -> T) -> Owned<T> {
        let slot = self.inner.slots.borrow_mut().remember_slot::<T>();
        match slot {
            RememberSlot::Existing(owned) => owned,
            RememberSlot::Vacant(pending) => {
                let owned = Owned::new(init());
                self.inner.slots.borrow_mut().fill(pending, &owned);
                owned
            }
            RememberSlot::Detached => Owned::new(init()),
        }
    }

    pub fn current_recompose_scope(&self) -> Option<RecomposeScope> {
        self.inner.scope_stack.borrow().last().cloned()
    }

    pub fn register_side_effect(&self, effect: impl FnOnce() + 'static) {
        self.inner.side_effects.borrow_mut().push(Box::new(effect));
    }

    pub(crate) fn read_local(&self, key: usize) -> Option<Rc<dyn Any>> {
        locals::lookup(&self.inner.locals.borrow(), key)
    }

    pub(crate) fn push_locals(&self, provided: Vec<ProvidedValue>) -> LocalChain {
        let mut locals = self.inner.locals.borrow_mut();
        let previous = locals.clone();
        let mut chain = previous.clone();
        for value in provided {
            chain = value.push_onto(chain);
        }
        *locals = chain;
        previous
    }

    pub(crate) fn restore_locals(&self, previous: LocalChain) {
        *self.inner.locals.borrow_mut() = previous;
    }

    /// Close the frame the composer was created over, trimming whatever the
    /// pass did not revisit, and hand back the pass output.
    pub(crate) fn finish_root(&self) -> PassOutput {
        self.inner.slots.borrow_mut().end_group();
        self.finish()
    }

    pub(crate) fn finish(&self) -> PassOutput {
        PassOutput {
            discarded: self.inner.slots.borrow_mut().take_discarded(),
            side_effects: std::mem::take(&mut *self.inner.side_effects.borrow_mut()),
        }
    }
}
