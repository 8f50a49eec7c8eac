//! Registry store: per-consumer hook state plus the callback that re-renders
//! the consumer.
//!
//! Writes never re-render anything by themselves; the entry's `notify` is
//! what forces the owning consumer to read the new state.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use uuid::Uuid;

use crate::error::LoadError;
use crate::value::Value;

/// Identifies one live `useRemoteHook` call site instance. Correlates the
/// registry entry, the argument subscription and the loaded hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(Uuid);

impl ConsumerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Id handed out outside a provider; never stored anywhere.
    pub const fn empty() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for ConsumerId {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Last known state of one consumer. Fields stay `None` until first written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookState {
    pub loading: Option<bool>,
    pub error: Option<LoadError>,
    pub hook_result: Option<Value>,
}

impl HookState {
    /// Shallow merge: every field present in `patch` overwrites, the rest
    /// keep their value.
    pub fn apply(&mut self, patch: StatePatch) {
        if let Some(loading) = patch.loading {
            self.loading = Some(loading);
        }
        if let Some(error) = patch.error {
            self.error = error;
        }
        if let Some(hook_result) = patch.hook_result {
            self.hook_result = Some(hook_result);
        }
    }
}

/// Partial update for a [`HookState`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub loading: Option<bool>,
    /// `Some(None)` clears the error.
    pub error: Option<Option<LoadError>>,
    pub hook_result: Option<Value>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loading(mut self, loading: bool) -> Self {
        self.loading = Some(loading);
        self
    }

    pub fn error(mut self, error: Option<LoadError>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn hook_result(mut self, hook_result: Value) -> Self {
        self.hook_result = Some(hook_result);
        self
    }
}

pub type Notify = Rc<dyn Fn()>;

struct RegistryEntry {
    state: HookState,
    notify: Notify,
}

/// Tree-scoped table of [`HookState`]s keyed by [`ConsumerId`].
#[derive(Default)]
pub struct RegistryStore {
    entries: RefCell<HashMap<ConsumerId, RegistryEntry>>,
}

impl RegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty entry under a fresh id.
    pub fn subscribe(&self, notify: Notify) -> ConsumerId {
        let id = ConsumerId::new();
        self.entries.borrow_mut().insert(
            id,
            RegistryEntry {
                state: HookState::default(),
                notify,
            },
        );
        id
    }

    /// Merge `patch` into the entry and notify its consumer. Returns `false`
    /// and does nothing when the entry is gone.
    pub fn update_state(&self, id: ConsumerId, patch: StatePatch) -> bool {
        let notify = {
            let mut entries = self.entries.borrow_mut();
            let Some(entry) = entries.get_mut(&id) else {
                return false;
            };
            entry.state.apply(patch);
            Rc::clone(&entry.notify)
        };
        // Outside the borrow: the consumer may read its state right away.
        notify();
        true
    }

    pub fn get_state(&self, id: ConsumerId) -> Option<HookState> {
        self.entries.borrow().get(&id).map(|entry| entry.state.clone())
    }

    pub fn contains(&self, id: ConsumerId) -> bool {
        self.entries.borrow().contains_key(&id)
    }

    pub fn remove(&self, id: ConsumerId) -> bool {
        self.entries.borrow_mut().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
