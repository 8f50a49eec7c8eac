use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use remote_hooks_runtime::{mutableStateOf, MutableState};

use crate::args::{ArgChannel, ArgListener, ArgListenerHandle};
use crate::hook::{HookResolver, RemoteHook};
use crate::registry::{ConsumerId, HookState, Notify, RegistryStore, StatePatch};
use crate::value::HookArgs;

struct RemoteHooksInner {
    resolver: Rc<dyn HookResolver>,
    registry: RegistryStore,
    args: ArgChannel,
    available: MutableState<IndexMap<ConsumerId, RemoteHook>>,
}

/// The operations a provider hands to its descendants.
///
/// Owns the registry store and argument channel, and the set of loaded hooks
/// as observable state so the provider re-renders its execution units when
/// it changes. [`RemoteHooks::detached`] is the inert service seen outside
/// any provider: every write is dropped and every read is empty.
#[derive(Clone, Default)]
pub struct RemoteHooks {
    inner: Option<Rc<RemoteHooksInner>>,
}

/// Entry counts across the three stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveCounts {
    pub registry: usize,
    pub args: usize,
    pub available: usize,
}

impl LiveCounts {
    pub fn is_zero(&self) -> bool {
        *self == LiveCounts::default()
    }
}

impl RemoteHooks {
    /// Build a service resolving through `resolver`. Inside composition the
    /// set of loaded hooks is bound to the current runtime.
    pub fn new(resolver: Rc<dyn HookResolver>) -> Self {
        Self {
            inner: Some(Rc::new(RemoteHooksInner {
                resolver,
                registry: RegistryStore::new(),
                args: ArgChannel::new(),
                available: mutableStateOf(IndexMap::new()),
            })),
        }
    }

    pub fn detached() -> Self {
        Self { inner: None }
    }

    pub fn is_detached(&self) -> bool {
        self.inner.is_none()
    }

    pub fn ptr_eq(&self, other: &RemoteHooks) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub fn resolver(&self) -> Option<Rc<dyn HookResolver>> {
        self.inner.as_ref().map(|inner| Rc::clone(&inner.resolver))
    }

    /// Create a registry entry under a fresh id. `notify` is the only way the
    /// service re-renders the consumer.
    pub fn subscribe(&self, notify: Notify) -> Subscription {
        let Some(inner) = &self.inner else {
            return Subscription::detached();
        };
        let id = inner.registry.subscribe(notify);
        log::debug!("remote hook consumer {id} subscribed");
        Subscription {
            id,
            service: Rc::downgrade(inner),
            active: Cell::new(true),
        }
    }

    pub fn update_state(&self, id: ConsumerId, patch: StatePatch) {
        if let Some(inner) = &self.inner {
            if !inner.registry.update_state(id, patch) {
                log::trace!("dropped state update for unknown consumer {id}");
            }
        }
    }

    pub fn get_state(&self, id: ConsumerId) -> Option<HookState> {
        self.inner
            .as_ref()
            .and_then(|inner| inner.registry.get_state(id))
    }

    /// Make `hook` available for `id`, mounting its execution unit. Ignored
    /// when the consumer already unsubscribed.
    pub fn register_hook(&self, id: ConsumerId, hook: RemoteHook) {
        let Some(inner) = &self.inner else {
            return;
        };
        if !inner.registry.contains(id) {
            log::debug!("not registering hook for unsubscribed consumer {id}");
            return;
        }
        let unchanged = inner
            .available
            .with_untracked(|hooks| hooks.get(&id).is_some_and(|known| known.ptr_eq(&hook)));
        if unchanged {
            return;
        }
        log::debug!("registered remote hook for consumer {id}");
        inner.available.update(|hooks| {
            hooks.insert(id, hook);
        });
    }

    pub fn update_args(&self, id: ConsumerId, args: HookArgs) {
        let Some(inner) = &self.inner else {
            return;
        };
        if !inner.registry.contains(id) {
            log::trace!("dropped args for unknown consumer {id}");
            return;
        }
        inner.args.update_args(id, args);
    }

    pub fn subscribe_to_args(&self, id: ConsumerId, listener: ArgListener) -> ArgListenerHandle {
        match &self.inner {
            Some(inner) if inner.registry.contains(id) => {
                inner.args.subscribe_to_args(id, listener)
            }
            _ => ArgListenerHandle::detached(),
        }
    }

    /// Loaded hooks in registration order. Read inside a restartable group,
    /// this subscribes the group to later registrations and removals.
    pub fn available_hooks(&self) -> Vec<(ConsumerId, RemoteHook)> {
        self.inner.as_ref().map_or_else(Vec::new, |inner| {
            inner.available.with(|hooks| {
                hooks
                    .iter()
                    .map(|(id, hook)| (*id, hook.clone()))
                    .collect()
            })
        })
    }

    pub fn live_counts(&self) -> LiveCounts {
        self.inner
            .as_ref()
            .map_or_else(LiveCounts::default, |inner| LiveCounts {
                registry: inner.registry.len(),
                args: inner.args.len(),
                available: inner.available.with_untracked(IndexMap::len),
            })
    }
}

impl RemoteHooksInner {
    fn unsubscribe(&self, id: ConsumerId) {
        self.registry.remove(id);
        self.args.remove(id);
        let mounted = self.available.with_untracked(|hooks| hooks.contains_key(&id));
        if mounted {
            self.available.update(|hooks| {
                hooks.shift_remove(&id);
            });
        }
        log::debug!("remote hook consumer {id} unsubscribed");
    }
}

impl fmt::Debug for RemoteHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(_) => f
                .debug_struct("RemoteHooks")
                .field("live", &self.live_counts())
                .finish(),
            None => f.write_str("RemoteHooks(detached)"),
        }
    }
}

/// Result of [`RemoteHooks::subscribe`].
pub struct Subscription {
    id: ConsumerId,
    service: Weak<RemoteHooksInner>,
    active: Cell<bool>,
}

impl Subscription {
    fn detached() -> Self {
        Self {
            id: ConsumerId::empty(),
            service: Weak::new(),
            active: Cell::new(false),
        }
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Remove the registry entry, the loaded hook (unmounting its execution
    /// unit) and the argument subscription. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(service) = self.service.upgrade() {
            service.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::StaticResolver;
    use crate::value::Value;
    use std::cell::RefCell;

    fn service() -> RemoteHooks {
        RemoteHooks::new(Rc::new(StaticResolver::new()))
    }

    fn noop() -> Notify {
        Rc::new(|| {})
    }

    #[test]
    fn unsubscribe_clears_every_store() {
        let hooks = service();
        assert!(hooks.live_counts().is_zero());

        let subscription = hooks.subscribe(noop());
        let id = subscription.id();
        hooks.update_args(id, vec![Value::from(1)]);
        hooks.register_hook(id, RemoteHook::new(|_| Value::Null));
        assert_eq!(
            hooks.live_counts(),
            LiveCounts {
                registry: 1,
                args: 1,
                available: 1
            }
        );

        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(hooks.live_counts().is_zero());
    }

    #[test]
    fn stale_ids_never_create_entries() {
        let hooks = service();
        let subscription = hooks.subscribe(noop());
        let id = subscription.id();
        subscription.unsubscribe();

        hooks.update_state(id, StatePatch::new().loading(false));
        hooks.update_args(id, vec![Value::from(1)]);
        hooks.register_hook(id, RemoteHook::new(|_| Value::Null));
        let handle = hooks.subscribe_to_args(id, Rc::new(|_: &[Value]| Ok(())));
        assert!(!handle.is_active());
        assert!(hooks.live_counts().is_zero());
        assert_eq!(hooks.get_state(id), None);
    }

    #[test]
    fn detached_service_is_inert() {
        let hooks = RemoteHooks::detached();
        let notified = Rc::new(Cell::new(false));
        let subscription = {
            let notified = Rc::clone(&notified);
            hooks.subscribe(Rc::new(move || notified.set(true)))
        };
        assert!(subscription.id().is_empty());
        hooks.update_state(subscription.id(), StatePatch::new().loading(false));
        assert_eq!(hooks.get_state(subscription.id()), None);
        assert!(hooks.available_hooks().is_empty());
        assert!(hooks.resolver().is_none());
        assert!(!notified.get());
        subscription.unsubscribe();
    }

    #[test]
    fn consumers_are_isolated_from_each_other() {
        let hooks = service();
        let a = hooks.subscribe(noop());
        let b = hooks.subscribe(noop());
        let received: Rc<RefCell<Vec<HookArgs>>> = Rc::default();
        let _handle = {
            let received = Rc::clone(&received);
            hooks.subscribe_to_args(
                a.id(),
                Rc::new(move |args: &[Value]| {
                    received.borrow_mut().push(args.to_vec());
                    Ok(())
                }),
            )
        };

        hooks.update_args(b.id(), vec![Value::from("for b")]);
        hooks.update_state(b.id(), StatePatch::new().hook_result(Value::from(2)));
        assert!(received.borrow().is_empty());
        assert_eq!(
            hooks.get_state(a.id()).and_then(|state| state.hook_result),
            None
        );

        hooks.update_args(a.id(), vec![Value::from("for a")]);
        assert_eq!(*received.borrow(), vec![vec![Value::from("for a")]]);
    }

    #[test]
    fn re_registering_the_same_hook_keeps_order() {
        let hooks = service();
        let a = hooks.subscribe(noop());
        let b = hooks.subscribe(noop());
        let hook_a = RemoteHook::new(|_| Value::from(1));
        hooks.register_hook(a.id(), hook_a.clone());
        hooks.register_hook(b.id(), RemoteHook::new(|_| Value::from(2)));
        hooks.register_hook(a.id(), hook_a);

        let ids: Vec<ConsumerId> = hooks.available_hooks().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a.id(), b.id()]);
    }
}
