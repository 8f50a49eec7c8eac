//! Argument channel: the latest argument list per consumer and the listeners
//! (execution units) that want it.
//!
//! Updates go straight to the listeners, so a consumer can change its hook's
//! inputs without re-rendering the provider or its siblings.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use hashbrown::HashMap;

use crate::error::BoxError;
use crate::registry::ConsumerId;
use crate::value::{HookArgs, Value};

pub type ArgListener = Rc<dyn Fn(&[Value]) -> Result<(), BoxError>>;

type ListenerId = u64;

#[derive(Default)]
struct ArgSubscription {
    args: HookArgs,
    listeners: Vec<(ListenerId, ArgListener)>,
}

#[derive(Default)]
struct ArgChannelState {
    subscriptions: HashMap<ConsumerId, ArgSubscription>,
    next_listener: ListenerId,
}

#[derive(Clone, Default)]
pub struct ArgChannel {
    state: Rc<RefCell<ArgChannelState>>,
}

impl ArgChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored arguments for `id`, creating the subscription if
    /// needed, then hand them to every listener in registration order.
    /// A listener unsubscribed by an earlier one in the same broadcast is
    /// skipped.
    pub fn update_args(&self, id: ConsumerId, args: HookArgs) {
        let listeners: Vec<(ListenerId, ArgListener)> = {
            let mut state = self.state.borrow_mut();
            let subscription = state.subscriptions.entry(id).or_default();
            subscription.args = args.clone();
            subscription.listeners.clone()
        };
        for (listener_id, listener) in listeners {
            if self.is_registered(id, listener_id) {
                deliver(id, &listener, &args);
            }
        }
    }

    fn is_registered(&self, id: ConsumerId, listener: ListenerId) -> bool {
        self.state
            .borrow()
            .subscriptions
            .get(&id)
            .is_some_and(|subscription| {
                subscription
                    .listeners
                    .iter()
                    .any(|(registered, _)| *registered == listener)
            })
    }

    /// Register `listener` for `id`. When arguments were already published
    /// and are non-empty, the listener receives them before this returns.
    pub fn subscribe_to_args(&self, id: ConsumerId, listener: ArgListener) -> ArgListenerHandle {
        let (listener_id, catch_up) = {
            let mut state = self.state.borrow_mut();
            let listener_id = state.next_listener;
            state.next_listener += 1;
            let subscription = state.subscriptions.entry(id).or_default();
            subscription
                .listeners
                .push((listener_id, Rc::clone(&listener)));
            let catch_up = (!subscription.args.is_empty()).then(|| subscription.args.clone());
            (listener_id, catch_up)
        };
        if let Some(args) = catch_up {
            deliver(id, &listener, &args);
        }
        ArgListenerHandle {
            channel: Rc::downgrade(&self.state),
            id,
            listener: listener_id,
            active: Cell::new(true),
        }
    }

    /// Latest published arguments, if any.
    pub fn args(&self, id: ConsumerId) -> Option<HookArgs> {
        self.state
            .borrow()
            .subscriptions
            .get(&id)
            .map(|subscription| subscription.args.clone())
    }

    pub fn listener_count(&self, id: ConsumerId) -> usize {
        self.state
            .borrow()
            .subscriptions
            .get(&id)
            .map_or(0, |subscription| subscription.listeners.len())
    }

    /// Drop the subscription for `id` together with its listeners.
    pub fn remove(&self, id: ConsumerId) -> bool {
        self.state.borrow_mut().subscriptions.remove(&id).is_some()
    }

    pub fn contains(&self, id: ConsumerId) -> bool {
        self.state.borrow().subscriptions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().subscriptions.is_empty()
    }
}

fn deliver(id: ConsumerId, listener: &ArgListener, args: &[Value]) {
    if let Err(err) = listener(args) {
        log::warn!("argument listener for consumer {id} failed: {err}");
    }
}

/// Registration returned by [`ArgChannel::subscribe_to_args`].
pub struct ArgListenerHandle {
    channel: Weak<RefCell<ArgChannelState>>,
    id: ConsumerId,
    listener: ListenerId,
    active: Cell<bool>,
}

impl ArgListenerHandle {
    /// Handle that was never registered anywhere.
    pub fn detached() -> Self {
        Self {
            channel: Weak::new(),
            id: ConsumerId::empty(),
            listener: 0,
            active: Cell::new(false),
        }
    }

    /// Remove the listener. Calling it again, or after the subscription was
    /// removed, does nothing.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        let Some(channel) = self.channel.upgrade() else {
            return;
        };
        let mut state = channel.borrow_mut();
        if let Some(subscription) = state.subscriptions.get_mut(&self.id) {
            subscription
                .listeners
                .retain(|(listener, _)| *listener != self.listener);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.get() && self.channel.strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_listener() -> (ArgListener, Rc<RefCell<Vec<HookArgs>>>) {
        let calls: Rc<RefCell<Vec<HookArgs>>> = Rc::default();
        let listener: ArgListener = {
            let calls = Rc::clone(&calls);
            Rc::new(move |args: &[Value]| {
                calls.borrow_mut().push(args.to_vec());
                Ok(())
            })
        };
        (listener, calls)
    }

    #[test]
    fn catch_up_delivers_existing_args_once() {
        let channel = ArgChannel::new();
        let id = ConsumerId::new();
        channel.update_args(id, vec![Value::from(1)]);

        let (listener, calls) = recording_listener();
        let _handle = channel.subscribe_to_args(id, listener);
        assert_eq!(*calls.borrow(), vec![vec![Value::from(1)]]);
    }

    #[test]
    fn empty_args_are_not_replayed() {
        let channel = ArgChannel::new();
        let id = ConsumerId::new();
        channel.update_args(id, Vec::new());

        let (listener, calls) = recording_listener();
        let _handle = channel.subscribe_to_args(id, listener);
        assert!(calls.borrow().is_empty());
        assert_eq!(channel.args(id), Some(Vec::new()));
    }

    #[test]
    fn broadcast_reaches_listeners_in_order_despite_failures() {
        let channel = ArgChannel::new();
        let id = ConsumerId::new();
        let order: Rc<RefCell<Vec<&'static str>>> = Rc::default();

        let failing: ArgListener = {
            let order = Rc::clone(&order);
            Rc::new(move |_: &[Value]| {
                order.borrow_mut().push("failing");
                Err("listener exploded".into())
            })
        };
        let healthy: ArgListener = {
            let order = Rc::clone(&order);
            Rc::new(move |_: &[Value]| {
                order.borrow_mut().push("healthy");
                Ok(())
            })
        };
        let _a = channel.subscribe_to_args(id, failing);
        let _b = channel.subscribe_to_args(id, healthy);

        channel.update_args(id, vec![Value::from("x")]);
        assert_eq!(*order.borrow(), vec!["failing", "healthy"]);
    }

    #[test]
    fn unsubscribe_is_idempotent_and_scoped_to_one_listener() {
        let channel = ArgChannel::new();
        let id = ConsumerId::new();
        let (first, first_calls) = recording_listener();
        let (second, second_calls) = recording_listener();
        let first_handle = channel.subscribe_to_args(id, first);
        let _second_handle = channel.subscribe_to_args(id, second);

        first_handle.unsubscribe();
        first_handle.unsubscribe();
        assert!(!first_handle.is_active());
        assert_eq!(channel.listener_count(id), 1);

        channel.update_args(id, vec![Value::from(2)]);
        assert!(first_calls.borrow().is_empty());
        assert_eq!(second_calls.borrow().len(), 1);
    }

    #[test]
    fn listener_removed_during_broadcast_is_skipped() {
        let channel = ArgChannel::new();
        let id = ConsumerId::new();
        let second_handle: Rc<RefCell<Option<ArgListenerHandle>>> = Rc::default();
        let removing: ArgListener = {
            let second_handle = Rc::clone(&second_handle);
            Rc::new(move |_: &[Value]| {
                if let Some(handle) = second_handle.borrow().as_ref() {
                    handle.unsubscribe();
                }
                Ok(())
            })
        };
        let (second, second_calls) = recording_listener();
        let _first = channel.subscribe_to_args(id, removing);
        *second_handle.borrow_mut() = Some(channel.subscribe_to_args(id, second));

        channel.update_args(id, vec![Value::from(1)]);
        assert!(second_calls.borrow().is_empty());
        assert_eq!(channel.listener_count(id), 1);
    }

    #[test]
    fn listeners_may_reenter_the_channel() {
        let channel = ArgChannel::new();
        let id = ConsumerId::new();
        let other = ConsumerId::new();
        let forwarding: ArgListener = {
            let channel = channel.clone();
            Rc::new(move |args: &[Value]| {
                channel.update_args(other, args.to_vec());
                Ok(())
            })
        };
        let _handle = channel.subscribe_to_args(id, forwarding);
        channel.update_args(id, vec![Value::from(5)]);
        assert_eq!(channel.args(other), Some(vec![Value::from(5)]));
    }

    #[test]
    fn remove_drops_args_and_listeners() {
        let channel = ArgChannel::new();
        let id = ConsumerId::new();
        let (listener, _) = recording_listener();
        let handle = channel.subscribe_to_args(id, listener);
        channel.update_args(id, vec![Value::Null]);
        assert!(channel.remove(id));
        assert!(channel.is_empty());
        handle.unsubscribe();
        assert!(!channel.contains(id));
    }
}
