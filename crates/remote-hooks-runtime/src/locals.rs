use std::any::Any;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::composer::with_current_composer;

type LocalKey = usize;

static NEXT_LOCAL_KEY: AtomicUsize = AtomicUsize::new(1);

fn next_local_key() -> LocalKey {
    NEXT_LOCAL_KEY.fetch_add(1, Ordering::Relaxed)
}

/// Immutable linked list of provided values, innermost first. Restartable
/// scopes keep the chain they were composed under so they can recompose on
/// their own and still see their ancestors' providers.
pub(crate) type LocalChain = Option<Rc<LocalLink>>;

pub(crate) struct LocalLink {
    key: LocalKey,
    value: Rc<dyn Any>,
    parent: LocalChain,
}

pub(crate) fn lookup(chain: &LocalChain, key: LocalKey) -> Option<Rc<dyn Any>> {
    let mut link = chain.as_ref();
    while let Some(current) = link {
        if current.key == key {
            return Some(Rc::clone(&current.value));
        }
        link = current.parent.as_ref();
    }
    None
}

pub struct ProvidedValue {
    key: LocalKey,
    value: Rc<dyn Any>,
}

impl ProvidedValue {
    pub(crate) fn push_onto(self, parent: LocalChain) -> LocalChain {
        Some(Rc::new(LocalLink {
            key: self.key,
            value: self.value,
            parent,
        }))
    }
}

/// A composition local whose reads are not tracked.
///
/// The provided value is expected to stay the same for the lifetime of the
/// providing group (services, configuration). Changing it does not
/// invalidate readers; only groups that recompose for other reasons observe
/// the new value.
#[derive(Clone)]
pub struct StaticCompositionLocal<T: Clone + 'static> {
    key: LocalKey,
    default: Rc<dyn Fn() -> T>,
}

impl<T: Clone + 'static> PartialEq for StaticCompositionLocal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T: Clone + 'static> Eq for StaticCompositionLocal<T> {}

impl<T: Clone + 'static> StaticCompositionLocal<T> {
    pub fn provides(&self, value: T) -> ProvidedValue {
        ProvidedValue {
            key: self.key,
            value: Rc::new(value),
        }
    }

    /// The innermost provided value, or the default outside any provider or
    /// outside composition.
    pub fn current(&self) -> T {
        with_current_composer(|composer| composer.read_local(self.key))
            .flatten()
            .and_then(|value| value.downcast_ref::<T>().cloned())
            .unwrap_or_else(|| self.default_value())
    }

    pub fn default_value(&self) -> T {
        (self.default)()
    }
}

#[allow(non_snake_case)]
pub fn staticCompositionLocalOf<T: Clone + 'static>(
    default: impl Fn() -> T + 'static,
) -> StaticCompositionLocal<T> {
    StaticCompositionLocal {
        key: next_local_key(),
        default: Rc::new(default),
    }
}

#[allow(non_snake_case)]
pub fn CompositionLocalProvider<R>(
    values: impl IntoIterator<Item = ProvidedValue>,
    content: impl FnOnce() -> R,
) -> R {
    let provided: Vec<ProvidedValue> = values.into_iter().collect();
    match with_current_composer(|composer| composer.push_locals(provided)) {
        Some(previous) => {
            let result = content();
            with_current_composer(|composer| composer.restore_locals(previous));
            result
        }
        None => content(),
    }
}
