use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::scope::{ScopeId, WeakRecomposeScope};

struct StateCell<T> {
    value: RefCell<T>,
    readers: RefCell<Vec<(ScopeId, WeakRecomposeScope)>>,
}

/// Observable cell. Reading it inside a restartable group subscribes that
/// group; writing it invalidates every subscribed group that is still alive.
///
/// Clones share the cell and compare equal.
pub struct MutableState<T> {
    cell: Rc<StateCell<T>>,
}

impl<T> Clone for MutableState<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T> PartialEq for MutableState<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T> Eq for MutableState<T> {}

impl<T> MutableState<T> {
    pub fn new(value: T) -> Self {
        Self {
            cell: Rc::new(StateCell {
                value: RefCell::new(value),
                readers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Read the value and subscribe the scope currently composing, if any.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        if let Some(scope) = crate::current_recompose_scope() {
            let id = scope.id();
            let mut readers = self.cell.readers.borrow_mut();
            readers.retain(|(_, reader)| reader.upgrade().is_some());
            if !readers.iter().any(|(reader, _)| *reader == id) {
                readers.push((id, scope.downgrade()));
            }
        }
        f(&self.cell.value.borrow())
    }

    /// Read without subscribing the current scope.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.cell.value.borrow())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = f(&mut self.cell.value.borrow_mut());
        self.invalidate_readers();
        result
    }

    pub fn set(&self, value: T) {
        *self.cell.value.borrow_mut() = value;
        self.invalidate_readers();
    }

    fn invalidate_readers(&self) {
        // Collected first: invalidation may re-enter and read this cell.
        let readers: Vec<WeakRecomposeScope> = {
            let mut readers = self.cell.readers.borrow_mut();
            readers.retain(|(_, reader)| reader.upgrade().is_some());
            readers.iter().map(|(_, reader)| reader.clone()).collect()
        };
        for reader in readers {
            reader.invalidate();
        }
    }
}

impl<T: Clone> MutableState<T> {
    pub fn value(&self) -> T {
        self.with(T::clone)
    }
}

impl<T: fmt::Debug> fmt::Debug for MutableState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MutableState")
            .field(&*self.cell.value.borrow())
            .finish()
    }
}
