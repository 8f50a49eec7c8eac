use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::locals::LocalChain;
use crate::runtime::RuntimeHandle;
use crate::slot_table::GroupRef;

pub(crate) type ScopeId = usize;

static NEXT_SCOPE_ID: AtomicUsize = AtomicUsize::new(1);

fn next_scope_id() -> ScopeId {
    NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed)
}

pub type RecomposeBody = Rc<dyn Fn()>;

pub(crate) struct RecomposeScopeInner {
    id: ScopeId,
    runtime: RuntimeHandle,
    depth: usize,
    invalid: Cell<bool>,
    active: Cell<bool>,
    composing: Cell<bool>,
    pending_recompose: Cell<bool>,
    group: RefCell<Weak<RefCell<crate::slot_table::GroupData>>>,
    locals: RefCell<LocalChain>,
    body: RefCell<Option<RecomposeBody>>,
}

/// Handle to a restartable group. Invalidating it re-runs the group's body on
/// the next recomposition pass without touching its parent.
#[derive(Clone)]
pub struct RecomposeScope {
    pub(crate) inner: Rc<RecomposeScopeInner>,
}

impl RecomposeScope {
    pub(crate) fn new(runtime: RuntimeHandle, depth: usize) -> Self {
        Self {
            inner: Rc::new(RecomposeScopeInner {
                id: next_scope_id(),
                runtime,
                depth,
                invalid: Cell::new(false),
                active: Cell::new(true),
                composing: Cell::new(false),
                pending_recompose: Cell::new(false),
                group: RefCell::new(Weak::new()),
                locals: RefCell::new(None),
                body: RefCell::new(None),
            }),
        }
    }

    pub(crate) fn id(&self) -> ScopeId {
        self.inner.id
    }

    pub(crate) fn depth(&self) -> usize {
        self.inner.depth
    }

    pub fn is_invalid(&self) -> bool {
        self.inner.invalid.get()
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Schedule this scope for recomposition.
    pub fn invalidate(&self) {
        if !self.inner.active.get() {
            return;
        }
        if self.inner.composing.get() {
            self.inner.pending_recompose.set(true);
            return;
        }
        if !self.inner.invalid.replace(true) {
            self.inner
                .runtime
                .register_invalid_scope(self.inner.id, Rc::downgrade(&self.inner));
        }
    }

    pub fn downgrade(&self) -> WeakRecomposeScope {
        WeakRecomposeScope(Rc::downgrade(&self.inner))
    }

    pub(crate) fn begin_compose(&self, group: &GroupRef, locals: LocalChain, body: RecomposeBody) {
        self.inner.composing.set(true);
        *self.inner.group.borrow_mut() = Rc::downgrade(group);
        *self.inner.locals.borrow_mut() = locals;
        *self.inner.body.borrow_mut() = Some(body);
    }

    pub(crate) fn end_compose(&self) {
        self.inner.composing.set(false);
        if self.inner.invalid.replace(false) {
            self.inner.runtime.mark_scope_recomposed(self.inner.id);
        }
        if self.inner.pending_recompose.replace(false) {
            self.invalidate();
        }
    }

    pub(crate) fn group(&self) -> Option<GroupRef> {
        self.inner.group.borrow().upgrade()
    }

    pub(crate) fn locals(&self) -> LocalChain {
        self.inner.locals.borrow().clone()
    }

    pub(crate) fn body(&self) -> Option<RecomposeBody> {
        self.inner.body.borrow().clone()
    }

    /// Called when the owning group leaves the composition.
    pub(crate) fn deactivate(&self) {
        if !self.inner.active.replace(false) {
            return;
        }
        self.inner.pending_recompose.set(false);
        if self.inner.invalid.replace(false) {
            self.inner.runtime.mark_scope_recomposed(self.inner.id);
        }
        self.inner.body.borrow_mut().take();
    }
}

/// Weak counterpart of [`RecomposeScope`], handed to code outside the
/// composition that needs to force a group to re-render.
#[derive(Clone)]
pub struct WeakRecomposeScope(Weak<RecomposeScopeInner>);

impl WeakRecomposeScope {
    pub fn invalidate(&self) {
        if let Some(inner) = self.0.upgrade() {
            RecomposeScope { inner }.invalidate();
        }
    }

    pub fn upgrade(&self) -> Option<RecomposeScope> {
        self.0.upgrade().map(|inner| RecomposeScope { inner })
    }
}
