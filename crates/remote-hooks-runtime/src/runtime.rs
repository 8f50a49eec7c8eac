use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures_task::ArcWake;

use crate::collections::map::{HashMap, HashSet};
use crate::platform::RuntimeScheduler;
use crate::scope::{RecomposeScopeInner, ScopeId};

pub type TaskId = u64;

type LocalTask = Pin<Box<dyn Future<Output = ()> + 'static>>;

/// Ids of tasks whose wakers fired. Shared with wakers, which may live on
/// other threads.
#[derive(Default)]
struct ReadyQueue {
    ids: Mutex<VecDeque<TaskId>>,
}

impl ReadyQueue {
    fn push(&self, id: TaskId) {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        if !ids.contains(&id) {
            ids.push_back(id);
        }
    }

    fn take(&self) -> Vec<TaskId> {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        ids.drain(..).collect()
    }

    fn is_empty(&self) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

struct TaskWaker {
    id: TaskId,
    ready: Arc<ReadyQueue>,
    scheduler: Arc<dyn RuntimeScheduler>,
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.ready.push(arc_self.id);
        arc_self.scheduler.schedule_frame();
    }
}

pub(crate) struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    needs_frame: Cell<bool>,
    invalid_scopes: RefCell<HashSet<ScopeId>>,
    scope_queue: RefCell<Vec<(ScopeId, Weak<RecomposeScopeInner>)>>,
    tasks: RefCell<HashMap<TaskId, LocalTask>>,
    ready: Arc<ReadyQueue>,
    next_task_id: Cell<TaskId>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            scheduler,
            needs_frame: Cell::new(false),
            invalid_scopes: RefCell::new(HashSet::new()),
            scope_queue: RefCell::new(Vec::new()),
            tasks: RefCell::new(HashMap::new()),
            ready: Arc::new(ReadyQueue::default()),
            next_task_id: Cell::new(1),
        }
    }

    fn schedule(&self) {
        self.needs_frame.set(true);
        self.scheduler.schedule_frame();
    }

    fn register_invalid_scope(&self, id: ScopeId, scope: Weak<RecomposeScopeInner>) {
        let inserted = self.invalid_scopes.borrow_mut().insert(id);
        if inserted {
            self.scope_queue.borrow_mut().push((id, scope));
            self.schedule();
        }
    }

    fn mark_scope_recomposed(&self, id: ScopeId) {
        self.invalid_scopes.borrow_mut().remove(&id);
    }

    fn take_invalidated_scopes(&self) -> Vec<(ScopeId, Weak<RecomposeScopeInner>)> {
        self.scope_queue.borrow_mut().drain(..).collect()
    }

    fn has_invalid_scopes(&self) -> bool {
        !self.invalid_scopes.borrow().is_empty()
    }

    fn spawn_local(&self, future: LocalTask) -> TaskId {
        let id = self.next_task_id.get();
        self.next_task_id.set(id + 1);
        self.tasks.borrow_mut().insert(id, future);
        self.ready.push(id);
        self.schedule();
        id
    }

    fn drain_tasks(&self) -> usize {
        let mut polled = 0;
        loop {
            let ready = self.ready.take();
            if ready.is_empty() {
                break;
            }
            for id in ready {
                // Taken out of the map so the task may spawn or wake others
                // while it is being polled.
                let Some(mut task) = self.tasks.borrow_mut().remove(&id) else {
                    continue;
                };
                let waker = futures_task::waker(Arc::new(TaskWaker {
                    id,
                    ready: Arc::clone(&self.ready),
                    scheduler: Arc::clone(&self.scheduler),
                }));
                let mut cx = Context::from_waker(&waker);
                polled += 1;
                match task.as_mut().poll(&mut cx) {
                    Poll::Ready(()) => log::trace!("task {id} completed"),
                    Poll::Pending => {
                        self.tasks.borrow_mut().insert(id, task);
                    }
                }
            }
        }
        polled
    }

    fn has_ready_tasks(&self) -> bool {
        !self.ready.is_empty()
    }

    fn pending_task_count(&self) -> usize {
        self.tasks.borrow().len()
    }
}

/// Owner of the per-composition scheduling state.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn needs_frame(&self) -> bool {
        self.inner.needs_frame.get()
    }

    pub fn set_needs_frame(&self, value: bool) {
        self.inner.needs_frame.set(value);
    }
}

#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_frame(&self) {}
}

/// Non-owning handle to a [`Runtime`]. Every operation is a no-op once the
/// runtime is gone.
#[derive(Clone)]
pub struct RuntimeHandle(pub(crate) Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn schedule(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.schedule();
        }
    }

    /// Queue a future on the runtime's thread. It is first polled by the next
    /// [`drain_tasks`](Self::drain_tasks); dropping the runtime drops it.
    pub fn spawn_local(&self, future: impl Future<Output = ()> + 'static) -> Option<TaskId> {
        self.0
            .upgrade()
            .map(|inner| inner.spawn_local(Box::pin(future)))
    }

    /// Poll every task whose waker fired until none are ready. Returns the
    /// number of polls performed.
    pub fn drain_tasks(&self) -> usize {
        self.0
            .upgrade()
            .map(|inner| inner.drain_tasks())
            .unwrap_or(0)
    }

    pub fn has_ready_tasks(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_ready_tasks())
            .unwrap_or(false)
    }

    pub fn pending_task_count(&self) -> usize {
        self.0
            .upgrade()
            .map(|inner| inner.pending_task_count())
            .unwrap_or(0)
    }

    pub fn set_needs_frame(&self, value: bool) {
        if let Some(inner) = self.0.upgrade() {
            inner.needs_frame.set(value);
        }
    }

    pub(crate) fn register_invalid_scope(&self, id: ScopeId, scope: Weak<RecomposeScopeInner>) {
        if let Some(inner) = self.0.upgrade() {
            inner.register_invalid_scope(id, scope);
        }
    }

    pub(crate) fn mark_scope_recomposed(&self, id: ScopeId) {
        if let Some(inner) = self.0.upgrade() {
            inner.mark_scope_recomposed(id);
        }
    }

    pub(crate) fn take_invalidated_scopes(&self) -> Vec<(ScopeId, Weak<RecomposeScopeInner>)> {
        self.0
            .upgrade()
            .map(|inner| inner.take_invalidated_scopes())
            .unwrap_or_default()
    }

    pub fn has_invalid_scopes(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_invalid_scopes())
            .unwrap_or(false)
    }
}
