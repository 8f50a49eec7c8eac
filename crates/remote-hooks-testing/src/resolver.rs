use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::FutureExt;
use remote_hooks::{HookResolver, LoadError, ModuleRequest, RemoteHook, ResolveFuture};

type PendingLoad = (ModuleRequest, oneshot::Sender<Result<RemoteHook, LoadError>>);

#[derive(Default)]
struct DeferredState {
    pending: Vec<PendingLoad>,
    requested: Vec<ModuleRequest>,
}

/// Resolver whose loads stay pending until the test completes them.
///
/// Clones share the same queue, so a test keeps one clone and hands the
/// other to the provider.
#[derive(Clone, Default)]
pub struct DeferredResolver {
    state: Rc<RefCell<DeferredState>>,
}

impl DeferredResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads that have not been completed yet, oldest first.
    pub fn pending(&self) -> Vec<ModuleRequest> {
        self.state
            .borrow()
            .pending
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    /// Every request seen so far, including completed ones.
    pub fn requested(&self) -> Vec<ModuleRequest> {
        self.state.borrow().requested.clone()
    }

    /// Complete the oldest pending load for `request`. Returns `false` when
    /// there is none or its future was already dropped.
    pub fn complete(&self, request: &ModuleRequest, result: Result<RemoteHook, LoadError>) -> bool {
        let sender = {
            let mut state = self.state.borrow_mut();
            let Some(index) = state
                .pending
                .iter()
                .position(|(pending, _)| pending == request)
            else {
                return false;
            };
            state.pending.remove(index).1
        };
        sender.send(result).is_ok()
    }

    pub fn succeed(&self, request: &ModuleRequest, hook: RemoteHook) -> bool {
        self.complete(request, Ok(hook))
    }

    pub fn fail(&self, request: &ModuleRequest, error: LoadError) -> bool {
        self.complete(request, Err(error))
    }
}

impl HookResolver for DeferredResolver {
    fn resolve(&self, request: &ModuleRequest) -> ResolveFuture {
        let (sender, receiver) = oneshot::channel();
        {
            let mut state = self.state.borrow_mut();
            state.pending.push((request.clone(), sender));
            state.requested.push(request.clone());
        }
        receiver
            .map(|result| result.unwrap_or_else(|_| Err(LoadError::message("load abandoned"))))
            .boxed_local()
    }
}
