use std::cell::Cell;
use std::panic::Location;
use std::rc::Rc;

use remote_hooks_runtime::{
    current_recompose_scope, current_runtime_handle, location_key, remember, useState,
    with_group, DisposableEffect, DisposableEffectScope, SideEffect,
};

use crate::error::LoadError;
use crate::hook::{ModuleRequest, DEFAULT_IMPORT_NAME};
use crate::provider::LocalRemoteHooks;
use crate::registry::{ConsumerId, Notify, StatePatch};
use crate::value::{args_shallow_eq, HookArgs, Value};

/// What [`useRemoteHook`] should load and the arguments to run it with.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteHookOptions {
    pub scope: String,
    pub module: String,
    pub import_name: Option<String>,
    pub args: HookArgs,
}

impl RemoteHookOptions {
    pub fn new(scope: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            module: module.into(),
            import_name: None,
            args: HookArgs::new(),
        }
    }

    pub fn import_name(mut self, import_name: impl Into<String>) -> Self {
        self.import_name = Some(import_name.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = Value>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    pub fn request(&self) -> ModuleRequest {
        ModuleRequest::new(self.scope.clone(), self.module.clone()).with_import(
            self.import_name
                .clone()
                .unwrap_or_else(|| DEFAULT_IMPORT_NAME.to_string()),
        )
    }
}

/// Live view of a remote hook, read from the provider on every render.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteHookState {
    pub id: ConsumerId,
    /// `true` until the load settles, and whenever no state is known.
    pub loading: bool,
    pub error: Option<LoadError>,
    pub hook_result: Option<Value>,
}

/// Load a remote hook through the nearest `RemoteHookProvider` and run it
/// with `options.args`.
///
/// Call it from a `#[composable]` function: result changes re-render that
/// function. A new `(scope, module, import_name)` drops the previous load and
/// starts over; changing only the arguments reaches the running hook without
/// re-rendering the provider.
#[allow(non_snake_case)]
#[track_caller]
pub fn useRemoteHook(options: RemoteHookOptions) -> RemoteHookState {
    let location = Location::caller();
    let key = location_key(location.file(), location.line(), location.column());
    with_group(key, move || use_remote_hook(options))
}

fn use_remote_hook(options: RemoteHookOptions) -> RemoteHookState {
    let request = options.request();
    let args = options.args;
    let service = LocalRemoteHooks().current();
    let consumer_id = useState(ConsumerId::empty);

    // Read by the load once it settles, so it forwards the newest args.
    let latest_args = remember(HookArgs::new);
    latest_args.replace(args.clone());

    let notify: Notify = match current_recompose_scope() {
        Some(scope) => {
            let scope = scope.downgrade();
            Rc::new(move || scope.invalidate())
        }
        None => {
            log::warn!("useRemoteHook({request}) has no restartable scope to re-render");
            Rc::new(|| {})
        }
    };
    let runtime = current_runtime_handle();

    {
        let service = service.clone();
        let consumer_id = consumer_id.clone();
        let latest_args = latest_args.clone();
        let request = request.clone();
        DisposableEffect!(request.clone(), move |scope: DisposableEffectScope| {
            let subscription = service.subscribe(notify);
            let id = subscription.id();
            service.update_state(id, StatePatch::new().loading(true).error(None));
            consumer_id.set(id);

            let mounted = Rc::new(Cell::new(true));
            match service.resolver() {
                Some(resolver) => {
                    let load = resolver.resolve(&request);
                    let mounted = Rc::clone(&mounted);
                    let service = service.clone();
                    let task = async move {
                        let result = load.await;
                        if !mounted.get() {
                            log::debug!("discarding load of {request}: consumer {id} unmounted");
                            return;
                        }
                        match result {
                            Ok(hook) => {
                                log::debug!("loaded remote hook {request} for consumer {id}");
                                service.update_state(
                                    id,
                                    StatePatch::new().loading(false).error(None),
                                );
                                service.update_args(id, latest_args.get());
                                service.register_hook(id, hook);
                            }
                            Err(err) => {
                                log::warn!("failed to load remote hook {request}: {err}");
                                service.update_state(
                                    id,
                                    StatePatch::new().loading(false).error(Some(err)),
                                );
                            }
                        }
                    };
                    let spawned = runtime.and_then(|runtime| runtime.spawn_local(task));
                    if spawned.is_none() {
                        log::warn!("no runtime to load remote hook for consumer {id}");
                    }
                }
                None => log::warn!("useRemoteHook({request}) used outside a RemoteHookProvider"),
            }

            scope.on_dispose(move || {
                mounted.set(false);
                subscription.unsubscribe();
            })
        });
    }

    let forwarded = remember(|| None::<(ConsumerId, HookArgs)>);
    let id = consumer_id.value();
    if !id.is_empty() {
        let unchanged = forwarded.with(|last| {
            last.as_ref().is_some_and(|(last_id, last_args)| {
                *last_id == id && args_shallow_eq(last_args, &args)
            })
        });
        if !unchanged {
            forwarded.replace(Some((id, args.clone())));
            let service = service.clone();
            SideEffect(move || service.update_args(id, args));
        }
    }

    let state = service.get_state(id).unwrap_or_default();
    RemoteHookState {
        id,
        loading: state.loading.unwrap_or(true),
        error: state.error,
        hook_result: state.hook_result,
    }
}
