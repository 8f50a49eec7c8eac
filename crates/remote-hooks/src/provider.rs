use std::rc::Rc;

use remote_hooks_macros::composable;
use remote_hooks_runtime::{
    compose_restartable, location_key, remember, staticCompositionLocalOf, useState, with_key,
    CompositionLocalProvider, DisposableEffect, DisposableEffectScope, SideEffect,
    StaticCompositionLocal,
};

use crate::hook::{HookResolver, RemoteHook};
use crate::registry::{ConsumerId, StatePatch};
use crate::service::RemoteHooks;
use crate::value::{HookArgs, Value};

thread_local! {
    static LOCAL_REMOTE_HOOKS: StaticCompositionLocal<RemoteHooks> =
        staticCompositionLocalOf(RemoteHooks::detached);
}

/// Composition local carrying the nearest provider's service. Outside any
/// provider it yields [`RemoteHooks::detached`].
#[allow(non_snake_case)]
pub fn LocalRemoteHooks() -> StaticCompositionLocal<RemoteHooks> {
    LOCAL_REMOTE_HOOKS.with(Clone::clone)
}

/// Hosts remote hooks for `content`.
///
/// Creates the service on first composition (later `resolver` values are
/// ignored), renders one execution unit per loaded hook, then `content` with
/// the service installed in [`LocalRemoteHooks`].
///
/// `content` runs in its own restartable scope, so a `useRemoteHook` called
/// directly in it still re-renders when its state changes.
#[composable(no_restart)]
pub fn RemoteHookProvider(resolver: impl HookResolver + 'static, content: impl Fn() + 'static) {
    let service = remember(move || RemoteHooks::new(Rc::new(resolver))).with(RemoteHooks::clone);
    HookHost(service.clone());
    let content = Rc::new(content);
    CompositionLocalProvider([LocalRemoteHooks().provides(service)], move || {
        compose_restartable(location_key(file!(), line!(), column!()), move || content());
    });
}

/// Restartable so that registering or removing a hook re-renders only the
/// list of execution units, not the provider's content.
#[composable]
fn HookHost(service: RemoteHooks) {
    for (id, hook) in service.available_hooks() {
        // A different callable under the same id gets a fresh unit.
        with_key(&(id, hook.key()), || {
            HookExecutionUnit(service.clone(), id, hook);
        });
    }
}

/// Runs one loaded hook every render with the latest arguments published
/// for `id`, and pushes changed results into the registry.
///
/// Panics raised by the hook are not caught.
#[composable]
pub fn HookExecutionUnit(service: RemoteHooks, id: ConsumerId, hook: RemoteHook) {
    let args = useState(HookArgs::new);
    {
        let service = service.clone();
        let args = args.clone();
        DisposableEffect!(id, move |scope: DisposableEffectScope| {
            let handle = service.subscribe_to_args(
                id,
                Rc::new(move |next: &[Value]| {
                    args.set(next.to_vec());
                    Ok(())
                }),
            );
            scope.on_dispose(move || handle.unsubscribe())
        });
    }
    let last_result = remember(|| None::<Value>);

    let current_args = args.value();
    log::trace!("running remote hook for consumer {id} with {} args", current_args.len());
    let result = hook.call(&current_args);

    let changed = last_result.with(|last| {
        !last
            .as_ref()
            .is_some_and(|previous| previous.shallow_eq(&result))
    });
    if changed {
        last_result.replace(Some(result.clone()));
        SideEffect(move || service.update_state(id, StatePatch::new().hook_result(result)));
    }
}
