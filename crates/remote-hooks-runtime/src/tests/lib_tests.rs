use super::*;
use crate::DisposableEffect;
use remote_hooks_macros::composable;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct CountingScheduler {
    frames: AtomicUsize,
}

impl RuntimeScheduler for CountingScheduler {
    fn schedule_frame(&self) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}

thread_local! {
    static PARENT_RECOMPOSITIONS: Cell<usize> = Cell::new(0);
    static CHILD_RECOMPOSITIONS: Cell<usize> = Cell::new(0);
    static CHILD_STATE: RefCell<Option<MutableState<i32>>> = RefCell::new(None);
    static EFFECT_LOG: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

fn reset_counters() {
    PARENT_RECOMPOSITIONS.with(|c| c.set(0));
    CHILD_RECOMPOSITIONS.with(|c| c.set(0));
    CHILD_STATE.with(|slot| slot.borrow_mut().take());
    EFFECT_LOG.with(|log| log.borrow_mut().clear());
}

fn effect_log() -> Vec<String> {
    EFFECT_LOG.with(|log| log.borrow().clone())
}

#[composable]
fn Child() {
    CHILD_RECOMPOSITIONS.with(|c| c.set(c.get() + 1));
    let state = useState(|| 0);
    CHILD_STATE.with(|slot| *slot.borrow_mut() = Some(state.clone()));
    let _ = state.value();
}

#[composable]
fn Parent() {
    PARENT_RECOMPOSITIONS.with(|c| c.set(c.get() + 1));
    Child();
}

#[test]
fn remember_keeps_value_across_renders() {
    let mut composition = Composition::new();
    let seen: Rc<RefCell<Vec<usize>>> = Rc::default();
    let counter = Rc::new(Cell::new(0));
    for _ in 0..3 {
        let seen = Rc::clone(&seen);
        let counter = Rc::clone(&counter);
        composition
            .render(location_key(file!(), line!(), column!()), move || {
                let value = remember(|| {
                    counter.set(counter.get() + 1);
                    counter.get()
                });
                seen.borrow_mut().push(value.get());
            })
            .expect("render");
    }
    assert_eq!(*seen.borrow(), vec![1, 1, 1]);
    assert_eq!(counter.get(), 1);
}

#[test]
fn state_write_recomposes_only_the_reading_scope() {
    reset_counters();
    let mut composition = Composition::new();
    composition
        .render(location_key(file!(), line!(), column!()), Parent)
        .expect("initial render");
    assert_eq!(PARENT_RECOMPOSITIONS.with(|c| c.get()), 1);
    assert_eq!(CHILD_RECOMPOSITIONS.with(|c| c.get()), 1);

    let state = CHILD_STATE
        .with(|slot| slot.borrow().clone())
        .expect("child state captured");
    state.set(5);
    assert!(composition.should_render());
    composition
        .process_invalid_scopes()
        .expect("recompose child");

    assert_eq!(PARENT_RECOMPOSITIONS.with(|c| c.get()), 1);
    assert_eq!(CHILD_RECOMPOSITIONS.with(|c| c.get()), 2);
    assert!(!composition.should_render());
}

#[test]
fn child_state_survives_parent_recomposition() {
    reset_counters();
    let mut composition = Composition::new();
    let key = location_key(file!(), line!(), column!());
    composition.render(key, Parent).expect("initial render");
    let first = CHILD_STATE
        .with(|slot| slot.borrow().clone())
        .expect("child state captured");
    first.set(9);
    composition.render(key, Parent).expect("second render");
    let second = CHILD_STATE
        .with(|slot| slot.borrow().clone())
        .expect("child state captured");
    assert_eq!(first, second);
    assert_eq!(second.value(), 9);
}

#[test]
fn keyed_groups_keep_state_when_reordered() {
    let mut composition = Composition::new();
    let key = location_key(file!(), line!(), column!());
    let order = Rc::new(RefCell::new(vec!["a", "b", "c"]));
    let observed: Rc<RefCell<Vec<(String, usize)>>> = Rc::default();
    let next_id = Rc::new(Cell::new(0usize));

    let render = {
        let order = Rc::clone(&order);
        let observed = Rc::clone(&observed);
        let next_id = Rc::clone(&next_id);
        move || {
            observed.borrow_mut().clear();
            for name in order.borrow().iter() {
                with_key(name, || {
                    let id = remember(|| {
                        next_id.set(next_id.get() + 1);
                        next_id.get()
                    });
                    observed.borrow_mut().push((name.to_string(), id.get()));
                });
            }
        }
    };

    composition.render(key, render.clone()).expect("first render");
    let before: Vec<(String, usize)> = observed.borrow().clone();

    *order.borrow_mut() = vec!["c", "a"];
    composition.render(key, render).expect("second render");
    let after: Vec<(String, usize)> = observed.borrow().clone();

    let id_of = |list: &[(String, usize)], name: &str| {
        list.iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
            .expect("name present")
    };
    assert_eq!(id_of(&after, "a"), id_of(&before, "a"));
    assert_eq!(id_of(&after, "c"), id_of(&before, "c"));
    assert_eq!(next_id.get(), 3);
}

#[test]
fn remember_with_a_different_type_replaces_only_that_slot() {
    let mut composition = Composition::new();
    let key = location_key(file!(), line!(), column!());
    let as_text = Rc::new(Cell::new(false));
    let tail: Rc<RefCell<Option<Owned<u32>>>> = Rc::default();

    let render = {
        let as_text = Rc::clone(&as_text);
        let tail = Rc::clone(&tail);
        move || {
            if as_text.get() {
                let _ = remember(|| String::from("text"));
            } else {
                let _ = remember(|| 1u8);
            }
            *tail.borrow_mut() = Some(remember(|| 7u32));
        }
    };

    composition.render(key, render.clone()).expect("first render");
    let first = tail.borrow().clone().expect("tail remembered");
    as_text.set(true);
    composition.render(key, render).expect("second render");
    let second = tail.borrow().clone().expect("tail remembered");
    assert!(first.ptr_eq(&second));
}

#[test]
fn disposable_effect_cleans_up_on_key_change_and_removal() {
    reset_counters();
    let mut composition = Composition::new();
    let key = location_key(file!(), line!(), column!());
    let effect_key = Rc::new(Cell::new(1));
    let shown = Rc::new(Cell::new(true));

    let render = {
        let effect_key = Rc::clone(&effect_key);
        let shown = Rc::clone(&shown);
        move || {
            if shown.get() {
                let current = effect_key.get();
                DisposableEffect!(current, move |scope: DisposableEffectScope| {
                    EFFECT_LOG.with(|log| log.borrow_mut().push(format!("start {current}")));
                    scope.on_dispose(move || {
                        EFFECT_LOG.with(|log| log.borrow_mut().push(format!("stop {current}")));
                    })
                });
            }
        }
    };

    composition.render(key, render.clone()).expect("first render");
    assert_eq!(effect_log(), vec!["start 1"]);

    composition.render(key, render.clone()).expect("same key");
    assert_eq!(effect_log(), vec!["start 1"]);

    effect_key.set(2);
    composition.render(key, render.clone()).expect("new key");
    assert_eq!(effect_log(), vec!["start 1", "stop 1", "start 2"]);

    shown.set(false);
    composition.render(key, render).expect("removed");
    assert_eq!(effect_log(), vec!["start 1", "stop 1", "start 2", "stop 2"]);
}

#[test]
fn side_effects_run_after_the_pass() {
    reset_counters();
    let mut composition = Composition::new();
    composition
        .render(location_key(file!(), line!(), column!()), || {
            SideEffect(|| EFFECT_LOG.with(|log| log.borrow_mut().push("effect".into())));
            EFFECT_LOG.with(|log| log.borrow_mut().push("body".into()));
        })
        .expect("render");
    assert_eq!(effect_log(), vec!["body", "effect"]);
}

#[test]
fn static_local_falls_back_to_default_and_reaches_isolated_recomposition() {
    let local = staticCompositionLocalOf(|| "default");
    let seen: Rc<RefCell<Vec<&'static str>>> = Rc::default();
    let trigger: Rc<RefCell<Option<MutableState<i32>>>> = Rc::default();

    assert_eq!(local.current(), "default");

    let mut composition = Composition::new();
    {
        let local = local.clone();
        let seen = Rc::clone(&seen);
        let trigger = Rc::clone(&trigger);
        composition
            .render(location_key(file!(), line!(), column!()), move || {
                seen.borrow_mut().push(local.current());
                let local = local.clone();
                let seen = Rc::clone(&seen);
                let trigger = Rc::clone(&trigger);
                CompositionLocalProvider([local.provides("provided")], move || {
                    compose_restartable(location_key(file!(), line!(), column!()), move || {
                        let state = useState(|| 0);
                        let _ = state.value();
                        *trigger.borrow_mut() = Some(state);
                        seen.borrow_mut().push(local.current());
                    });
                });
            })
            .expect("render");
    }
    assert_eq!(*seen.borrow(), vec!["default", "provided"]);

    trigger.borrow().clone().expect("state captured").set(1);
    composition
        .process_invalid_scopes()
        .expect("recompose inner scope");
    assert_eq!(*seen.borrow(), vec!["default", "provided", "provided"]);
}

#[test]
fn invalidation_during_compose_is_replayed() {
    let mut composition = Composition::new();
    let runs = Rc::new(Cell::new(0));
    {
        let runs = Rc::clone(&runs);
        composition
            .render(location_key(file!(), line!(), column!()), move || {
                let runs = Rc::clone(&runs);
                compose_restartable(location_key(file!(), line!(), column!()), move || {
                    runs.set(runs.get() + 1);
                    if runs.get() == 1 {
                        if let Some(scope) = current_recompose_scope() {
                            scope.invalidate();
                        }
                    }
                });
            })
            .expect("render");
    }
    assert_eq!(runs.get(), 2);
}

#[test]
fn self_invalidating_effect_hits_the_pass_limit() {
    let mut composition = Composition::new();
    let result = composition.render(location_key(file!(), line!(), column!()), || {
        compose_restartable(location_key(file!(), line!(), column!()), || {
            let scope = current_recompose_scope().expect("inside restartable group");
            SideEffect(move || scope.invalidate());
        });
    });
    assert_eq!(
        result,
        Err(ComposeError::RecompositionLimit {
            passes: MAX_RECOMPOSE_PASSES
        })
    );
}

#[test]
fn nested_render_is_rejected() {
    let inner_result: Rc<RefCell<Option<Result<(), ComposeError>>>> = Rc::default();
    let mut composition = Composition::new();
    {
        let inner_result = Rc::clone(&inner_result);
        composition
            .render(location_key(file!(), line!(), column!()), move || {
                let mut nested = Composition::new();
                *inner_result.borrow_mut() = Some(nested.render(0, || {}));
            })
            .expect("outer render");
    }
    assert_eq!(*inner_result.borrow(), Some(Err(ComposeError::Reentrant)));
}

#[test]
fn spawned_task_runs_on_drain_and_wakes_frames() {
    let scheduler = Arc::new(CountingScheduler::default());
    let runtime = Runtime::new(scheduler.clone());
    let handle = runtime.handle();
    let (tx, rx) = futures::channel::oneshot::channel::<u32>();
    let received = Rc::new(Cell::new(None));

    let id = {
        let received = Rc::clone(&received);
        handle.spawn_local(async move {
            received.set(rx.await.ok());
        })
    };
    assert!(id.is_some());
    assert_eq!(handle.drain_tasks(), 1);
    assert_eq!(received.get(), None);
    assert_eq!(handle.pending_task_count(), 1);

    let frames_before = scheduler.frames.load(Ordering::SeqCst);
    tx.send(42).expect("receiver alive");
    assert!(handle.has_ready_tasks());
    assert!(scheduler.frames.load(Ordering::SeqCst) > frames_before);

    handle.drain_tasks();
    assert_eq!(received.get(), Some(42));
    assert_eq!(handle.pending_task_count(), 0);
}

#[test]
fn handle_outlives_runtime_without_panicking() {
    let runtime = Runtime::new(Arc::new(DefaultScheduler));
    let handle = runtime.handle();
    drop(runtime);
    assert!(handle.spawn_local(async {}).is_none());
    assert_eq!(handle.drain_tasks(), 0);
    assert!(!handle.has_invalid_scopes());
}

#[test]
fn removed_scope_is_not_recomposed() {
    let mut composition = Composition::new();
    let key = location_key(file!(), line!(), column!());
    let shown = Rc::new(Cell::new(true));
    let inner_runs = Rc::new(Cell::new(0));
    let state: Rc<RefCell<Option<MutableState<i32>>>> = Rc::default();

    let render = {
        let shown = Rc::clone(&shown);
        let inner_runs = Rc::clone(&inner_runs);
        let state = Rc::clone(&state);
        move || {
            if shown.get() {
                let inner_runs = Rc::clone(&inner_runs);
                let state = Rc::clone(&state);
                compose_restartable(location_key(file!(), line!(), column!()), move || {
                    inner_runs.set(inner_runs.get() + 1);
                    let s = useState(|| 0);
                    let _ = s.value();
                    *state.borrow_mut() = Some(s);
                });
            }
        }
    };

    composition.render(key, render.clone()).expect("first render");
    let captured = state.borrow().clone().expect("state captured");
    shown.set(false);
    composition.render(key, render).expect("second render");
    captured.set(3);
    composition
        .process_invalid_scopes()
        .expect("nothing to recompose");
    assert_eq!(inner_runs.get(), 1);
}

#[test]
fn untracked_reads_do_not_subscribe() {
    let mut composition = Composition::new();
    let state = mutableStateOf(1);
    let runs = Rc::new(Cell::new(0));
    {
        let state = state.clone();
        let runs = Rc::clone(&runs);
        composition
            .render(location_key(file!(), line!(), column!()), move || {
                let state = state.clone();
                let runs = Rc::clone(&runs);
                compose_restartable(location_key(file!(), line!(), column!()), move || {
                    runs.set(runs.get() + 1);
                    let _ = state.with_untracked(|value| *value);
                });
            })
            .expect("render");
    }

    state.update(|value| *value += 1);
    assert!(!composition.runtime_handle().has_invalid_scopes());
    assert_eq!(state.value(), 2);
    assert_eq!(runs.get(), 1);
}
