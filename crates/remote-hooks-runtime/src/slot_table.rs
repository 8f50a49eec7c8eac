//! Positional storage behind the composer.
//!
//! The table is a tree: each group owns the slots its body produced, in call
//! order. Child groups are matched by key at or after the cursor, so a keyed
//! child that moves (or whose earlier sibling disappears) keeps its state.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::owned::Owned;
use crate::scope::RecomposeScope;
use crate::Key;

pub(crate) type GroupRef = Rc<RefCell<GroupData>>;

pub(crate) struct GroupData {
    key: Key,
    slots: Vec<Slot>,
    scope: Option<RecomposeScope>,
}

impl GroupData {
    fn new(key: Key) -> Self {
        Self {
            key,
            slots: Vec::new(),
            scope: None,
        }
    }

    pub(crate) fn scope(&self) -> Option<RecomposeScope> {
        self.scope.clone()
    }

    pub(crate) fn set_scope(&mut self, scope: RecomposeScope) {
        self.scope = Some(scope);
    }
}

pub(crate) enum Slot {
    Group(GroupRef),
    Value(Box<dyn Any>),
}

impl Slot {
    /// Deactivate every restartable scope below this slot so nothing queued
    /// for it runs after it left the composition.
    pub(crate) fn deactivate(&self) {
        if let Slot::Group(group) = self {
            let group = group.borrow();
            if let Some(scope) = &group.scope {
                scope.deactivate();
            }
            for slot in &group.slots {
                slot.deactivate();
            }
        }
    }
}

struct Frame {
    group: GroupRef,
    cursor: usize,
}

/// Slot storage for one composition.
pub struct SlotTable {
    root: GroupRef,
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotTable {
    pub fn new() -> Self {
        Self {
            root: Rc::new(RefCell::new(GroupData::new(0))),
        }
    }

    pub(crate) fn root(&self) -> GroupRef {
        Rc::clone(&self.root)
    }

    /// Number of slots directly under the root group.
    pub fn root_len(&self) -> usize {
        self.root.borrow().slots.len()
    }
}

/// Cursor over a [`SlotTable`] for a single pass. Slots dropped from the
/// table are collected in `discarded` instead of being dropped in place.
pub(crate) struct SlotWriter {
    frames: Vec<Frame>,
    discarded: Vec<Slot>,
}

impl SlotWriter {
    pub(crate) fn new(group: GroupRef) -> Self {
        Self {
            frames: vec![Frame { group, cursor: 0 }],
            discarded: Vec::new(),
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn start_group(&mut self, key: Key) -> GroupRef {
        let Some(frame) = self.frames.last_mut() else {
            let group = Rc::new(RefCell::new(GroupData::new(key)));
            self.frames.push(Frame {
                group: Rc::clone(&group),
                cursor: 0,
            });
            return group;
        };
        let cursor = frame.cursor;
        let group = {
            let mut parent = frame.group.borrow_mut();
            let found = parent.slots[cursor..].iter().position(|slot| match slot {
                Slot::Group(group) => group.borrow().key == key,
                Slot::Value(_) => false,
            });
            match found {
                Some(offset) => {
                    if offset > 0 {
                        let slot = parent.slots.remove(cursor + offset);
                        parent.slots.insert(cursor, slot);
                    }
                    match &parent.slots[cursor] {
                        Slot::Group(group) => Rc::clone(group),
                        Slot::Value(_) => unreachable!("matched slot is a group"),
                    }
                }
                None => {
                    let group = Rc::new(RefCell::new(GroupData::new(key)));
                    parent.slots.insert(cursor, Slot::Group(Rc::clone(&group)));
                    group
                }
            }
        };
        frame.cursor += 1;
        self.frames.push(Frame {
            group: Rc::clone(&group),
            cursor: 0,
        });
        group
    }

    pub(crate) fn end_group(&mut self) {
        if let Some(frame) = self.frames.pop() {
            let removed = {
                let mut group = frame.group.borrow_mut();
                let cursor = frame.cursor.min(group.slots.len());
                group.slots.split_off(cursor)
            };
            self.discard(removed);
        }
    }

    /// Look up the remembered value at the cursor and advance past it. When
    /// nothing reusable is there the caller initialises the value outside of
    /// any borrow and stores it with [`fill`](Self::fill).
    pub(crate) fn remember_slot<T: 'static>(&mut self) -> RememberSlot<T> {
        let Some(frame) = self.frames.last_mut() else {
            return RememberSlot::Detached;
        };
        let index = frame.cursor;
        frame.cursor += 1;
        let group = frame.group.borrow();
        match group.slots.get(index) {
            Some(Slot::Value(value)) => match value.downcast_ref::<Owned<T>>() {
                Some(owned) => RememberSlot::Existing(owned.clone()),
                None => RememberSlot::Vacant(PendingSlot {
                    group: Rc::clone(&frame.group),
                    index,
                    replace: true,
                }),
            },
            _ => RememberSlot::Vacant(PendingSlot {
                group: Rc::clone(&frame.group),
                index,
                replace: false,
            }),
        }
    }

    pub(crate) fn fill<T: 'static>(&mut self, pending: PendingSlot, owned: &Owned<T>) {
        let PendingSlot {
            group,
            index,
            replace,
        } = pending;
        let slot = Slot::Value(Box::new(owned.clone()));
        let previous = {
            let mut group = group.borrow_mut();
            if replace && index < group.slots.len() {
                // Same position, different type: replace just this slot.
                Some(std::mem::replace(&mut group.slots[index], slot))
            } else {
                let index = index.min(group.slots.len());
                group.slots.insert(index, slot);
                None
            }
        };
        if let Some(previous) = previous {
            self.discard(vec![previous]);
        }
    }

    fn discard(&mut self, slots: Vec<Slot>) {
        for slot in &slots {
            slot.deactivate();
        }
        self.discarded.extend(slots);
    }

    pub(crate) fn take_discarded(&mut self) -> Vec<Slot> {
        std::mem::take(&mut self.discarded)
    }
}

pub(crate) enum RememberSlot<T> {
    Existing(Owned<T>),
    Vacant(PendingSlot),
    /// No group is open; the value lives only for this call.
    Detached,
}

pub(crate) struct PendingSlot {
    group: GroupRef,
    index: usize,
    replace: bool,
}
