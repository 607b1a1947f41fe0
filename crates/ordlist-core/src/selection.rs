#![forbid(unsafe_code)]

//! Item and group selection.
//!
//! Item selection and group selection are separate fields; selecting one
//! clears the other, so the "both selected" state is never produced.
//!
//! # Click semantics
//!
//! | Input | Effect |
//! |-------|--------|
//! | plain click, item not selected | selection becomes `{item}` |
//! | plain click, item already selected | deferred until release-without-drag |
//! | Ctrl/Cmd click | toggle membership |
//! | Shift click | inclusive range from the anchor, over the full sequence |
//!
//! The deferral lets a drag start on an already-selected block without
//! collapsing it first. On release without drag, a sole selection is
//! deselected and a block collapses to the clicked item.

use std::collections::BTreeSet;

use crate::id::StableId;
use crate::input::Modifiers;
use crate::store::ItemStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    Deselect(StableId),
    Collapse(StableId),
}

/// Selection state.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    items: BTreeSet<StableId>,
    group: Option<String>,
    anchor: Option<StableId>,
    deferred: Option<Deferred>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn items(&self) -> &BTreeSet<StableId> {
        &self.items
    }

    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    #[must_use]
    pub fn anchor(&self) -> Option<StableId> {
        self.anchor
    }

    #[must_use]
    pub fn is_selected(&self, id: StableId) -> bool {
        self.items.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.group.is_none()
    }

    /// True while a plain click on a selected item awaits its release.
    #[must_use]
    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    /// Comparable view of the observable state.
    #[must_use]
    pub fn snapshot(&self) -> (Vec<StableId>, Option<String>) {
        (self.items.iter().copied().collect(), self.group.clone())
    }

    /// Selected ids in store order.
    #[must_use]
    pub fn selected_in_order(&self, store: &ItemStore) -> Vec<StableId> {
        let mut ids: Vec<StableId> = self.items.iter().copied().collect();
        ids.sort_by_key(|id| store.position(*id).unwrap_or(usize::MAX));
        ids
    }

    /// Apply a pointer click on `id`. Returns true if the selection changed now.
    pub fn click(&mut self, store: &ItemStore, id: StableId, modifiers: Modifiers) -> bool {
        if !store.contains(id) {
            return false;
        }
        self.deferred = None;
        if modifiers.is_range() {
            return self.extend_to(store, id);
        }
        if modifiers.is_toggle() {
            return self.toggle(id);
        }
        if self.items.contains(&id) {
            self.deferred = Some(if self.items.len() == 1 {
                Deferred::Deselect(id)
            } else {
                Deferred::Collapse(id)
            });
            self.anchor = Some(id);
            return false;
        }
        self.select_only(id)
    }

    /// Resolve a deferred plain click: the pointer was released without dragging.
    pub fn release_without_drag(&mut self) -> bool {
        match self.deferred.take() {
            Some(Deferred::Deselect(id)) => {
                let changed = self.items.remove(&id);
                if self.anchor == Some(id) {
                    self.anchor = None;
                }
                changed
            }
            Some(Deferred::Collapse(id)) => self.select_only(id),
            None => false,
        }
    }

    /// A drag started: the deferred click is dropped, the block stays selected.
    pub fn cancel_deferred(&mut self) {
        self.deferred = None;
    }

    /// Replace the selection with a single item.
    pub fn select_only(&mut self, id: StableId) -> bool {
        let changed = self.group.is_some() || self.items.len() != 1 || !self.items.contains(&id);
        self.group = None;
        self.items.clear();
        self.items.insert(id);
        self.anchor = Some(id);
        changed
    }

    /// Toggle membership of one item.
    pub fn toggle(&mut self, id: StableId) -> bool {
        self.group = None;
        if !self.items.remove(&id) {
            self.items.insert(id);
        }
        self.anchor = Some(id);
        true
    }

    /// Select the inclusive range between the anchor and `id`, over the full sequence.
    ///
    /// Without a valid anchor this behaves like a plain selection of `id`.
    pub fn extend_to(&mut self, store: &ItemStore, id: StableId) -> bool {
        let (Some(from), Some(to)) = (self.anchor.and_then(|a| store.position(a)), store.position(id))
        else {
            return self.select_only(id);
        };
        let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
        let range: BTreeSet<StableId> = store.all()[lo..=hi].iter().map(|i| i.id()).collect();
        let changed = self.group.is_some() || range != self.items;
        self.group = None;
        self.items = range;
        changed
    }

    /// Replace the selection with `ids`.
    pub fn select_all(&mut self, ids: impl IntoIterator<Item = StableId>) -> bool {
        let next: BTreeSet<StableId> = ids.into_iter().collect();
        let changed = self.group.is_some() || next != self.items;
        self.group = None;
        self.anchor = next.iter().next().copied();
        self.items = next;
        changed
    }

    /// Select a group; clears item selection.
    pub fn select_group(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        let changed = !self.items.is_empty() || self.group.as_deref() != Some(label.as_str());
        self.items.clear();
        self.anchor = None;
        self.deferred = None;
        self.group = Some(label);
        changed
    }

    /// Clear everything.
    pub fn clear(&mut self) -> bool {
        let changed = !self.is_empty();
        self.items.clear();
        self.group = None;
        self.anchor = None;
        self.deferred = None;
        changed
    }

    /// Drop one id (cascade from removal).
    pub fn remove(&mut self, id: StableId) -> bool {
        if self.anchor == Some(id) {
            self.anchor = None;
        }
        if matches!(self.deferred, Some(Deferred::Deselect(d) | Deferred::Collapse(d)) if d == id) {
            self.deferred = None;
        }
        self.items.remove(&id)
    }

    /// Drop every id the store no longer holds.
    pub fn retain_existing(&mut self, store: &ItemStore) -> bool {
        let before = self.items.len();
        self.items.retain(|id| store.contains(*id));
        if self.anchor.is_some_and(|a| !store.contains(a)) {
            self.anchor = None;
        }
        before != self.items.len()
    }
}
