#![forbid(unsafe_code)]

//! The item store: single source of truth for item order.
//!
//! # Invariants
//!
//! 1. `positions[items[i].id] == i` for every stored item.
//! 2. After every mutation, `order_within_group` runs `1..=len` within each
//!    group at the active grouping level (the whole list is one group when no
//!    level is active), with no gaps or duplicates.
//! 3. `version` increases by exactly one per mutation that changed state and
//!    never changes on a no-op.
//!
//! # Reordering
//!
//! [`ItemStore::move_range`] is the only reordering primitive exposed to
//! callers. It partitions the sequence into selected and unselected items
//! (both keeping their relative order), converts the target gap into an index
//! within the unselected items, and splices the selected block there. The
//! result does not depend on whether the selection was contiguous.

use std::collections::{HashMap, HashSet};

use crate::error::MoveOutcome;
use crate::id::{IdAllocator, StableId};
use crate::item::{CategoryAssignment, Item, NewItem};

/// Ordered, id-indexed item storage.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    items: Vec<Item>,
    positions: HashMap<StableId, usize>,
    ids: IdAllocator,
    version: u64,
    group_level: Option<usize>,
}

impl ItemStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Monotonic mutation counter, used to stamp derived views.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Level whose groups `order_within_group` is numbered against.
    #[must_use]
    pub fn group_level(&self) -> Option<usize> {
        self.group_level
    }

    /// The full ordered sequence.
    #[must_use]
    pub fn all(&self) -> &[Item] {
        &self.items
    }

    /// Ids in sequence order.
    #[must_use]
    pub fn ids(&self) -> Vec<StableId> {
        self.items.iter().map(Item::id).collect()
    }

    #[must_use]
    pub fn get(&self, id: StableId) -> Option<&Item> {
        self.positions.get(&id).map(|&pos| &self.items[pos])
    }

    #[must_use]
    pub fn position(&self, id: StableId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    #[must_use]
    pub fn contains(&self, id: StableId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Change the level `order_within_group` is numbered against.
    pub fn set_group_level(&mut self, level: Option<usize>) {
        if self.group_level == level {
            return;
        }
        self.group_level = level;
        self.commit();
    }

    /// Insert an item at `index` (clamped), or append when `index` is `None`.
    pub fn insert(&mut self, item: NewItem, index: Option<usize>) -> StableId {
        let id = self.ids.allocate();
        let at = index.map_or(self.items.len(), |i| i.min(self.items.len()));
        self.items.insert(at, Item::from_new(id, item));
        self.commit();
        tracing::debug!(%id, index = at, len = self.items.len(), "item inserted");
        id
    }

    /// Append a batch of items with a single version bump.
    pub fn insert_batch<I>(&mut self, items: I) -> Vec<StableId>
    where
        I: IntoIterator<Item = NewItem>,
    {
        let ids: Vec<StableId> = items
            .into_iter()
            .map(|new| {
                let id = self.ids.allocate();
                self.items.push(Item::from_new(id, new));
                id
            })
            .collect();
        if !ids.is_empty() {
            self.commit();
            tracing::debug!(count = ids.len(), len = self.items.len(), "item batch appended");
        }
        ids
    }

    /// Remove an item. Unknown ids are a no-op.
    pub fn remove(&mut self, id: StableId) -> Option<Item> {
        let pos = self.positions.get(&id).copied()?;
        let item = self.items.remove(pos);
        self.commit();
        tracing::debug!(%id, index = pos, "item removed");
        Some(item)
    }

    /// Move the items in `ids` as one block to gap `target_index` of the full sequence.
    ///
    /// `target_index` is a gap index in `0..=len` (clamped). Ids that are not
    /// stored are ignored; an empty effective selection is a no-op.
    pub fn move_range(&mut self, ids: &[StableId], target_index: usize) -> MoveOutcome {
        let selected: HashSet<StableId> = ids
            .iter()
            .copied()
            .filter(|id| self.positions.contains_key(id))
            .collect();
        if selected.is_empty() {
            return MoveOutcome::Unchanged;
        }
        let order = move_block(&self.ids(), |id| selected.contains(id), target_index);
        let outcome = self.apply_order(&order);
        if outcome.is_moved() {
            tracing::debug!(count = selected.len(), target_index, "block moved");
        }
        outcome
    }

    /// Replace the assignment of one item at one level.
    ///
    /// Returns false when the id is unknown or the assignment is unchanged.
    pub fn set_category(&mut self, id: StableId, level: usize, assignment: CategoryAssignment) -> bool {
        let Some(&pos) = self.positions.get(&id) else {
            return false;
        };
        let item = &mut self.items[pos];
        if item.categories.get(level) == Some(&assignment)
            || (item.categories.get(level).is_none() && assignment == CategoryAssignment::default())
        {
            return false;
        }
        item.set_category(level, assignment);
        self.commit();
        true
    }

    /// Replace every assignment of one item. Returns false for unknown ids.
    pub fn set_categories(&mut self, id: StableId, categories: Vec<CategoryAssignment>) -> bool {
        let Some(&pos) = self.positions.get(&id) else {
            return false;
        };
        if self.items[pos].categories == categories {
            return false;
        }
        self.items[pos].categories = categories;
        self.commit();
        true
    }

    /// Commit a full permutation of the current ids.
    ///
    /// The order must contain every stored id exactly once; anything else is
    /// an internal invariant violation.
    pub(crate) fn apply_order(&mut self, order: &[StableId]) -> MoveOutcome {
        debug_assert_eq!(order.len(), self.items.len(), "order must be a permutation");
        if self.items.iter().map(Item::id).eq(order.iter().copied()) {
            return MoveOutcome::Unchanged;
        }
        let mut slots: Vec<Option<Item>> = std::mem::take(&mut self.items)
            .into_iter()
            .map(Some)
            .collect();
        self.items = order
            .iter()
            .map(|id| {
                let pos = self.positions[id];
                slots[pos]
                    .take()
                    .unwrap_or_else(|| unreachable!("id {id} appears twice in order"))
            })
            .collect();
        self.commit();
        MoveOutcome::Moved
    }

    /// Rewrite the sort order of every assignment at `level` whose label is ranked.
    ///
    /// Returns the number of items whose tuple changed. Labels are untouched.
    pub(crate) fn rewrite_sort_orders(&mut self, level: usize, ranks: &HashMap<String, f64>) -> usize {
        let mut changed = 0;
        for item in &mut self.items {
            let Some(assignment) = item.categories.get_mut(level) else {
                continue;
            };
            if let Some(&rank) = ranks.get(&assignment.label)
                && assignment.sort_order.to_bits() != rank.to_bits()
            {
                assignment.sort_order = rank;
                changed += 1;
            }
        }
        if changed > 0 {
            self.commit();
        }
        changed
    }

    /// Rebuild positions, renumber groups and bump the version.
    fn commit(&mut self) {
        self.positions.clear();
        self.positions
            .extend(self.items.iter().enumerate().map(|(i, item)| (item.id, i)));
        self.renumber();
        self.version += 1;
    }

    fn renumber(&mut self) {
        match self.group_level {
            None => {
                for (i, item) in self.items.iter_mut().enumerate() {
                    item.order_within_group = u32::try_from(i + 1).unwrap_or(u32::MAX);
                }
            }
            Some(level) => {
                let mut counters: HashMap<String, u32> = HashMap::new();
                for item in &mut self.items {
                    let counter = counters.entry(item.label(level).to_string()).or_insert(0);
                    *counter = counter.saturating_add(1);
                    item.order_within_group = *counter;
                }
            }
        }
    }
}

/// Stable block move over any sequence.
///
/// Items for which `is_selected` holds are lifted out and reinserted as one
/// block at gap `target` of the original sequence, measured in unselected
/// items that precede the gap. Both partitions keep their relative order.
#[must_use]
pub fn move_block<T: Clone>(seq: &[T], is_selected: impl Fn(&T) -> bool, target: usize) -> Vec<T> {
    let target = target.min(seq.len());
    let unselected_before = seq[..target].iter().filter(|t| !is_selected(t)).count();
    let (selected, unselected): (Vec<T>, Vec<T>) =
        seq.iter().cloned().partition(|t| is_selected(t));
    let mut out = Vec::with_capacity(seq.len());
    out.extend_from_slice(&unselected[..unselected_before]);
    out.extend(selected);
    out.extend_from_slice(&unselected[unselected_before..]);
    out
}
