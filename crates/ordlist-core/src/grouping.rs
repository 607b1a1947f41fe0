#![forbid(unsafe_code)]

//! Grouping by category level, and the alignment invariant.
//!
//! # Alignment
//!
//! The flat order is *aligned* with level `k` when every label's items form
//! one contiguous block. Grouped-view reordering is only meaningful on an
//! aligned sequence, so [`reorder_group`] refuses to run otherwise, and
//! [`align_to_groups`] is the explicit repair.
//!
//! # Group order
//!
//! Groups sort by the `sort_order` of their first encountered item (ties keep
//! encounter order). The uncategorized sentinel group always comes last.
//! [`recalculate_label_sort_orders`] keeps item tuples consistent with the
//! level's label list after labels are reordered.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::category::CategoryModel;
use crate::error::{EngineError, MoveOutcome, RejectReason, ReorderResult};
use crate::id::StableId;
use crate::item::{Item, UNCATEGORIZED};
use crate::store::ItemStore;

/// A derived group block. Never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub label: String,
    pub sort_order: f64,
    pub members: Vec<StableId>,
}

impl Group {
    /// True for the uncategorized sentinel group.
    #[must_use]
    pub fn is_uncategorized(&self) -> bool {
        self.label == UNCATEGORIZED
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Group the visible items (given as store indices) by their label at `level`.
#[must_use]
pub fn build_groups(items: &[Item], visible: &[usize], level: usize) -> Vec<Group> {
    let mut slot: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();
    for &i in visible {
        let item = &items[i];
        let label = item.label(level);
        let at = *slot.entry(label).or_insert_with(|| {
            groups.push(Group {
                label: label.to_string(),
                sort_order: item.sort_order(level),
                members: Vec::new(),
            });
            groups.len() - 1
        });
        groups[at].members.push(item.id());
    }
    sort_groups(&mut groups, |g| (g.is_uncategorized(), g.sort_order));
    groups
}

fn sort_groups<T>(groups: &mut [T], key: impl Fn(&T) -> (bool, f64)) {
    // Stable: equal sort orders keep encounter order.
    groups.sort_by(|a, b| {
        let (a_unc, a_ord) = key(a);
        let (b_unc, b_ord) = key(b);
        a_unc.cmp(&b_unc).then(a_ord.total_cmp(&b_ord))
    });
}

/// Result of an alignment scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlignmentReport {
    pub aligned: bool,
    /// Labels that reappear after the scan moved past them.
    pub offending_labels: BTreeSet<String>,
    /// `(display_name, label)` of each item that reopened a closed block.
    pub misaligned_items: Vec<(String, String)>,
}

/// Single linear pass over the full sequence.
#[must_use]
pub fn check_alignment(items: &[Item], level: usize) -> AlignmentReport {
    let mut report = AlignmentReport {
        aligned: true,
        ..AlignmentReport::default()
    };
    let mut last_seen: Option<&str> = None;
    let mut seen: HashSet<&str> = HashSet::new();
    for item in items {
        let label = item.label(level);
        if last_seen == Some(label) {
            continue;
        }
        if !seen.insert(label) {
            report.aligned = false;
            report.offending_labels.insert(label.to_string());
            report
                .misaligned_items
                .push((item.display_name.clone(), label.to_string()));
        }
        last_seen = Some(label);
    }
    report
}

/// Bucket items by label, buckets in ascending stored sort order, uncategorized last.
///
/// Within a bucket the input order is preserved.
fn bucketed<'a>(items: impl Iterator<Item = &'a Item>, level: usize) -> Vec<StableId> {
    struct Bucket<'b> {
        label: &'b str,
        sort_order: f64,
        ids: Vec<StableId>,
    }
    let mut slot: HashMap<&str, usize> = HashMap::new();
    let mut buckets: Vec<Bucket<'_>> = Vec::new();
    for item in items {
        let label = item.label(level);
        let at = *slot.entry(label).or_insert_with(|| {
            buckets.push(Bucket {
                label,
                sort_order: item.sort_order(level),
                ids: Vec::new(),
            });
            buckets.len() - 1
        });
        buckets[at].ids.push(item.id());
    }
    sort_groups(&mut buckets, |b| (b.label == UNCATEGORIZED, b.sort_order));
    buckets.into_iter().flat_map(|b| b.ids).collect()
}

/// The aligned permutation of the full sequence for `level`.
#[must_use]
pub fn aligned_order(items: &[Item], level: usize) -> Vec<StableId> {
    bucketed(items.iter(), level)
}

/// Repair the alignment invariant by stable partition. Idempotent.
pub fn align_to_groups(store: &mut ItemStore, level: usize) -> MoveOutcome {
    let order = aligned_order(store.all(), level);
    let outcome = store.apply_order(&order);
    tracing::debug!(level, changed = outcome.is_moved(), "aligned to groups");
    outcome
}

/// Rewrite every item's sort order at `level` from the level's label order.
///
/// Returns the number of item tuples that changed.
pub fn recalculate_label_sort_orders(store: &mut ItemStore, model: &CategoryModel, level: usize) -> usize {
    let ranks = model.rank_map(level);
    let changed = store.rewrite_sort_orders(level, &ranks);
    tracing::trace!(level, changed, "label sort orders recalculated");
    changed
}

/// Move a displayed group to gap `new_index` among the displayed groups.
///
/// `displayed` is the current group listing (as returned by [`build_groups`]);
/// the uncategorized group is never movable and is not counted in the gap
/// index. Only items whose labels appear in `displayed` are relocated, into
/// the positions those items already occupied; other items stay where they
/// are.
///
/// # Errors
///
/// Fails when the level is unknown or calculated, or when a label involved
/// is missing from the level's label list.
pub fn reorder_group(
    store: &mut ItemStore,
    model: &mut CategoryModel,
    level: usize,
    displayed: &[Group],
    label: &str,
    new_index: usize,
) -> Result<ReorderResult, EngineError> {
    model.groupable(level)?;
    if !check_alignment(store.all(), level).aligned {
        tracing::warn!(level, label, "group reorder refused: order is not aligned");
        return Ok(ReorderResult::rejected(RejectReason::Misaligned));
    }
    let movable: Vec<&str> = displayed
        .iter()
        .filter(|g| !g.is_uncategorized())
        .map(|g| g.label.as_str())
        .collect();
    let Some(from) = movable.iter().position(|l| *l == label) else {
        return Ok(ReorderResult::rejected(RejectReason::ImmovableGroup(
            label.to_string(),
        )));
    };
    let gap = new_index.min(movable.len());
    if gap == from || gap == from + 1 {
        return Ok(ReorderResult::rejected(RejectReason::NoOpPosition));
    }

    let anchor: Option<String> = if gap < movable.len() {
        Some(movable[gap].to_string())
    } else {
        // After the last displayed group: before whatever label follows it.
        let labels = &model.groupable(level)?.labels;
        let last = movable[movable.len() - 1];
        labels
            .iter()
            .skip_while(|l| l.as_str() != last)
            .skip(1)
            .find(|l| l.as_str() != label)
            .cloned()
    };
    model.move_label_before(level, label, anchor.as_deref())?;
    recalculate_label_sort_orders(store, model, level);

    let present: HashSet<&str> = displayed.iter().map(|g| g.label.as_str()).collect();
    let items = store.all();
    let slots: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| present.contains(item.label(level)))
        .map(|(i, _)| i)
        .collect();
    let regrouped = bucketed(slots.iter().map(|&i| &items[i]), level);
    let mut order = store.ids();
    for (&slot, id) in slots.iter().zip(regrouped) {
        order[slot] = id;
    }
    store.apply_order(&order);
    tracing::debug!(level, label, gap, "group reordered");
    Ok(ReorderResult::Applied)
}

/// Half-open index ranges of each label's block in the full sequence.
///
/// Valid drop gaps for an item of a block `start..end` are `start..=end`.
/// Meaningful only on an aligned sequence.
#[derive(Debug, Clone, Default)]
pub struct GroupBounds {
    level: usize,
    blocks: HashMap<String, (usize, usize)>,
}

impl GroupBounds {
    #[must_use]
    pub fn compute(items: &[Item], level: usize) -> Self {
        let mut blocks: HashMap<String, (usize, usize)> = HashMap::new();
        for (i, item) in items.iter().enumerate() {
            blocks
                .entry(item.label(level).to_string())
                .and_modify(|b| b.1 = i + 1)
                .or_insert((i, i + 1));
        }
        Self { level, blocks }
    }

    #[must_use]
    pub fn level(&self) -> usize {
        self.level
    }

    #[must_use]
    pub fn for_label(&self, label: &str) -> Option<(usize, usize)> {
        self.blocks.get(label).copied()
    }

    #[must_use]
    pub fn for_item(&self, item: &Item) -> Option<(usize, usize)> {
        self.for_label(item.label(self.level))
    }

    /// Clamp a drop gap into the block of `label`.
    #[must_use]
    pub fn clamp_gap(&self, label: &str, gap: usize) -> usize {
        match self.for_label(label) {
            Some((start, end)) => gap.clamp(start, end),
            None => gap,
        }
    }
}

/// The single label shared by all `ids` at `level`, or `None` if they span groups.
#[must_use]
pub fn common_label<'a>(store: &'a ItemStore, ids: &[StableId], level: usize) -> Option<&'a str> {
    let mut labels = ids.iter().filter_map(|&id| store.get(id)).map(|i| i.label(level));
    let first = labels.next()?;
    labels.all(|l| l == first).then_some(first)
}
