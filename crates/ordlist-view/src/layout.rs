#![forbid(unsafe_code)]

//! Row layout for the flat and grouped views.
//!
//! A [`Layout`] is the render-order list of rows the sink draws. The flat view
//! is one item row per visible item; the grouped view is a header row per
//! group followed by its members, with members of collapsed groups omitted.
//! Heights are supplied at query time through [`RowMetrics`], so the same
//! layout serves any row size.

use std::collections::HashSet;

use ordlist_core::grouping::Group;
use ordlist_core::id::StableId;
use ordlist_core::store::ItemStore;

use crate::drag::{GroupBlock, SlotGeometry};
use crate::virtualized::VisibleWindow;

/// One rendered row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Header {
        label: String,
        /// Visible members, including those hidden by collapsing.
        count: usize,
        collapsed: bool,
    },
    Item {
        id: StableId,
        /// Position in the full sequence.
        index: usize,
    },
}

impl Row {
    #[must_use]
    pub fn is_header(&self) -> bool {
        matches!(self, Self::Header { .. })
    }

    #[must_use]
    pub fn item_id(&self) -> Option<StableId> {
        match self {
            Self::Item { id, .. } => Some(*id),
            Self::Header { .. } => None,
        }
    }
}

/// Pixel heights for item and header rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowMetrics {
    pub row_height: f64,
    pub header_height: f64,
}

impl RowMetrics {
    #[must_use]
    pub fn uniform(row_height: f64) -> Self {
        Self {
            row_height,
            header_height: row_height,
        }
    }

    #[must_use]
    pub fn height_of(&self, row: &Row) -> f64 {
        if row.is_header() {
            self.header_height
        } else {
            self.row_height
        }
    }
}

/// Render-order rows for one store version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    rows: Vec<Row>,
    grouped: bool,
    version: u64,
}

impl Layout {
    /// One row per visible item (`visible` holds full-sequence indices).
    #[must_use]
    pub fn flat(store: &ItemStore, visible: &[usize]) -> Self {
        let items = store.all();
        let rows = visible
            .iter()
            .map(|&index| Row::Item {
                id: items[index].id(),
                index,
            })
            .collect();
        Self {
            rows,
            grouped: false,
            version: store.version(),
        }
    }

    /// A header per group, followed by its members unless collapsed.
    #[must_use]
    pub fn grouped(store: &ItemStore, groups: &[Group], collapsed: &HashSet<String>) -> Self {
        let mut rows = Vec::with_capacity(groups.len() + groups.iter().map(Group::len).sum::<usize>());
        for group in groups {
            let is_collapsed = collapsed.contains(&group.label);
            rows.push(Row::Header {
                label: group.label.clone(),
                count: group.len(),
                collapsed: is_collapsed,
            });
            if is_collapsed {
                continue;
            }
            rows.extend(group.members.iter().filter_map(|&id| {
                store.position(id).map(|index| Row::Item { id, index })
            }));
        }
        Self {
            rows,
            grouped: true,
            version: store.version(),
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn is_grouped(&self) -> bool {
        self.grouped
    }

    /// Store version this layout was built from.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn row_of_item(&self, id: StableId) -> Option<usize> {
        self.rows.iter().position(|row| row.item_id() == Some(id))
    }

    #[must_use]
    pub fn row_of_header(&self, label: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| matches!(row, Row::Header { label: l, .. } if l == label))
    }

    /// Absolute top of `row`.
    #[must_use]
    pub fn row_top(&self, row: usize, metrics: RowMetrics) -> f64 {
        if !self.grouped {
            return row as f64 * metrics.row_height;
        }
        self.rows[..row.min(self.rows.len())]
            .iter()
            .map(|r| metrics.height_of(r))
            .sum()
    }

    #[must_use]
    pub fn total_height(&self, metrics: RowMetrics) -> f64 {
        self.row_top(self.rows.len(), metrics)
    }

    /// The row under content coordinate `y`.
    #[must_use]
    pub fn row_at(&self, y: f64, metrics: RowMetrics) -> Option<usize> {
        if y < 0.0 {
            return None;
        }
        if !self.grouped {
            if metrics.row_height <= 0.0 {
                return None;
            }
            let row = (y / metrics.row_height).floor() as usize;
            return (row < self.rows.len()).then_some(row);
        }
        let mut top = 0.0;
        for (i, row) in self.rows.iter().enumerate() {
            let bottom = top + metrics.height_of(row);
            if y < bottom {
                return Some(i);
            }
            top = bottom;
        }
        None
    }

    /// Item rows as drop-target slots, restricted to `window` when given.
    #[must_use]
    pub fn item_slots(&self, metrics: RowMetrics, window: Option<VisibleWindow>) -> Vec<SlotGeometry> {
        let range = window.map_or(0..self.rows.len(), |w| w.start..w.end.min(self.rows.len()));
        let mut top = self.row_top(range.start, metrics);
        let mut slots = Vec::with_capacity(range.len());
        for row in &self.rows[range] {
            let height = metrics.height_of(row);
            if let Row::Item { index, .. } = row {
                slots.push(SlotGeometry {
                    index: *index,
                    top,
                    height,
                });
            }
            top += height;
        }
        slots
    }

    /// Group blocks from header top to last rendered member bottom.
    #[must_use]
    pub fn group_blocks(&self, metrics: RowMetrics) -> Vec<GroupBlock> {
        let mut blocks: Vec<GroupBlock> = Vec::new();
        let mut top = 0.0;
        for row in &self.rows {
            let bottom = top + metrics.height_of(row);
            match row {
                Row::Header { label, .. } => blocks.push(GroupBlock {
                    label: label.clone(),
                    top,
                    bottom,
                }),
                Row::Item { .. } => {
                    if let Some(block) = blocks.last_mut() {
                        block.bottom = bottom;
                    }
                }
            }
            top = bottom;
        }
        blocks
    }

    /// True when `self` differs from `previous` only by item order within groups.
    ///
    /// Such a change can be applied by repositioning existing rows without
    /// rebuilding headers.
    #[must_use]
    pub fn is_repack_of(&self, previous: &Self) -> bool {
        if !self.grouped || !previous.grouped || self.rows.len() != previous.rows.len() {
            return false;
        }
        let mut current: HashSet<StableId> = HashSet::new();
        let mut before: HashSet<StableId> = HashSet::new();
        for (a, b) in self.rows.iter().zip(&previous.rows) {
            match (a, b) {
                (Row::Header { .. }, Row::Header { .. }) => {
                    if a != b || current != before {
                        return false;
                    }
                    current.clear();
                    before.clear();
                }
                (Row::Item { id: x, .. }, Row::Item { id: y, .. }) => {
                    current.insert(*x);
                    before.insert(*y);
                }
                _ => return false,
            }
        }
        current == before
    }
}
