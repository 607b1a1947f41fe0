#![forbid(unsafe_code)]

//! Items and their per-level category assignments.

use crate::id::StableId;

/// Label used for "uncategorized" at any level.
pub const UNCATEGORIZED: &str = "";

/// A `(sort_order, label)` tuple assigning an item to a group at one level.
///
/// An empty label means the item is uncategorized at that level.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CategoryAssignment {
    /// Sort key of the label's group block.
    pub sort_order: f64,
    /// Group label.
    pub label: String,
}

impl CategoryAssignment {
    /// Create an assignment.
    #[must_use]
    pub fn new(sort_order: f64, label: impl Into<String>) -> Self {
        Self {
            sort_order,
            label: label.into(),
        }
    }

    /// The uncategorized assignment, `("", 0)`.
    #[must_use]
    pub fn uncategorized() -> Self {
        Self::default()
    }

    /// Whether this assignment carries no label.
    #[must_use]
    pub fn is_uncategorized(&self) -> bool {
        self.label.is_empty()
    }
}

/// Payload for an item that has not been inserted yet.
///
/// The store assigns the [`StableId`] on insertion.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewItem {
    pub display_name: String,
    pub reference: String,
    pub categories: Vec<CategoryAssignment>,
}

impl NewItem {
    /// Create an uncategorized item.
    #[must_use]
    pub fn new(display_name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            reference: reference.into(),
            categories: Vec::new(),
        }
    }

    /// Assign a category at `level`, padding lower levels with uncategorized entries.
    #[must_use]
    pub fn with_category(mut self, level: usize, sort_order: f64, label: impl Into<String>) -> Self {
        set_level(
            &mut self.categories,
            level,
            CategoryAssignment::new(sort_order, label),
        );
        self
    }
}

/// A stored item.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Item {
    pub(crate) id: StableId,
    pub display_name: String,
    pub reference: String,
    pub(crate) categories: Vec<CategoryAssignment>,
    pub(crate) order_within_group: u32,
}

impl Item {
    pub(crate) fn from_new(id: StableId, new: NewItem) -> Self {
        Self {
            id,
            display_name: new.display_name,
            reference: new.reference,
            categories: new.categories,
            order_within_group: 0,
        }
    }

    /// Engine-assigned identity.
    #[must_use]
    pub fn id(&self) -> StableId {
        self.id
    }

    /// 1-based position within the item's group at the active grouping level.
    #[must_use]
    pub fn order_within_group(&self) -> u32 {
        self.order_within_group
    }

    /// All stored assignments, indexed by level.
    #[must_use]
    pub fn categories(&self) -> &[CategoryAssignment] {
        &self.categories
    }

    /// Label at `level`; absent entries read as uncategorized.
    #[must_use]
    pub fn label(&self, level: usize) -> &str {
        self.categories
            .get(level)
            .map_or(UNCATEGORIZED, |c| c.label.as_str())
    }

    /// Sort order at `level`; absent entries read as `0.0`.
    #[must_use]
    pub fn sort_order(&self, level: usize) -> f64 {
        self.categories.get(level).map_or(0.0, |c| c.sort_order)
    }

    /// True when every level's label is empty.
    #[must_use]
    pub fn is_uncategorized(&self) -> bool {
        self.categories.iter().all(CategoryAssignment::is_uncategorized)
    }

    pub(crate) fn set_category(&mut self, level: usize, assignment: CategoryAssignment) {
        set_level(&mut self.categories, level, assignment);
    }
}

fn set_level(categories: &mut Vec<CategoryAssignment>, level: usize, assignment: CategoryAssignment) {
    if categories.len() <= level {
        categories.resize_with(level + 1, CategoryAssignment::uncategorized);
    }
    categories[level] = assignment;
}
