#![forbid(unsafe_code)]

//! Visibility filtering.
//!
//! A [`FilterSpec`] never mutates the store; it only decides which items are
//! visible. Category criteria are ORed: an item is visible if it matches any
//! allowed `(level, label)` pair, or is fully uncategorized while
//! "show uncategorized" is set. An optional search term narrows the result
//! further (ANDed with the category criteria).
//!
//! [`VisibilityCache`] memoizes the visible index list keyed on the store
//! version and the filter fingerprint, so repeated queries between commits
//! are free.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::item::Item;
use crate::store::ItemStore;

/// Which items are visible.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FilterSpec {
    /// Allowed labels, keyed by level.
    allowed: BTreeMap<usize, BTreeSet<String>>,
    uncategorized: bool,
    search: Option<String>,
}

impl FilterSpec {
    /// Show every item.
    #[must_use]
    pub fn show_all() -> Self {
        Self::default()
    }

    /// Show only fully uncategorized items.
    #[must_use]
    pub fn uncategorized() -> Self {
        Self {
            uncategorized: true,
            ..Self::default()
        }
    }

    /// Allow one more `(level, label)` pair.
    #[must_use]
    pub fn allow(mut self, level: usize, label: impl Into<String>) -> Self {
        self.allowed.entry(level).or_default().insert(label.into());
        self
    }

    /// Also include fully uncategorized items.
    #[must_use]
    pub fn with_uncategorized(mut self, include: bool) -> Self {
        self.uncategorized = include;
        self
    }

    /// Restrict to items whose name or reference contains `term` (case-insensitive).
    ///
    /// A blank term clears the search.
    #[must_use]
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        let term = term.into().trim().to_lowercase();
        self.search = (!term.is_empty()).then_some(term);
        self
    }

    /// The active search term, lowercased.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// True when no criterion restricts visibility.
    #[must_use]
    pub fn is_show_all(&self) -> bool {
        !self.has_category_criteria() && self.search.is_none()
    }

    fn has_category_criteria(&self) -> bool {
        self.uncategorized || !self.allowed.is_empty()
    }

    /// Stable hash of the criteria, used as a cache key.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Decide whether one item passes `spec`. O(levels) per item.
#[must_use]
pub fn is_visible(item: &Item, spec: &FilterSpec) -> bool {
    if spec.has_category_criteria() {
        let uncategorized_match = spec.uncategorized && item.is_uncategorized();
        let label_match = || {
            item.categories()
                .iter()
                .enumerate()
                .filter(|(_, c)| !c.is_uncategorized())
                .any(|(level, c)| {
                    spec.allowed
                        .get(&level)
                        .is_some_and(|labels| labels.contains(c.label.as_str()))
                })
        };
        if !uncategorized_match && !label_match() {
            return false;
        }
    }
    match &spec.search {
        None => true,
        Some(term) => {
            item.display_name.to_lowercase().contains(term.as_str())
                || item.reference.to_lowercase().contains(term.as_str())
        }
    }
}

/// Indices of the visible items, in store order.
#[must_use]
pub fn visible_indices(items: &[Item], spec: &FilterSpec) -> Vec<usize> {
    if spec.is_show_all() {
        return (0..items.len()).collect();
    }
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| is_visible(item, spec))
        .map(|(i, _)| i)
        .collect()
}

/// Visible indices memoized on `(store version, filter fingerprint)`.
#[derive(Debug, Clone, Default)]
pub struct VisibilityCache {
    key: Option<(u64, u64)>,
    visible: Vec<usize>,
}

impl VisibilityCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Visible indices for the current store state, recomputed only when stale.
    pub fn visible(&mut self, store: &ItemStore, spec: &FilterSpec) -> &[usize] {
        let key = (store.version(), spec.fingerprint());
        if self.key != Some(key) {
            self.visible = visible_indices(store.all(), spec);
            self.key = Some(key);
            tracing::trace!(
                version = key.0,
                visible = self.visible.len(),
                total = store.len(),
                "visibility recomputed"
            );
        }
        &self.visible
    }

    /// True when the cached result matches the given store version and filter.
    #[must_use]
    pub fn is_current(&self, store: &ItemStore, spec: &FilterSpec) -> bool {
        self.key == Some((store.version(), spec.fingerprint()))
    }

    /// Drop the cached result.
    pub fn invalidate(&mut self) {
        self.key = None;
    }
}
