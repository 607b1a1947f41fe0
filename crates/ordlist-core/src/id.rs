#![forbid(unsafe_code)]

//! Stable item identity.
//!
//! Positions change under filtering and reordering, so every item carries an
//! engine-assigned [`StableId`]. Ids are handed out by an [`IdAllocator`] in
//! strictly increasing order and are never reused, even after removal.

use std::fmt;

/// Opaque, immutable handle for an item.
///
/// Drag, selection and filter logic refer to items exclusively through this
/// id, never through positional indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StableId(u64);

impl StableId {
    /// Raw numeric value, for hosts that need to key their own tables.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic id source owned by one item store.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    /// Create an allocator starting at id 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id.
    pub fn allocate(&mut self) -> StableId {
        let id = StableId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }

    /// Number of ids handed out so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.next - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut alloc = IdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let c = alloc.allocate();
        assert!(a < b && b < c);
        assert_eq!(alloc.issued(), 3);
    }

    #[test]
    fn display_is_prefixed() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.allocate().to_string(), "#1");
    }
}
