#![forbid(unsafe_code)]

//! Virtual windowing over fixed-height rows.
//!
//! Only rows inside the visible window (plus a buffer on each side) are
//! materialized. The window is a pure function of the scroll fraction, the
//! row count, the row height, and the viewport height:
//!
//! ```text
//! top   = s * N * row_height
//! start = max(0, floor(top / row_height) - B)
//! end   = min(N, ceil((top + H) / row_height) + B + 1)
//! ```
//!
//! # Core Types
//!
//! - [`WindowConfig`] - row height, buffer, and activation threshold
//! - [`VisibleWindow`] - the half-open `[start, end)` row range
//! - [`SlotPool`] - recycles row handles through a [`SlotHost`]
//!
//! # Example
//!
//! ```
//! use ordlist_view::virtualized::compute_window;
//!
//! let w = compute_window(0.5, 1000, 30.0, 300.0, 2);
//! assert_eq!((w.start, w.end), (498, 513));
//! ```

use std::collections::BTreeMap;
use std::ops::Range;

/// Virtualization parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowConfig {
    /// Fixed row height in pixels (default: 30).
    pub row_height: f64,
    /// Extra rows materialized above and below the viewport (default: 5).
    pub buffer_rows: usize,
    /// Row count above which virtual mode activates (default: 100).
    pub threshold: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            row_height: 30.0,
            buffer_rows: 5,
            threshold: 100,
        }
    }
}

impl WindowConfig {
    #[must_use]
    pub fn with_row_height(mut self, px: f64) -> Self {
        self.row_height = px;
        self
    }

    #[must_use]
    pub fn with_buffer_rows(mut self, rows: usize) -> Self {
        self.buffer_rows = rows;
        self
    }

    #[must_use]
    pub fn with_threshold(mut self, rows: usize) -> Self {
        self.threshold = rows;
        self
    }

    /// Whether a list of `rows` rows should render virtually.
    ///
    /// Grouped views never virtualize: headers break the fixed-height model.
    #[must_use]
    pub fn should_virtualize(&self, rows: usize, grouped: bool) -> bool {
        !grouped && rows > self.threshold
    }

    /// The window for the given scroll position and viewport.
    #[must_use]
    pub fn window(&self, scroll_fraction: f64, rows: usize, viewport_height: f64) -> VisibleWindow {
        compute_window(
            scroll_fraction,
            rows,
            self.row_height,
            viewport_height,
            self.buffer_rows,
        )
    }
}

/// Half-open row range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct VisibleWindow {
    pub start: usize,
    pub end: usize,
}

impl VisibleWindow {
    /// An empty window.
    pub const EMPTY: Self = Self { start: 0, end: 0 };

    /// The window covering every row.
    #[must_use]
    pub const fn full(rows: usize) -> Self {
        Self { start: 0, end: rows }
    }

    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, row: usize) -> bool {
        self.range().contains(&row)
    }
}

/// Compute the visible window.
///
/// `scroll_fraction` is clamped to `[0, 1]` (NaN reads as 0). A zero or
/// negative row height yields an empty window.
#[must_use]
pub fn compute_window(
    scroll_fraction: f64,
    rows: usize,
    row_height: f64,
    viewport_height: f64,
    buffer: usize,
) -> VisibleWindow {
    if rows == 0 || row_height <= 0.0 || !row_height.is_finite() {
        return VisibleWindow::EMPTY;
    }
    let s = if scroll_fraction.is_nan() {
        0.0
    } else {
        scroll_fraction.clamp(0.0, 1.0)
    };
    let viewport = viewport_height.max(0.0);
    let top = s * rows as f64 * row_height;
    let first = (top / row_height).floor() as usize;
    let last = ((top + viewport) / row_height).ceil() as usize;
    let end = last.saturating_add(buffer).saturating_add(1).min(rows);
    let start = first.saturating_sub(buffer).min(end);
    VisibleWindow { start, end }
}

/// Absolute top of row `index`.
#[must_use]
pub fn row_top(index: usize, row_height: f64) -> f64 {
    index as f64 * row_height
}

/// Total scrollable height.
#[must_use]
pub fn content_height(rows: usize, row_height: f64) -> f64 {
    rows as f64 * row_height
}

/// Largest scroll fraction that still fills the viewport.
#[must_use]
pub fn max_scroll_fraction(content_height: f64, viewport_height: f64) -> f64 {
    if content_height <= viewport_height || content_height <= 0.0 {
        0.0
    } else {
        (content_height - viewport_height) / content_height
    }
}

/// Scroll fraction after moving the viewport by `delta_px`.
///
/// The result never scrolls past the last full viewport.
#[must_use]
pub fn scroll_by_pixels(
    scroll_fraction: f64,
    delta_px: f64,
    content_height: f64,
    viewport_height: f64,
) -> f64 {
    if content_height <= 0.0 {
        return 0.0;
    }
    let max_top = (content_height - viewport_height).max(0.0);
    let top = (scroll_fraction.clamp(0.0, 1.0) * content_height + delta_px).clamp(0.0, max_top);
    top / content_height
}

// ---------------------------------------------------------------------------
// Slot recycling
// ---------------------------------------------------------------------------

/// The render side of a [`SlotPool`].
///
/// A slot is a reusable row view owned by the host. The pool never destroys
/// slots; rows leaving the window are hidden and their handles reused.
pub trait SlotHost {
    /// Handle to a host-owned row view.
    type Handle;

    /// Create a fresh, hidden slot.
    fn create_slot(&mut self) -> Self::Handle;

    /// Show `slot` for `row`, positioned at absolute `top`.
    fn place_slot(&mut self, slot: &Self::Handle, row: usize, top: f64);

    /// Hide `slot` without destroying it.
    fn hide_slot(&mut self, slot: &Self::Handle);
}

/// What a [`SlotPool::sync`] call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotChanges {
    pub shown: usize,
    pub hidden: usize,
    pub created: usize,
}

impl SlotChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shown == 0 && self.hidden == 0
    }
}

/// Row handles keyed by row index, plus a free list of hidden handles.
#[derive(Debug)]
pub struct SlotPool<H> {
    active: BTreeMap<usize, H>,
    spare: Vec<H>,
    created: usize,
}

impl<H> Default for SlotPool<H> {
    fn default() -> Self {
        Self {
            active: BTreeMap::new(),
            spare: Vec::new(),
            created: 0,
        }
    }
}

impl<H> SlotPool<H> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently showing a slot.
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Number of hidden slots waiting for reuse.
    #[must_use]
    pub fn spare_len(&self) -> usize {
        self.spare.len()
    }

    /// Slots created over the pool's lifetime.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created
    }

    /// Rows currently showing a slot, ascending.
    pub fn active_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.active.keys().copied()
    }

    #[must_use]
    pub fn slot(&self, row: usize) -> Option<&H> {
        self.active.get(&row)
    }

    /// Bring the pool in line with `window`.
    ///
    /// Rows leaving the window are hidden first so their handles can serve
    /// rows entering it.
    pub fn sync<S>(&mut self, window: VisibleWindow, row_height: f64, host: &mut S) -> SlotChanges
    where
        S: SlotHost<Handle = H>,
    {
        let mut changes = SlotChanges::default();
        let leaving: Vec<usize> = self
            .active
            .keys()
            .copied()
            .filter(|row| !window.contains(*row))
            .collect();
        for row in leaving {
            if let Some(handle) = self.active.remove(&row) {
                host.hide_slot(&handle);
                self.spare.push(handle);
                changes.hidden += 1;
            }
        }
        for row in window.range() {
            if self.active.contains_key(&row) {
                continue;
            }
            let handle = match self.spare.pop() {
                Some(handle) => handle,
                None => {
                    self.created += 1;
                    changes.created += 1;
                    host.create_slot()
                }
            };
            host.place_slot(&handle, row, row_top(row, row_height));
            self.active.insert(row, handle);
            changes.shown += 1;
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(
            start = window.start,
            end = window.end,
            shown = changes.shown,
            hidden = changes.hidden,
            created = changes.created,
            "slot window synced"
        );
        changes
    }

    /// Re-place every active slot, for content changes under a fixed window.
    pub fn rebind_all<S>(&self, row_height: f64, host: &mut S)
    where
        S: SlotHost<Handle = H>,
    {
        for (&row, handle) in &self.active {
            host.place_slot(handle, row, row_top(row, row_height));
        }
    }

    /// Hide every active slot.
    pub fn release_all<S>(&mut self, host: &mut S) -> usize
    where
        S: SlotHost<Handle = H>,
    {
        let released = self.active.len();
        for (_, handle) in std::mem::take(&mut self.active) {
            host.hide_slot(&handle);
            self.spare.push(handle);
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Host {
        next: u32,
        placed: Vec<(u32, usize, f64)>,
        hidden: Vec<u32>,
    }

    impl SlotHost for Host {
        type Handle = u32;

        fn create_slot(&mut self) -> u32 {
            self.next += 1;
            self.next
        }

        fn place_slot(&mut self, slot: &u32, row: usize, top: f64) {
            self.placed.push((*slot, row, top));
        }

        fn hide_slot(&mut self, slot: &u32) {
            self.hidden.push(*slot);
        }
    }

    #[test]
    fn reference_window_brackets_midpoint() {
        let w = compute_window(0.5, 1000, 30.0, 300.0, 2);
        assert_eq!((w.start, w.end), (498, 513));
        assert!(w.contains(500));
    }

    #[test]
    fn window_clamps_at_edges() {
        let top = compute_window(0.0, 1000, 30.0, 300.0, 2);
        assert_eq!((top.start, top.end), (0, 13));
        let bottom = compute_window(1.0, 1000, 30.0, 300.0, 2);
        assert_eq!(bottom.end, 1000);
        assert_eq!(bottom.start, 998);
    }

    #[test]
    fn degenerate_inputs_are_empty_or_clamped() {
        assert!(compute_window(0.5, 0, 30.0, 300.0, 2).is_empty());
        assert!(compute_window(0.5, 10, 0.0, 300.0, 2).is_empty());
        assert_eq!(
            compute_window(f64::NAN, 10, 30.0, 300.0, 2),
            compute_window(0.0, 10, 30.0, 300.0, 2)
        );
        assert_eq!(compute_window(7.0, 10, 30.0, 90.0, 0).end, 10);
    }

    #[test]
    fn virtualization_threshold() {
        let config = WindowConfig::default();
        assert!(!config.should_virtualize(100, false));
        assert!(config.should_virtualize(101, false));
        assert!(!config.should_virtualize(10_000, true));
    }

    #[test]
    fn scroll_by_pixels_stops_at_last_viewport() {
        let s = scroll_by_pixels(0.0, 1e9, 1000.0, 200.0);
        assert!((s - 0.8).abs() < 1e-9);
        assert_eq!(s, max_scroll_fraction(1000.0, 200.0));
        assert_eq!(scroll_by_pixels(0.5, -1e9, 1000.0, 200.0), 0.0);
        assert_eq!(max_scroll_fraction(100.0, 200.0), 0.0);
    }

    #[test]
    fn pool_positions_rows_absolutely() {
        let mut host = Host::default();
        let mut pool = SlotPool::new();
        let changes = pool.sync(VisibleWindow { start: 3, end: 5 }, 30.0, &mut host);
        assert_eq!(changes.shown, 2);
        assert_eq!(host.placed, vec![(1, 3, 90.0), (2, 4, 120.0)]);
    }

    #[test]
    fn pool_recycles_hidden_slots() {
        let mut host = Host::default();
        let mut pool = SlotPool::new();
        for start in 0..50 {
            pool.sync(VisibleWindow { start, end: start + 10 }, 30.0, &mut host);
        }
        assert_eq!(pool.created(), 10);
        assert_eq!(pool.active_len(), 10);
        assert_eq!(pool.active_rows().next(), Some(49));

        let changes = pool.sync(VisibleWindow { start: 49, end: 59 }, 30.0, &mut host);
        assert!(changes.is_empty());
    }

    #[test]
    fn release_hides_everything() {
        let mut host = Host::default();
        let mut pool = SlotPool::new();
        pool.sync(VisibleWindow::full(4), 30.0, &mut host);
        assert_eq!(pool.release_all(&mut host), 4);
        assert_eq!(pool.spare_len(), 4);
        assert_eq!(host.hidden.len(), 4);
    }
}
