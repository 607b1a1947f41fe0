#![forbid(unsafe_code)]

//! Drag gesture state and drop-target geometry.
//!
//! A drag starts as a pointer press and only arms once the pointer has moved
//! past [`DragConfig::threshold_px`]; a release before that is a click. While
//! armed, the pointer's y coordinate is mapped to a drop gap:
//!
//! - item drags map against the rendered item slots ([`drop_index_flat`]),
//!   whose indices are positions in the *full* sequence, so hidden items are
//!   skipped without any translation by the caller;
//! - group drags map against whole group blocks ([`drop_index_groups`]).
//!
//! ## Invariants
//!
//! 1. A session is armed at most once and never disarms.
//! 2. Drop gaps from [`drop_index_flat`] lie in `first.index..=last.index + 1`
//!    of the slots given.
//! 3. [`edge_scroll_speed`] is zero outside the margin bands and its
//!    magnitude never exceeds [`DragConfig::max_edge_speed`].

use ordlist_core::id::StableId;
use ordlist_core::input::PointerEvent;

// ---------------------------------------------------------------------------
// DragConfig
// ---------------------------------------------------------------------------

/// Drag gesture and auto-scroll tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragConfig {
    /// Pointer travel in pixels before a press becomes a drag (default: 5).
    pub threshold_px: f64,
    /// Height of the auto-scroll bands at the viewport edges (default: 40).
    pub edge_margin_px: f64,
    /// Auto-scroll speed at full band penetration, pixels per tick (default: 12).
    pub max_edge_speed: u32,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            threshold_px: 5.0,
            edge_margin_px: 40.0,
            max_edge_speed: 12,
        }
    }
}

impl DragConfig {
    #[must_use]
    pub fn with_threshold(mut self, px: f64) -> Self {
        self.threshold_px = px;
        self
    }

    #[must_use]
    pub fn with_edge_margin(mut self, px: f64) -> Self {
        self.edge_margin_px = px;
        self
    }

    #[must_use]
    pub fn with_max_edge_speed(mut self, speed: u32) -> Self {
        self.max_edge_speed = speed;
        self
    }
}

// ---------------------------------------------------------------------------
// DragSession
// ---------------------------------------------------------------------------

/// What is being dragged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DragKind {
    /// A block of items, in store order.
    Items(Vec<StableId>),
    /// A group header and its block.
    Group(String),
}

/// A pointer press that may become a drag.
#[derive(Clone, Debug)]
pub struct DragSession {
    pub kind: DragKind,
    pub start: PointerEvent,
    pub current: PointerEvent,
    armed: bool,
    /// Last computed drop gap, if the pointer is over a target.
    pub drop_index: Option<usize>,
}

impl DragSession {
    #[must_use]
    pub fn new(kind: DragKind, start: PointerEvent) -> Self {
        Self {
            kind,
            start,
            current: start,
            armed: false,
            drop_index: None,
        }
    }

    /// Track a pointer move. Returns true when this move armed the drag.
    pub fn update(&mut self, event: PointerEvent, config: &DragConfig) -> bool {
        self.current = event;
        if !self.armed && self.distance() >= config.threshold_px {
            self.armed = true;
            return true;
        }
        false
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Euclidean distance travelled since the press.
    #[must_use]
    pub fn distance(&self) -> f64 {
        self.start.distance_to(&self.current)
    }

    /// `(dx, dy)` since the press.
    #[must_use]
    pub fn delta(&self) -> (f64, f64) {
        (self.current.x - self.start.x, self.current.y - self.start.y)
    }
}

// ---------------------------------------------------------------------------
// Drop geometry
// ---------------------------------------------------------------------------

/// A rendered item row: its full-sequence index and vertical extent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlotGeometry {
    pub index: usize,
    pub top: f64,
    pub height: f64,
}

impl SlotGeometry {
    #[must_use]
    pub fn center(&self) -> f64 {
        self.top + self.height / 2.0
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Map a pointer y to a gap in the full sequence.
///
/// `slots` are the rendered item rows in render order. Above the first slot
/// the gap is that slot's index; otherwise it is the index of the first slot
/// whose center lies below the pointer, or one past the last slot.
#[must_use]
pub fn drop_index_flat(slots: &[SlotGeometry], y: f64) -> Option<usize> {
    let first = slots.first()?;
    if y < first.top {
        return Some(first.index);
    }
    slots
        .iter()
        .find(|slot| slot.center() > y)
        .map(|slot| slot.index)
        .or_else(|| slots.last().map(|last| last.index + 1))
}

/// A rendered group: header top to last member bottom.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupBlock {
    pub label: String,
    pub top: f64,
    pub bottom: f64,
}

impl GroupBlock {
    #[must_use]
    pub fn center(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }
}

/// Map a pointer y to a gap among `blocks` (`0..=blocks.len()`).
#[must_use]
pub fn drop_index_groups(blocks: &[GroupBlock], y: f64) -> Option<usize> {
    let first = blocks.first()?;
    if y < first.top {
        return Some(0);
    }
    Some(
        blocks
            .iter()
            .position(|block| block.center() > y)
            .unwrap_or(blocks.len()),
    )
}

/// Auto-scroll speed for a pointer at `y` within a viewport of `viewport_height`.
///
/// Negative scrolls up. Proportional to how deep the pointer sits inside the
/// edge band, at least 1 once inside it.
#[must_use]
pub fn edge_scroll_speed(y: f64, viewport_height: f64, config: &DragConfig) -> i32 {
    let margin = config.edge_margin_px.min(viewport_height / 2.0);
    if margin <= 0.0 || config.max_edge_speed == 0 {
        return 0;
    }
    let max = f64::from(config.max_edge_speed);
    let speed = |penetration: f64| -> i32 {
        let depth = (penetration / margin).clamp(0.0, 1.0);
        (depth * max).ceil().clamp(1.0, max) as i32
    };
    if y < margin {
        -speed(margin - y)
    } else if y > viewport_height - margin {
        speed(y - (viewport_height - margin))
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(indices: &[usize], row: f64) -> Vec<SlotGeometry> {
        indices
            .iter()
            .enumerate()
            .map(|(i, &index)| SlotGeometry {
                index,
                top: 10.0 + i as f64 * row,
                height: row,
            })
            .collect()
    }

    #[test]
    fn session_arms_past_threshold_once() {
        let config = DragConfig::default();
        let mut s = DragSession::new(DragKind::Group("A".into()), PointerEvent::down(0.0, 0.0));
        assert!(!s.update(PointerEvent::moved(3.0, 0.0), &config));
        assert!(!s.is_armed());
        assert!(s.update(PointerEvent::moved(3.0, 4.0), &config));
        assert!(!s.update(PointerEvent::moved(30.0, 40.0), &config));
        assert!(s.is_armed());
        assert_eq!(s.delta(), (30.0, 40.0));
    }

    #[test]
    fn flat_drop_index_uses_slot_centers() {
        let rows = slots(&[0, 1, 2], 30.0);
        assert_eq!(drop_index_flat(&rows, 0.0), Some(0));
        assert_eq!(drop_index_flat(&rows, 20.0), Some(0));
        assert_eq!(drop_index_flat(&rows, 30.0), Some(1));
        assert_eq!(drop_index_flat(&rows, 1000.0), Some(3));
        assert_eq!(drop_index_flat(&[], 5.0), None);
    }

    #[test]
    fn flat_drop_index_skips_hidden_items() {
        // Items 1, 2 and 4 are filtered out.
        let rows = slots(&[0, 3, 5], 30.0);
        assert_eq!(drop_index_flat(&rows, 30.0), Some(3));
        assert_eq!(drop_index_flat(&rows, 80.0), Some(5));
        assert_eq!(drop_index_flat(&rows, 99.0), Some(6));
    }

    #[test]
    fn group_drop_index() {
        let blocks = vec![
            GroupBlock { label: "A".into(), top: 0.0, bottom: 100.0 },
            GroupBlock { label: "B".into(), top: 100.0, bottom: 140.0 },
        ];
        assert_eq!(drop_index_groups(&blocks, 10.0), Some(0));
        assert_eq!(drop_index_groups(&blocks, 60.0), Some(1));
        assert_eq!(drop_index_groups(&blocks, 130.0), Some(2));
        assert_eq!(drop_index_groups(&[], 0.0), None);
    }

    #[test]
    fn edge_scroll_is_proportional_and_clamped() {
        let config = DragConfig::default();
        assert_eq!(edge_scroll_speed(200.0, 400.0, &config), 0);
        assert_eq!(edge_scroll_speed(39.9, 400.0, &config), -1);
        assert_eq!(edge_scroll_speed(20.0, 400.0, &config), -6);
        assert_eq!(edge_scroll_speed(-50.0, 400.0, &config), -12);
        assert_eq!(edge_scroll_speed(400.0, 400.0, &config), 12);
        assert_eq!(edge_scroll_speed(1.0, 0.0, &config), 0);
    }
}
