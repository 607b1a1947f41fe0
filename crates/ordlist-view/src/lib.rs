#![forbid(unsafe_code)]

//! View-side geometry: virtual windows, slot recycling, drag targets, and
//! row layout.
//!
//! Nothing in this crate mutates the item store. It turns derived views into
//! rows and pixels, and pixels back into store positions.

pub mod coalescer;
pub mod drag;
pub mod layout;
pub mod virtualized;

pub use coalescer::Debouncer;
pub use drag::{DragConfig, DragKind, DragSession, GroupBlock, SlotGeometry};
pub use layout::{Layout, Row, RowMetrics};
pub use virtualized::{SlotChanges, SlotHost, SlotPool, VisibleWindow, WindowConfig};
