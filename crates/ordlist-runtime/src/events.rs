#![forbid(unsafe_code)]

//! Observer events and the render sink contract.
//!
//! Events fire once per commit, after every derived view has been rebuilt
//! and before the single render of that commit. Observers therefore never
//! see a state the render sink has not been asked to draw.

use std::cell::RefCell;
use std::rc::Rc;

use ordlist_core::grouping::AlignmentReport;
use ordlist_core::id::StableId;
use ordlist_core::selection::Selection;
use ordlist_view::layout::Layout;
use ordlist_view::virtualized::{SlotChanges, SlotHost, VisibleWindow};

/// Receives engine notifications. Every method defaults to a no-op.
pub trait EngineObserver {
    /// The full item order changed.
    fn on_order_changed(&mut self, _order: &[StableId]) {}

    /// Item or group selection changed.
    fn on_selection_changed(&mut self, _items: &[StableId], _group: Option<&str>) {}

    /// The visible item count or the filter changed.
    fn on_filter_changed(&mut self, _visible: usize, _total: usize) {}

    /// The alignment state of the active grouping level flipped.
    fn on_alignment_changed(&mut self, _aligned: bool, _report: &AlignmentReport) {}

    /// Background loading progressed.
    fn on_load_progress(&mut self, _current: usize, _total: Option<usize>) {}
}

/// An owned copy of one notification.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    OrderChanged(Vec<StableId>),
    SelectionChanged {
        items: Vec<StableId>,
        group: Option<String>,
    },
    FilterChanged {
        visible: usize,
        total: usize,
    },
    AlignmentChanged {
        aligned: bool,
        offending: Vec<String>,
    },
    LoadProgress {
        current: usize,
        total: Option<usize>,
    },
}

/// Shared, cloneable event buffer filled by an [`EventRecorder`].
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<EngineEvent>>>);

impl EventLog {
    /// Take every recorded event.
    #[must_use]
    pub fn drain(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    fn push(&self, event: EngineEvent) {
        self.0.borrow_mut().push(event);
    }
}

/// Observer that records events into an [`EventLog`].
#[derive(Debug, Default)]
pub struct EventRecorder {
    log: EventLog,
}

impl EventRecorder {
    /// A recorder plus a handle to read what it records.
    #[must_use]
    pub fn new() -> (Self, EventLog) {
        let log = EventLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl EngineObserver for EventRecorder {
    fn on_order_changed(&mut self, order: &[StableId]) {
        self.log.push(EngineEvent::OrderChanged(order.to_vec()));
    }

    fn on_selection_changed(&mut self, items: &[StableId], group: Option<&str>) {
        self.log.push(EngineEvent::SelectionChanged {
            items: items.to_vec(),
            group: group.map(str::to_string),
        });
    }

    fn on_filter_changed(&mut self, visible: usize, total: usize) {
        self.log.push(EngineEvent::FilterChanged { visible, total });
    }

    fn on_alignment_changed(&mut self, aligned: bool, report: &AlignmentReport) {
        self.log.push(EngineEvent::AlignmentChanged {
            aligned,
            offending: report.offending_labels.iter().cloned().collect(),
        });
    }

    fn on_load_progress(&mut self, current: usize, total: Option<usize>) {
        self.log.push(EngineEvent::LoadProgress { current, total });
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// How the sink should apply a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Lay out every row sequentially, rebuilding headers.
    Full,
    /// Only rows in `window` are live; slots were synced before this call.
    Virtual {
        window: VisibleWindow,
        changes: SlotChanges,
    },
    /// Same rows and headers as the last frame; reposition item rows only.
    Repack,
}

/// Everything the sink needs to draw one consistent state.
#[derive(Debug, Clone, Copy)]
pub struct RenderFrame<'a> {
    /// Store version the frame was derived from.
    pub version: u64,
    pub mode: RenderMode,
    pub layout: &'a Layout,
    pub selection: &'a Selection,
    pub hover: Option<StableId>,
    /// Drop gap in the full sequence (item drags) or among groups (group drags).
    pub drop_indicator: Option<usize>,
    /// False while grouped and misaligned; the host disables reordering UI.
    pub reorder_enabled: bool,
    /// Pixel offset of the viewport into the content.
    pub scroll_top: f64,
}

/// The presentation layer.
///
/// A sink owns row views ("slots") through [`SlotHost`], which the engine's
/// slot pool drives in virtual mode, and draws frames.
pub trait RenderSink: SlotHost {
    /// Draw `frame`. Called exactly once per commit.
    fn present(&mut self, frame: &RenderFrame<'_>);
}
