#![forbid(unsafe_code)]

//! ordlist public facade crate.
//!
//! This crate provides the stable surface area for hosts embedding the list
//! engine. It re-exports common types from the internal crates and offers a
//! prelude for day-to-day usage.

// --- Core re-exports -------------------------------------------------------

pub use ordlist_core::{
    AlignmentReport, CategoryAssignment, CategoryLevel, CategoryModel, EngineError, FilterSpec,
    Group, Item, Modifiers, MoveOutcome, NewItem, PointerEvent, PointerKind, RejectReason,
    ReorderResult, Selection, StableId, UNCATEGORIZED,
};

// --- View re-exports -------------------------------------------------------

pub use ordlist_view::{Layout, Row, RowMetrics, SlotChanges, SlotHost, VisibleWindow};

// --- Runtime re-exports ----------------------------------------------------

pub use ordlist_runtime::{
    ConfigError, Engine, EngineConfig, EngineEvent, EngineObserver, EventLog, EventRecorder,
    ItemSource, LoadError, RenderFrame, RenderMode, RenderSink, VecSource,
};
#[cfg(feature = "subscriber")]
pub use ordlist_runtime::init_subscriber;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        CategoryLevel, CategoryModel, Engine, EngineConfig, EngineObserver, FilterSpec,
        Modifiers, NewItem, PointerEvent, RenderFrame, RenderSink, ReorderResult, SlotHost,
        StableId,
    };

    pub use crate::{core, runtime, view};
}

pub use ordlist_core as core;
pub use ordlist_runtime as runtime;
pub use ordlist_view as view;
