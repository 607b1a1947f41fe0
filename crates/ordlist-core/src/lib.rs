#![forbid(unsafe_code)]

//! Core: item store, category grouping, filtering, and selection.
//!
//! Everything here is synchronous and UI-agnostic. The store sequence is the
//! only persisted ordering; groups, visibility, and alignment are derived from
//! it on demand.

pub mod category;
pub mod error;
pub mod filter;
pub mod grouping;
pub mod id;
pub mod input;
pub mod item;
pub mod selection;
pub mod store;

pub use category::{CategoryLevel, CategoryModel};
pub use error::{EngineError, MoveOutcome, RejectReason, ReorderResult};
pub use filter::{FilterSpec, VisibilityCache};
pub use grouping::{AlignmentReport, Group, GroupBounds};
pub use id::StableId;
pub use input::{Modifiers, PointerEvent, PointerKind};
pub use item::{CategoryAssignment, Item, NewItem, UNCATEGORIZED};
pub use selection::Selection;
pub use store::ItemStore;
