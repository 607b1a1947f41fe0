#![forbid(unsafe_code)]

//! ordlist runtime
//!
//! This crate ties the item store (`ordlist-core`) and the view geometry
//! (`ordlist-view`) into one engine that owns all state, commits mutations
//! atomically, and drives a host-supplied render sink.
//!
//! # Key Components
//!
//! - [`Engine`] - Commit engine: store, selection, grouping, filter, drag, scroll
//! - [`EngineConfig`] - Tunables, from code or `ORDLIST_*` variables
//! - [`EngineObserver`] - Order, selection, filter, alignment, and load notifications
//! - [`RenderSink`] - Presentation contract, one frame per commit
//! - [`Loader`] - Background item loading over a channel
//!
//! # Flow
//! Host input (pointer events, clicks, search text, scroll) goes into the
//! engine. Each accepted mutation rebuilds derived views once, notifies
//! observers, and presents one [`RenderFrame`]. Debounced input is applied
//! from [`Engine::tick`]; loaded items from [`Engine::pump_loader`].

pub mod config;
pub mod engine;
pub mod events;
pub mod loader;
pub mod logging;

pub use config::{ConfigError, EngineConfig};
pub use engine::{Engine, EngineState};
pub use events::{
    EngineEvent, EngineObserver, EventLog, EventRecorder, RenderFrame, RenderMode, RenderSink,
};
pub use loader::{ItemSource, LoadError, LoadMessage, Loader, VecSource};
#[cfg(feature = "subscriber")]
pub use logging::init_subscriber;
pub use logging::LoggingError;
