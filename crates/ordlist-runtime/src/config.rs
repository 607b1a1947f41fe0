#![forbid(unsafe_code)]

//! Engine configuration.
//!
//! [`EngineConfig`] carries every tunable of the engine. It can be built in
//! code with `with_*` methods or read from the environment.
//!
//! # Env Var Contract
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `ORDLIST_ROW_HEIGHT` | `row_height` | 30 |
//! | `ORDLIST_HEADER_HEIGHT` | `header_height` | 30 |
//! | `ORDLIST_BUFFER_ROWS` | `buffer_rows` | 5 |
//! | `ORDLIST_VIRTUALIZE_THRESHOLD` | `virtualize_threshold` | 100 |
//! | `ORDLIST_DRAG_THRESHOLD` | `drag_threshold_px` | 5 |
//! | `ORDLIST_EDGE_MARGIN` | `edge_margin_px` | 40 |
//! | `ORDLIST_EDGE_MAX_SPEED` | `max_edge_speed` | 12 |
//! | `ORDLIST_SCROLL_DEBOUNCE_MS` | `scroll_debounce` | 16 |
//! | `ORDLIST_SEARCH_DEBOUNCE_MS` | `search_debounce` | 300 |
//!
//! # Invariants
//!
//! - Unset variables keep their defaults.
//! - Unparseable values keep their defaults and are logged at `warn`.
//! - Range checks happen in [`EngineConfig::validate`], not while parsing.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use ordlist_view::coalescer::{SCROLL_DEBOUNCE, SEARCH_DEBOUNCE};
use ordlist_view::drag::DragConfig;
use ordlist_view::layout::RowMetrics;
use ordlist_view::virtualized::WindowConfig;

/// Engine tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Item row height in pixels.
    pub row_height: f64,
    /// Group header height in pixels.
    pub header_height: f64,
    /// Rows materialized beyond each viewport edge in virtual mode.
    pub buffer_rows: usize,
    /// Row count above which the flat view virtualizes.
    pub virtualize_threshold: usize,
    /// Pointer travel before a press becomes a drag.
    pub drag_threshold_px: f64,
    /// Auto-scroll band height at the viewport edges.
    pub edge_margin_px: f64,
    /// Auto-scroll speed cap, pixels per tick.
    pub max_edge_speed: u32,
    /// Scroll position coalescing delay.
    pub scroll_debounce: Duration,
    /// Search text coalescing delay.
    pub search_debounce: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let window = WindowConfig::default();
        let drag = DragConfig::default();
        Self {
            row_height: window.row_height,
            header_height: window.row_height,
            buffer_rows: window.buffer_rows,
            virtualize_threshold: window.threshold,
            drag_threshold_px: drag.threshold_px,
            edge_margin_px: drag.edge_margin_px,
            max_edge_speed: drag.max_edge_speed,
            scroll_debounce: SCROLL_DEBOUNCE,
            search_debounce: SEARCH_DEBOUNCE,
        }
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A pixel size must be finite and strictly positive.
    NonPositive { field: &'static str, value: f64 },
    /// A pixel distance must be finite and not negative.
    Negative { field: &'static str, value: f64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositive { field, value } => {
                write!(f, "{field} must be a positive number, got {value}")
            }
            Self::Negative { field, value } => {
                write!(f, "{field} must not be negative, got {value}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl EngineConfig {
    #[must_use]
    pub fn with_row_height(mut self, px: f64) -> Self {
        self.row_height = px;
        self
    }

    #[must_use]
    pub fn with_header_height(mut self, px: f64) -> Self {
        self.header_height = px;
        self
    }

    #[must_use]
    pub fn with_buffer_rows(mut self, rows: usize) -> Self {
        self.buffer_rows = rows;
        self
    }

    #[must_use]
    pub fn with_virtualize_threshold(mut self, rows: usize) -> Self {
        self.virtualize_threshold = rows;
        self
    }

    #[must_use]
    pub fn with_drag_threshold(mut self, px: f64) -> Self {
        self.drag_threshold_px = px;
        self
    }

    #[must_use]
    pub fn with_edge_scroll(mut self, margin_px: f64, max_speed: u32) -> Self {
        self.edge_margin_px = margin_px;
        self.max_edge_speed = max_speed;
        self
    }

    #[must_use]
    pub fn with_debounce(mut self, scroll: Duration, search: Duration) -> Self {
        self.scroll_debounce = scroll;
        self.search_debounce = search;
        self
    }

    /// Read `ORDLIST_*` variables over the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`EngineConfig::from_env`], with an explicit variable source.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        read_var(&lookup, "ORDLIST_ROW_HEIGHT", &mut config.row_height);
        read_var(&lookup, "ORDLIST_HEADER_HEIGHT", &mut config.header_height);
        read_var(&lookup, "ORDLIST_BUFFER_ROWS", &mut config.buffer_rows);
        read_var(&lookup, "ORDLIST_VIRTUALIZE_THRESHOLD", &mut config.virtualize_threshold);
        read_var(&lookup, "ORDLIST_DRAG_THRESHOLD", &mut config.drag_threshold_px);
        read_var(&lookup, "ORDLIST_EDGE_MARGIN", &mut config.edge_margin_px);
        read_var(&lookup, "ORDLIST_EDGE_MAX_SPEED", &mut config.max_edge_speed);

        let mut scroll_ms = duration_ms(config.scroll_debounce);
        read_var(&lookup, "ORDLIST_SCROLL_DEBOUNCE_MS", &mut scroll_ms);
        config.scroll_debounce = Duration::from_millis(scroll_ms);
        let mut search_ms = duration_ms(config.search_debounce);
        read_var(&lookup, "ORDLIST_SEARCH_DEBOUNCE_MS", &mut search_ms);
        config.search_debounce = Duration::from_millis(search_ms);
        config
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first field that is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("row_height", self.row_height)?;
        positive("header_height", self.header_height)?;
        non_negative("drag_threshold_px", self.drag_threshold_px)?;
        non_negative("edge_margin_px", self.edge_margin_px)?;
        Ok(())
    }

    #[must_use]
    pub fn window(&self) -> WindowConfig {
        WindowConfig::default()
            .with_row_height(self.row_height)
            .with_buffer_rows(self.buffer_rows)
            .with_threshold(self.virtualize_threshold)
    }

    #[must_use]
    pub fn drag(&self) -> DragConfig {
        DragConfig::default()
            .with_threshold(self.drag_threshold_px)
            .with_edge_margin(self.edge_margin_px)
            .with_max_edge_speed(self.max_edge_speed)
    }

    #[must_use]
    pub fn metrics(&self) -> RowMetrics {
        RowMetrics {
            row_height: self.row_height,
            header_height: self.header_height,
        }
    }
}

fn read_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable config value"),
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}
