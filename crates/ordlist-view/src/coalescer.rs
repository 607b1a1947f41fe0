#![forbid(unsafe_code)]

//! Trailing-edge debouncing for high-frequency inputs.
//!
//! Scroll positions and search text arrive far faster than it is worth
//! recomputing derived views. A [`Debouncer`] keeps only the latest value and
//! releases it once no newer value has arrived for `delay`. The final value
//! of a burst is always released, either by [`Debouncer::poll`] after the
//! delay or by an explicit [`Debouncer::flush`].
//!
//! Time is passed in explicitly so the host's event loop (and tests) own the
//! clock.
//!
//! ```
//! use std::time::{Duration, Instant};
//! use ordlist_view::coalescer::Debouncer;
//!
//! let start = Instant::now();
//! let mut search = Debouncer::new(Duration::from_millis(300));
//! search.push("g", start);
//! search.push("ga", start + Duration::from_millis(100));
//! assert_eq!(search.poll(start + Duration::from_millis(200)), None);
//! assert_eq!(search.poll(start + Duration::from_millis(400)), Some("ga"));
//! ```

use std::time::{Duration, Instant};

/// Default scroll coalescing delay: one animation frame.
pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(16);

/// Default search-text coalescing delay.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Latest-wins trailing-edge debouncer.
///
/// Not thread-safe; owned by the single event-processing thread.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
    coalesced: u64,
}

impl<T> Debouncer<T> {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            coalesced: 0,
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Values replaced by a newer one before release.
    #[must_use]
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    /// When the pending value becomes due, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at + self.delay)
    }

    /// Record a new value, replacing any pending one.
    pub fn push(&mut self, value: T, now: Instant) {
        if self.pending.is_some() {
            self.coalesced += 1;
        }
        self.pending = Some((value, now));
    }

    /// Release the pending value if its quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let due = self.deadline().is_some_and(|deadline| now >= deadline);
        if due { self.flush() } else { None }
    }

    /// Release the pending value immediately.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    /// Drop the pending value.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
