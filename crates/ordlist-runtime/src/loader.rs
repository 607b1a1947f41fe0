#![forbid(unsafe_code)]

//! Background item loading.
//!
//! Producing thousands of items (parsing reports, scanning files) must not
//! block the UI thread. An [`ItemSource`] runs on a worker thread and sends
//! batches and progress through an mpsc channel; the UI thread drains the
//! channel with [`Loader::drain`] (usually via `Engine::pump_loader`) and
//! applies everything it received in one commit.
//!
//! # How it works
//!
//! 1. [`Loader::start`] bumps the generation, stops any running load, and
//!    spawns a worker for the new source.
//! 2. The worker stamps every message with its generation and checks its
//!    stop flag between batches.
//! 3. [`Loader::drain`] drops messages whose generation is not current, so a
//!    superseded or cancelled load never reaches the store.

use std::fmt;
use std::sync::mpsc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use ordlist_core::item::NewItem;

/// Error reported by an [`ItemSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError(pub String);

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item load failed: {}", self.0)
    }
}

impl std::error::Error for LoadError {}

/// A producer of items, run on a worker thread.
pub trait ItemSource: Send + 'static {
    /// Expected item count, if known up front.
    fn total_hint(&self) -> Option<usize> {
        None
    }

    /// The next batch, or `None` when exhausted.
    ///
    /// # Errors
    ///
    /// A failure ends the load; already delivered batches stay delivered.
    fn next_batch(&mut self) -> Result<Option<Vec<NewItem>>, LoadError>;
}

/// An in-memory source delivering fixed-size batches.
#[derive(Debug, Clone)]
pub struct VecSource {
    items: std::vec::IntoIter<NewItem>,
    batch: usize,
    total: usize,
}

impl VecSource {
    #[must_use]
    pub fn new(items: Vec<NewItem>, batch: usize) -> Self {
        Self {
            total: items.len(),
            items: items.into_iter(),
            batch: batch.max(1),
        }
    }
}

impl ItemSource for VecSource {
    fn total_hint(&self) -> Option<usize> {
        Some(self.total)
    }

    fn next_batch(&mut self) -> Result<Option<Vec<NewItem>>, LoadError> {
        let batch: Vec<NewItem> = self.items.by_ref().take(self.batch).collect();
        Ok((!batch.is_empty()).then_some(batch))
    }
}

/// A message from the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadMessage {
    Batch(Vec<NewItem>),
    Progress { current: usize, total: Option<usize> },
    Finished { loaded: usize },
    Failed(LoadError),
}

/// Worker side of a stop flag.
#[derive(Clone)]
struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    fn new() -> (Self, StopTrigger) {
        let stopped = Arc::new(AtomicBool::new(false));
        (
            Self {
                stopped: Arc::clone(&stopped),
            },
            StopTrigger { stopped },
        )
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Loader side of a stop flag.
struct StopTrigger {
    stopped: Arc<AtomicBool>,
}

impl StopTrigger {
    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

struct RunningLoad {
    trigger: StopTrigger,
    thread: Option<thread::JoinHandle<()>>,
}

impl RunningLoad {
    fn stop(mut self) {
        self.trigger.stop();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RunningLoad {
    fn drop(&mut self) {
        self.trigger.stop();
    }
}

/// Owns the worker thread and the receiving end of its channel.
pub struct Loader {
    sender: mpsc::Sender<(u64, LoadMessage)>,
    receiver: mpsc::Receiver<(u64, LoadMessage)>,
    generation: u64,
    running: Option<RunningLoad>,
    finished: bool,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("generation", &self.generation)
            .field("running", &self.running.is_some())
            .field("finished", &self.finished)
            .finish()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            generation: 0,
            running: None,
            finished: false,
        }
    }

    /// Generation of the current (or last) load.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True from `start` until its terminal message has been drained.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.running.is_some() && !self.finished
    }

    /// Start loading from `source`, superseding any running load.
    pub fn start<S: ItemSource>(&mut self, mut source: S) -> u64 {
        self.cancel();
        self.generation += 1;
        self.finished = false;
        let generation = self.generation;
        let sender = self.sender.clone();
        let (signal, trigger) = StopSignal::new();
        tracing::debug!(generation, total = ?source.total_hint(), "item load started");

        let thread = thread::spawn(move || {
            let total = source.total_hint();
            let mut loaded = 0usize;
            loop {
                if signal.is_stopped() {
                    return;
                }
                let message = match source.next_batch() {
                    Ok(Some(batch)) => {
                        loaded += batch.len();
                        LoadMessage::Batch(batch)
                    }
                    Ok(None) => LoadMessage::Finished { loaded },
                    Err(err) => LoadMessage::Failed(err),
                };
                let terminal = !matches!(message, LoadMessage::Batch(_));
                if sender.send((generation, message)).is_err() {
                    return;
                }
                if terminal {
                    return;
                }
                let progress = LoadMessage::Progress {
                    current: loaded,
                    total,
                };
                if sender.send((generation, progress)).is_err() {
                    return;
                }
            }
        });

        self.running = Some(RunningLoad {
            trigger,
            thread: Some(thread),
        });
        generation
    }

    /// Stop the running load. Its undelivered messages are discarded.
    pub fn cancel(&mut self) {
        if let Some(running) = self.running.take() {
            tracing::debug!(generation = self.generation, "item load cancelled");
            running.stop();
        }
        // Anything still queued belongs to a dead generation.
        self.generation += 1;
    }

    /// Drain current-generation messages without blocking.
    pub fn drain(&mut self) -> Vec<LoadMessage> {
        let mut messages = Vec::new();
        while let Ok((generation, message)) = self.receiver.try_recv() {
            if generation != self.generation {
                continue;
            }
            if matches!(message, LoadMessage::Finished { .. } | LoadMessage::Failed(_)) {
                self.finished = true;
            }
            messages.push(message);
        }
        messages
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn items(n: usize) -> Vec<NewItem> {
        (0..n).map(|i| NewItem::new(format!("p{i}"), "")).collect()
    }

    fn drain_until_done(loader: &mut Loader) -> Vec<LoadMessage> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut all = Vec::new();
        while loader.is_active() && Instant::now() < deadline {
            all.extend(loader.drain());
            thread::sleep(Duration::from_millis(1));
        }
        all
    }

    #[test]
    fn delivers_batches_progress_and_finish() {
        let mut loader = Loader::new();
        loader.start(VecSource::new(items(10), 4));
        let messages = drain_until_done(&mut loader);
        let batches: Vec<usize> = messages
            .iter()
            .filter_map(|m| match m {
                LoadMessage::Batch(b) => Some(b.len()),
                _ => None,
            })
            .collect();
        assert_eq!(batches, vec![4, 4, 2]);
        assert!(messages.contains(&LoadMessage::Progress { current: 10, total: Some(10) }));
        assert_eq!(messages.last(), Some(&LoadMessage::Finished { loaded: 10 }));
    }

    #[test]
    fn superseded_load_is_ignored() {
        struct Slow;
        impl ItemSource for Slow {
            fn next_batch(&mut self) -> Result<Option<Vec<NewItem>>, LoadError> {
                thread::sleep(Duration::from_millis(5));
                Ok(Some(vec![NewItem::new("stale", "")]))
            }
        }

        let mut loader = Loader::new();
        let first = loader.start(Slow);
        let second = loader.start(VecSource::new(items(3), 10));
        assert!(second > first);
        let messages = drain_until_done(&mut loader);
        assert!(messages.iter().all(|m| match m {
            LoadMessage::Batch(b) => b.iter().all(|i| i.display_name != "stale"),
            _ => true,
        }));
        assert_eq!(messages.last(), Some(&LoadMessage::Finished { loaded: 3 }));
    }

    #[test]
    fn failures_end_the_load() {
        struct Broken;
        impl ItemSource for Broken {
            fn next_batch(&mut self) -> Result<Option<Vec<NewItem>>, LoadError> {
                Err(LoadError("unreadable report".into()))
            }
        }

        let mut loader = Loader::new();
        loader.start(Broken);
        let messages = drain_until_done(&mut loader);
        assert_eq!(
            messages,
            vec![LoadMessage::Failed(LoadError("unreadable report".into()))]
        );
        assert!(!loader.is_active());
    }

    #[test]
    fn stop_trigger_reaches_every_signal_clone() {
        let (signal, trigger) = StopSignal::new();
        let worker = signal.clone();
        assert!(!worker.is_stopped());
        trigger.stop();
        assert!(signal.is_stopped());
        assert!(worker.is_stopped());
    }
}
