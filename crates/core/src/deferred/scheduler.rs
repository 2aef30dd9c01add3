//! Retry timer abstraction.
//!
//! The deferred queue never sleeps itself. It asks a [`RetryScheduler`] to
//! arm a timer and expects the host to call back with the handle once the
//! timer fires. Two schedulers are provided:
//!
//! - [`ManualScheduler`] records armed timers and lets the caller fire them,
//!   which makes retry behaviour deterministic in tests and in hosts that
//!   own their event loop.
//! - [`TokioRetryScheduler`] sleeps on the tokio runtime and delivers a
//!   [`RetryTick`] on an mpsc channel.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Identifies one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Arms and cancels retry timers.
pub trait RetryScheduler {
    /// Arms a timer that fires once after `delay` for `portfolio_uuid`.
    fn schedule(&mut self, portfolio_uuid: &str, delay: Duration) -> TimerHandle;

    /// Cancels an armed timer. Cancelling a fired or unknown timer is a no-op.
    fn cancel(&mut self, handle: TimerHandle);
}

/// A timer armed on a [`ManualScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmedTimer {
    pub handle: TimerHandle,
    pub portfolio_uuid: String,
    pub delay: Duration,
}

/// Scheduler whose timers only fire when the caller says so.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    armed: BTreeMap<TimerHandle, ArmedTimer>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers currently armed, oldest first.
    pub fn armed(&self) -> Vec<ArmedTimer> {
        self.armed.values().cloned().collect()
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    /// Removes and returns every armed timer, as if they all elapsed.
    pub fn fire_all(&mut self) -> Vec<ArmedTimer> {
        std::mem::take(&mut self.armed).into_values().collect()
    }
}

impl RetryScheduler for ManualScheduler {
    fn schedule(&mut self, portfolio_uuid: &str, delay: Duration) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.armed.insert(
            handle,
            ArmedTimer {
                handle,
                portfolio_uuid: portfolio_uuid.to_string(),
                delay,
            },
        );
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.armed.remove(&handle);
    }
}

/// Delivered by [`TokioRetryScheduler`] when a timer elapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryTick {
    pub portfolio_uuid: String,
    pub handle: TimerHandle,
}

/// Scheduler backed by `tokio::time::sleep`.
///
/// Must be used from within a tokio runtime. The receiver returned by
/// [`TokioRetryScheduler::new`] belongs in the host's event loop, which feeds
/// each tick back into the engine.
pub struct TokioRetryScheduler {
    next_id: u64,
    tx: mpsc::UnboundedSender<RetryTick>,
    tasks: HashMap<TimerHandle, JoinHandle<()>>,
}

impl TokioRetryScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RetryTick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                next_id: 0,
                tx,
                tasks: HashMap::new(),
            },
            rx,
        )
    }

    /// Number of timers that have not fired yet.
    pub fn pending_count(&self) -> usize {
        self.tasks.values().filter(|task| !task.is_finished()).count()
    }
}

impl RetryScheduler for TokioRetryScheduler {
    fn schedule(&mut self, portfolio_uuid: &str, delay: Duration) -> TimerHandle {
        self.tasks.retain(|_, task| !task.is_finished());

        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        let tick = RetryTick {
            portfolio_uuid: portfolio_uuid.to_string(),
            handle,
        };
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(tick).is_err() {
                debug!("Retry tick dropped, receiver closed");
            }
        });
        self.tasks.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for TokioRetryScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
