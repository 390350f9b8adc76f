//! Refresh Debouncer ("snooze alarm")
//!
//! Collapses a burst of record changes into one refresh signal. Every
//! `reset()` pushes the deadline out by the configured delay; the signal
//! fires once the deadline passes with no further reset. A single task owns
//! the timer, so firings are never duplicated or lost.

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

/// A quiescent point after one or more resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSignal {
    /// 1 for the first signal, incremented on every firing
    pub sequence: u64,
    /// Number of resets folded into this signal
    pub coalesced: usize,
}

pub struct RefreshDebouncer {
    resets: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
    delay: Duration,
}

impl RefreshDebouncer {
    /// Start the timer task on `runtime`. Signals arrive on the returned receiver.
    pub fn spawn(delay: Duration, runtime: &Handle) -> (Self, mpsc::UnboundedReceiver<RefreshSignal>) {
        let (reset_tx, reset_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let task = runtime.spawn(run(delay, reset_rx, signal_tx));
        (
            Self {
                resets: reset_tx,
                task,
                delay,
            },
            signal_rx,
        )
    }

    /// (Re)start the delay timer.
    pub fn reset(&self) {
        if self.resets.send(()).is_err() {
            debug!("Refresh debouncer stopped, reset dropped");
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for RefreshDebouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    delay: Duration,
    mut resets: mpsc::UnboundedReceiver<()>,
    signals: mpsc::UnboundedSender<RefreshSignal>,
) {
    let mut deadline: Option<Instant> = None;
    let mut pending = 0usize;
    let mut sequence = 0u64;

    loop {
        let armed = deadline;
        tokio::select! {
            reset = resets.recv() => match reset {
                Some(()) => {
                    pending += 1;
                    deadline = Some(Instant::now() + delay);
                    trace!(pending, "Refresh deadline pushed out");
                }
                None => break,
            },
            _ = sleep_until(armed.unwrap_or_else(Instant::now)), if armed.is_some() => {
                sequence += 1;
                let signal = RefreshSignal { sequence, coalesced: pending };
                debug!(sequence, coalesced = pending, "Refresh signal fired");
                deadline = None;
                pending = 0;
                if signals.send(signal).is_err() {
                    break;
                }
            }
        }
    }
}
