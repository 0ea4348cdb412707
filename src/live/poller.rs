//! Poll loop: fetch the live record at a fixed interval on a worker thread
//! and hand each snapshot to the consumer over a bounded channel.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use chrono::NaiveDateTime;
use crossbeam_channel::{Receiver, Sender, bounded};
use serde::Serialize;
use serde_json::Value;

use crate::core::errors::{Result, TachoError};
use crate::live::fetch::LiveClient;

/// Longest single sleep between cancellation checks.
const CANCEL_SLICE: Duration = Duration::from_millis(50);

// ──────────────────── cancellation ────────────────────

/// Shared stop flag, observed at the top of every poll iteration.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// The underlying flag, for registration with signal handlers.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

// ──────────────────── snapshots ────────────────────

/// One successfully fetched payload, stamped with local wall time.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSnapshot {
    pub captured_at: NaiveDateTime,
    pub payload: Value,
}

impl LiveSnapshot {
    pub fn now(payload: Value) -> Self {
        Self {
            captured_at: chrono::Local::now().naive_local(),
            payload,
        }
    }
}

/// Anything that can produce a live payload on demand.
pub trait SnapshotSource: Send {
    fn fetch(&mut self) -> Result<Value>;

    /// Name used in log lines.
    fn describe(&self) -> String {
        "snapshot source".to_string()
    }
}

impl SnapshotSource for LiveClient {
    fn fetch(&mut self) -> Result<Value> {
        LiveClient::fetch(self)
    }

    fn describe(&self) -> String {
        self.url().to_string()
    }
}

// ──────────────────── loop ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Stop after this many attempts; `None` runs until cancelled.
    pub max_polls: Option<u64>,
}

/// Counters returned when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    /// Set when the loop ended because the consumer went away.
    pub consumer_gone: bool,
}

pub struct PollLoop<S> {
    source: S,
    settings: PollSettings,
    token: CancellationToken,
}

impl<S: SnapshotSource> PollLoop<S> {
    pub fn new(source: S, settings: PollSettings, token: CancellationToken) -> Self {
        Self {
            source,
            settings,
            token,
        }
    }

    /// Run on the current thread until cancelled, bounded, or disconnected.
    ///
    /// Fetch failures are logged and skipped; there is no backoff.
    pub fn run(mut self, tx: &Sender<LiveSnapshot>) -> PollStats {
        let mut stats = PollStats::default();
        let source_name = self.source.describe();

        loop {
            if self.token.is_cancelled() {
                tracing::debug!(attempts = stats.attempts, "poll loop cancelled");
                break;
            }
            if self
                .settings
                .max_polls
                .is_some_and(|max| stats.attempts >= max)
            {
                break;
            }

            stats.attempts += 1;
            match self.source.fetch() {
                Ok(payload) => {
                    stats.successes += 1;
                    if tx.send(LiveSnapshot::now(payload)).is_err() {
                        tracing::debug!("snapshot consumer disconnected");
                        stats.consumer_gone = true;
                        break;
                    }
                }
                Err(error) => {
                    stats.failures += 1;
                    tracing::warn!(
                        source = %source_name,
                        code = error.code(),
                        %error,
                        "live fetch failed"
                    );
                }
            }

            let last = self
                .settings
                .max_polls
                .is_some_and(|max| stats.attempts >= max);
            if !last {
                sleep_cancellable(&self.token, self.settings.interval);
            }
        }

        stats
    }
}

impl<S: SnapshotSource + 'static> PollLoop<S> {
    /// Run on a named worker thread. The receiver yields snapshots until the
    /// loop exits and drops its sender.
    pub fn spawn(
        self,
        capacity: usize,
    ) -> Result<(Receiver<LiveSnapshot>, thread::JoinHandle<PollStats>)> {
        let (tx, rx) = bounded::<LiveSnapshot>(capacity.max(1));
        let handle = thread::Builder::new()
            .name("tacho-poller".to_string())
            .spawn(move || self.run(&tx))
            .map_err(|source| TachoError::Runtime {
                details: format!("failed to spawn poller thread: {source}"),
            })?;
        Ok((rx, handle))
    }
}

fn sleep_cancellable(token: &CancellationToken, total: Duration) {
    let mut remaining = total;
    while !remaining.is_zero() && !token.is_cancelled() {
        let slice = remaining.min(CANCEL_SLICE);
        thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}
