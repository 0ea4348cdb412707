//! Snapshot consumer: feeds the gauge board and, optionally, the store.

#![allow(missing_docs)]

use crossbeam_channel::Receiver;
use serde::Serialize;

use crate::live::gauge::GaugeBoard;
use crate::live::poller::{CancellationToken, LiveSnapshot};
use crate::store::SnapshotStore;

/// What the consumer did with the snapshots it received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub received: u64,
    pub saved: u64,
    pub save_failures: u64,
}

/// Drains snapshots until the poller hangs up.
pub struct LiveSession<'s> {
    board: GaugeBoard,
    store: Option<&'s SnapshotStore>,
    stats: SessionStats,
}

impl<'s> LiveSession<'s> {
    pub fn new(board: GaugeBoard) -> Self {
        Self {
            board,
            store: None,
            stats: SessionStats::default(),
        }
    }

    /// Persist every received snapshot to `store`.
    #[must_use]
    pub fn with_store(mut self, store: &'s SnapshotStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Apply one snapshot. The gauges update before the save, and a failed
    /// save is logged without interrupting the session.
    pub fn handle(&mut self, snapshot: &LiveSnapshot) {
        self.stats.received += 1;
        let updated = self.board.apply(&snapshot.payload);
        tracing::debug!(updated, "gauges refreshed");

        if let Some(store) = self.store {
            match store.append_snapshot(snapshot) {
                Ok(id) => {
                    self.stats.saved += 1;
                    tracing::trace!(id, "snapshot stored");
                }
                Err(error) => {
                    self.stats.save_failures += 1;
                    tracing::warn!(code = error.code(), %error, "storing snapshot failed");
                }
            }
        }
    }

    /// Consume `rx` to the end, calling `on_update` after each snapshot.
    ///
    /// The first `on_update` error cancels `token` so the poller winds down;
    /// whatever it still sends is discarded and the error is returned once
    /// the channel closes.
    pub fn drain<F, E>(
        &mut self,
        rx: &Receiver<LiveSnapshot>,
        token: &CancellationToken,
        mut on_update: F,
    ) -> Result<(), E>
    where
        F: FnMut(&LiveSnapshot, &GaugeBoard) -> Result<(), E>,
    {
        let mut failure = None;
        for snapshot in rx {
            if failure.is_some() {
                continue;
            }
            self.handle(&snapshot);
            if let Err(error) = on_update(&snapshot, &self.board) {
                tracing::debug!("snapshot output failed, stopping poller");
                token.cancel();
                failure = Some(error);
            }
        }
        failure.map_or(Ok(()), Err)
    }

    pub fn board(&self) -> &GaugeBoard {
        &self.board
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::gauge::default_gauges;
    use crate::live::poller::{PollLoop, PollSettings, SnapshotSource};
    use crossbeam_channel::bounded;
    use std::time::Duration;
    use serde_json::json;

    fn snapshot(val: &str) -> LiveSnapshot {
        LiveSnapshot::now(json!({"inverter": [[{"fld": "P_AC", "val": val}]]}))
    }

    #[test]
    fn view_only_session_updates_gauges() {
        let (tx, rx) = bounded(4);
        tx.send(snapshot("120")).unwrap();
        tx.send(snapshot("240")).unwrap();
        drop(tx);

        let mut session = LiveSession::new(GaugeBoard::new(&default_gauges()));
        let token = CancellationToken::new();
        let mut seen = Vec::new();
        let result: Result<(), ()> = session.drain(&rx, &token, |_, board| {
            seen.push(board.get("P_AC").unwrap().value);
            Ok(())
        });

        assert!(result.is_ok());
        assert!(!token.is_cancelled());
        assert_eq!(seen, vec![120.0, 240.0]);
        assert_eq!(session.stats().received, 2);
        assert_eq!(session.stats().saved, 0);
    }

    /// Always answers with the same payload.
    struct SteadySource;

    impl SnapshotSource for SteadySource {
        fn fetch(&mut self) -> crate::core::errors::Result<serde_json::Value> {
            Ok(json!({"inverter": [[{"fld": "P_AC", "val": "75"}]]}))
        }
    }

    #[test]
    fn output_failure_stops_unbounded_poller() {
        let token = CancellationToken::new();
        let poll = PollLoop::new(
            SteadySource,
            PollSettings {
                interval: Duration::from_millis(1),
                max_polls: None,
            },
            token.clone(),
        );
        let (rx, handle) = poll.spawn(1).unwrap();

        let mut session = LiveSession::new(GaugeBoard::new(&default_gauges()));
        let mut calls = 0;
        let result = session.drain(&rx, &token, |_, _| {
            calls += 1;
            Err("broken pipe")
        });

        assert_eq!(result, Err("broken pipe"));
        assert_eq!(calls, 1);
        assert!(token.is_cancelled());
        let stats = handle.join().unwrap();
        assert!(stats.attempts >= 1);
        assert_eq!(session.stats().received, 1);
    }

    #[test]
    fn saving_session_persists_every_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(&dir.path().join("live.sqlite")).unwrap();
        let mut session = LiveSession::new(GaugeBoard::new(&default_gauges())).with_store(&store);

        session.handle(&snapshot("1"));
        session.handle(&snapshot("N/A"));

        assert_eq!(session.stats().saved, 2);
        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(session.board().get("P_AC").unwrap().value, 0.0);
    }
}
