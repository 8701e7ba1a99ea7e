//! Snapshot fan-out.
//!
//! A latest-value slot: each connection's writer waits for the next
//! snapshot and sends it. A slow connection just skips snapshots that were
//! superseded while it was busy; nobody else waits on it.

use std::sync::Arc;

use room_shared::net::Snapshot;
use tokio::sync::watch;

pub struct SnapshotFanout {
    tx: watch::Sender<Arc<Snapshot>>,
}

impl SnapshotFanout {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Snapshot::default()));
        Self { tx }
    }

    /// Publishes `snapshot` to every subscriber. Never blocks.
    pub fn broadcast_snapshot(&self, snapshot: Snapshot) {
        self.tx.send_replace(Arc::new(snapshot));
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotFeed {
        SnapshotFeed {
            rx: self.tx.subscribe(),
            primed: false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SnapshotFanout {
    fn default() -> Self {
        Self::new()
    }
}

/// One subscriber's view of the fan-out.
pub struct SnapshotFeed {
    rx: watch::Receiver<Arc<Snapshot>>,
    primed: bool,
}

impl SnapshotFeed {
    /// The first call yields the current snapshot immediately; later calls
    /// wait for a newer one. `None` once the fan-out is gone.
    pub async fn next(&mut self) -> Option<Arc<Snapshot>> {
        if self.primed {
            self.rx.changed().await.ok()?;
        }
        self.primed = true;
        Some(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use room_shared::{
        math::Vec3,
        player::{PlayerState, SessionId},
    };
    use std::time::Duration;

    fn snap_with(n: u64) -> Snapshot {
        let mut s = Snapshot::default();
        for i in 1..=n {
            s.players.insert(
                SessionId(i),
                PlayerState {
                    position: Vec3::ZERO,
                    facing: 0.0,
                    model_ref: "m".into(),
                },
            );
        }
        s
    }

    #[tokio::test]
    async fn first_next_yields_current_state() {
        let fanout = SnapshotFanout::new();
        fanout.broadcast_snapshot(snap_with(2));
        let mut feed = fanout.subscribe();
        assert_eq!(feed.next().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn slow_subscriber_sees_only_latest() {
        let fanout = SnapshotFanout::new();
        let mut feed = fanout.subscribe();
        feed.next().await.unwrap();

        for n in 1..=5 {
            fanout.broadcast_snapshot(snap_with(n));
        }
        assert_eq!(feed.next().await.unwrap().len(), 5);

        let pending = tokio::time::timeout(Duration::from_millis(20), feed.next()).await;
        assert!(pending.is_err(), "no newer snapshot should be pending");
    }

    #[tokio::test]
    async fn feed_ends_when_fanout_dropped() {
        let fanout = SnapshotFanout::new();
        let mut feed = fanout.subscribe();
        feed.next().await.unwrap();
        drop(fanout);
        assert!(feed.next().await.is_none());
    }

    #[test]
    fn broadcast_without_subscribers_is_fine() {
        let fanout = SnapshotFanout::new();
        fanout.broadcast_snapshot(snap_with(1));
        assert_eq!(fanout.latest().len(), 1);
        assert_eq!(fanout.subscriber_count(), 0);
    }
}
