//! Room actor.
//!
//! A single task owns the `Room`. Connections talk to it through a bounded
//! command queue, so joins, leaves and intents are applied one at a time in
//! arrival order and no lock is ever held across network I/O. After every
//! mutation the actor publishes a fresh snapshot to the fan-out.

use std::sync::Arc;

use anyhow::Context;
use room_shared::{
    net::{RejectReason, Snapshot},
    player::{Intent, SessionId},
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    fanout::{SnapshotFanout, SnapshotFeed},
    room::{IntentOutcome, Room},
};

const COMMAND_QUEUE: usize = 1024;

pub enum RoomCommand {
    Join {
        reply: oneshot::Sender<Result<SessionId, RejectReason>>,
    },
    Leave {
        session: SessionId,
    },
    Intent {
        session: SessionId,
        intent: Intent,
    },
    Status {
        reply: oneshot::Sender<Vec<String>>,
    },
}

/// Cloneable handle to a running room actor.
#[derive(Clone)]
pub struct RoomHandle {
    name: Arc<str>,
    tx: mpsc::Sender<RoomCommand>,
    fanout: Arc<SnapshotFanout>,
}

impl RoomHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn join(&self) -> anyhow::Result<Result<SessionId, RejectReason>> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Join { reply }).await?;
        rx.await.context("room dropped join reply")
    }

    pub async fn leave(&self, session: SessionId) -> anyhow::Result<()> {
        self.send(RoomCommand::Leave { session }).await
    }

    pub async fn intent(&self, session: SessionId, intent: Intent) -> anyhow::Result<()> {
        self.send(RoomCommand::Intent { session, intent }).await
    }

    pub async fn status(&self) -> anyhow::Result<Vec<String>> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Status { reply }).await?;
        rx.await.context("room dropped status reply")
    }

    pub fn subscribe(&self) -> SnapshotFeed {
        self.fanout.subscribe()
    }

    /// Most recently published snapshot.
    pub fn latest_snapshot(&self) -> Arc<Snapshot> {
        self.fanout.latest()
    }

    async fn send(&self, cmd: RoomCommand) -> anyhow::Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| anyhow::anyhow!("room {} is closed", self.name))
    }
}

/// Starts the actor. It runs until every handle is dropped.
pub fn spawn_room(room: Room) -> (RoomHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
    let fanout = Arc::new(SnapshotFanout::new());
    let handle = RoomHandle {
        name: Arc::from(room.name()),
        tx,
        fanout: fanout.clone(),
    };
    let task = tokio::spawn(run_room(room, rx, fanout));
    (handle, task)
}

async fn run_room(mut room: Room, mut rx: mpsc::Receiver<RoomCommand>, fanout: Arc<SnapshotFanout>) {
    info!(room = %room.name(), capacity = room.settings().capacity, "Room open");

    while let Some(cmd) = rx.recv().await {
        let changed = match cmd {
            RoomCommand::Join { reply } => {
                let result = room.join();
                let ok = result.is_ok();
                // Published before the reply: the joiner's first snapshot includes itself.
                if ok {
                    fanout.broadcast_snapshot(room.snapshot());
                }
                if reply.send(result).is_err() {
                    debug!("Join reply receiver dropped");
                }
                false
            }
            RoomCommand::Leave { session } => room.leave(session),
            RoomCommand::Intent { session, intent } => {
                room.apply_intent(session, intent) == IntentOutcome::Moved
            }
            RoomCommand::Status { reply } => {
                let _ = reply.send(room.status());
                false
            }
        };

        if changed {
            fanout.broadcast_snapshot(room.snapshot());
        }
    }

    info!(room = %room.name(), "Room closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::RoomSettings;
    use room_shared::player::Axis;

    fn spawn(capacity: usize) -> RoomHandle {
        let room = Room::with_seed(
            RoomSettings {
                capacity,
                ..Default::default()
            },
            3,
        );
        spawn_room(room).0
    }

    #[tokio::test]
    async fn join_publishes_snapshot_with_joiner() -> anyhow::Result<()> {
        let room = spawn(4);
        let id = room.join().await?.expect("room has space");
        let mut feed = room.subscribe();
        let snap = feed.next().await.expect("snapshot");
        assert!(snap.get(id).is_some());
        Ok(())
    }

    #[tokio::test]
    async fn full_room_reply_is_rejection() -> anyhow::Result<()> {
        let room = spawn(1);
        room.join().await?.expect("first join");
        assert_eq!(room.join().await?, Err(RejectReason::RoomFull));
        assert_eq!(room.latest_snapshot().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn intents_after_leave_are_dropped() -> anyhow::Result<()> {
        let room = spawn(4);
        let a = room.join().await?.expect("join a");
        let b = room.join().await?.expect("join b");
        room.leave(a).await?;
        room.intent(a, Intent::new(Axis::Positive, Axis::Zero)).await?;

        // Status round-trips through the queue, so everything above is applied.
        let status = room.status().await?;
        assert_eq!(status[1], "Players: 1/4");

        let snap = room.latest_snapshot();
        assert!(snap.get(a).is_none());
        assert!(snap.get(b).is_some());
        Ok(())
    }

    #[tokio::test]
    async fn moving_intent_publishes_new_pose() -> anyhow::Result<()> {
        let room = spawn(4);
        let a = room.join().await?.expect("join");
        let before = room.latest_snapshot().get(a).expect("a").pose();

        room.intent(a, Intent::new(Axis::Positive, Axis::Zero)).await?;
        room.status().await?;

        let after = room.latest_snapshot().get(a).expect("a").pose();
        assert_ne!(before.position, after.position);
        Ok(())
    }
}
