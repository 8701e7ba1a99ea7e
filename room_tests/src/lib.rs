//! Shared helpers for the socket-level tests.

use std::time::Duration;

use room_client::GameClient;
use room_server::{server::bind_ephemeral, RoomHandle};
use room_shared::{
    config::RoomConfig,
    player::Pose,
    render::{VisualBackend, VisualHandle},
};
use tokio::time::Instant;

/// Default budget for "this should happen soon" waits.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// Binds a server on an ephemeral loopback port and runs its accept loop in
/// the background. The returned config points clients at it.
pub async fn start_server(cfg: RoomConfig) -> anyhow::Result<(RoomHandle, RoomConfig)> {
    let (server, cfg) = bind_ephemeral(cfg).await?;
    let room = server.room().clone();
    tokio::spawn(async move { server.run().await });
    Ok((room, cfg))
}

/// Feeds inbound messages to `client` until `done` holds.
pub async fn pump_until<V, F>(client: &mut GameClient<V>, mut done: F) -> anyhow::Result<()>
where
    V: VisualBackend,
    F: FnMut(&GameClient<V>) -> bool,
{
    let deadline = Instant::now() + WAIT;
    loop {
        if done(client) {
            return Ok(());
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        anyhow::ensure!(!remaining.is_zero(), "condition not reached within {WAIT:?}");
        if let Ok(open) = tokio::time::timeout(remaining, client.recv_once()).await {
            if !open {
                anyhow::ensure!(done(client), "connection closed before condition held");
                return Ok(());
            }
        }
    }
}

/// Polls `check` until it holds or the wait budget runs out.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Visual backend that records every call for later assertions.
#[derive(Debug, Default)]
pub struct RecordingVisuals {
    next: u64,
    pub spawned: Vec<(VisualHandle, String)>,
    pub despawned: Vec<VisualHandle>,
    pub updates: usize,
}

impl RecordingVisuals {
    pub fn handle_for(&self, model_ref: &str) -> Option<VisualHandle> {
        self.spawned
            .iter()
            .find(|(_, m)| m == model_ref)
            .map(|(h, _)| *h)
    }
}

impl VisualBackend for RecordingVisuals {
    fn spawn_visual(&mut self, model_ref: &str, _initial: Pose) -> anyhow::Result<VisualHandle> {
        self.next += 1;
        let handle = VisualHandle(self.next);
        self.spawned.push((handle, model_ref.to_string()));
        Ok(handle)
    }

    fn update_visual_pose(&mut self, _handle: VisualHandle, _pose: Pose) {
        self.updates += 1;
    }

    fn despawn_visual(&mut self, handle: VisualHandle) {
        self.despawned.push(handle);
    }
}
