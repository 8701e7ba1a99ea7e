//! Client implementation.
//!
//! The client maintains:
//! - One reliable stream to the room (join handshake, intents, snapshots)
//! - A reader task turning frames into inbound events
//! - The reconciliation engine and chase viewpoint, stepped every frame
//! - The intent sampler, stepped every sampling tick
//!
//! `run` is a single loop over inbound events, the two timers and a control
//! channel. Everything that touches the socket writer or the engine happens
//! inside that loop, so no operation is ever cancelled halfway.

use std::net::SocketAddr;

use anyhow::Context;
use room_shared::{
    config::RoomConfig,
    math::wrap_angle,
    net::{
        decode_from_bytes, FrameWriter, IntentSink, JoinError, NetMsg, ReliableConn,
        PROTOCOL_VERSION,
    },
    player::{Intent, SessionId},
    render::VisualBackend,
};
use tokio::{
    net::tcp::OwnedWriteHalf,
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{
    input::InputDevice,
    reconcile::ReconciliationEngine,
    sampler::IntentSampler,
    viewpoint::{Viewpoint, ViewpointFollower, ViewpointParams},
};

/// Frames between viewpoint log lines.
const VIEWPOINT_LOG_EVERY: u64 = 120;

/// Client connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// Joined and exchanging messages.
    Joined,
    /// Channel lost. Rendering continues toward the last known targets.
    Disconnected,
}

/// Requests from outside the run loop (e.g. the console).
#[derive(Debug)]
pub enum ClientControl {
    Status(oneshot::Sender<Vec<String>>),
    /// Sends a leave and stops the loop.
    Quit,
}

enum Inbound {
    Msg(NetMsg),
    Closed(Option<String>),
}

/// Samples `input` and, if the sampler decides to emit, sends the intent.
pub async fn send_sampled(
    sampler: &mut IntentSampler,
    input: &dyn InputDevice,
    sink: &mut dyn IntentSink,
) -> anyhow::Result<Option<Intent>> {
    match sampler.poll(input) {
        Some(intent) => {
            sink.send_intent(intent).await?;
            Ok(Some(intent))
        }
        None => Ok(None),
    }
}

/// High-level room client.
pub struct GameClient<V: VisualBackend> {
    pub session_id: SessionId,
    pub state: ClientState,
    cfg: RoomConfig,
    server: SocketAddr,

    writer: Option<FrameWriter<OwnedWriteHalf>>,
    inbound: mpsc::Receiver<Inbound>,
    reader_task: JoinHandle<()>,

    engine: ReconciliationEngine<V>,
    sampler: IntentSampler,
    viewpoint: ViewpointFollower,

    frames: u64,
    snapshots_applied: u64,
    intents_sent: u64,
}

impl<V: VisualBackend> GameClient<V> {
    /// Connects to the server and joins the configured room.
    ///
    /// A refusal comes back as a [`JoinError`] inside the `anyhow::Error`;
    /// use `downcast_ref::<JoinError>()` to tell a full room apart.
    pub async fn connect(cfg: &RoomConfig, visuals: V) -> anyhow::Result<Self> {
        let server: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        info!(server = %server, room = %cfg.room_name, "Connecting to server");

        let mut conn = ReliableConn::connect(server).await?;
        conn.send(&NetMsg::Join {
            protocol: PROTOCOL_VERSION,
            room: cfg.room_name.clone(),
        })
        .await?;

        let session_id = match conn.recv().await?.context("server closed during join")? {
            NetMsg::Joined { session_id } => session_id,
            NetMsg::JoinRejected { reason } => {
                warn!(%reason, "Join rejected");
                return Err(JoinError::Rejected(reason).into());
            }
            other => return Err(JoinError::UnexpectedReply(format!("{other:?}")).into()),
        };
        info!(session = %session_id, "Joined room");

        let (mut reader, writer) = conn.into_split();
        let (tx, inbound) = mpsc::channel(64);
        let reader_task = tokio::spawn(async move {
            let closed = loop {
                match reader.recv_frame().await {
                    Ok(Some(frame)) => match decode_from_bytes(&frame) {
                        Ok(msg) => {
                            if tx.send(Inbound::Msg(msg)).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!(error = %format!("{e:#}"), "Ignoring undecodable message"),
                    },
                    Ok(None) => break None,
                    Err(e) => break Some(format!("{e:#}")),
                }
            };
            let _ = tx.send(Inbound::Closed(closed)).await;
        });

        let sampler = IntentSampler::new(cfg.emit_policy);

        Ok(Self {
            session_id,
            state: ClientState::Joined,
            cfg: cfg.clone(),
            server,
            writer: Some(writer),
            inbound,
            reader_task,
            engine: ReconciliationEngine::new(visuals, cfg.smoothing),
            sampler,
            viewpoint: ViewpointFollower::new(ViewpointParams::from(cfg)),
            frames: 0,
            snapshots_applied: 0,
            intents_sent: 0,
        })
    }

    pub fn engine(&self) -> &ReconciliationEngine<V> {
        &self.engine
    }

    pub fn viewpoint(&self) -> Viewpoint {
        self.viewpoint.current()
    }

    /// Applies one inbound server message.
    pub fn handle_message(&mut self, msg: NetMsg) {
        match msg {
            NetMsg::Snapshot(snapshot) => {
                self.engine.apply_snapshot(&snapshot);
                self.snapshots_applied += 1;
            }
            other => {
                debug!(?other, "Unhandled server message");
            }
        }
    }

    /// Waits for the next inbound event and handles it.
    /// Returns `false` once the channel is gone.
    pub async fn recv_once(&mut self) -> bool {
        match self.inbound.recv().await {
            Some(Inbound::Msg(msg)) => {
                self.handle_message(msg);
                true
            }
            Some(Inbound::Closed(reason)) => {
                self.mark_disconnected(reason.as_deref());
                false
            }
            None => {
                self.mark_disconnected(None);
                false
            }
        }
    }

    /// One sampling tick. Returns the intent sent, if any.
    pub async fn sample_tick(&mut self, input: &dyn InputDevice) -> Option<Intent> {
        let writer = self.writer.as_mut()?;
        match send_sampled(&mut self.sampler, input, writer).await {
            Ok(sent) => {
                if sent.is_some() {
                    self.intents_sent += 1;
                }
                sent
            }
            Err(e) => {
                self.mark_disconnected(Some(&format!("{e:#}")));
                None
            }
        }
    }

    /// One render frame: interpolate everyone, then follow the local player.
    pub fn frame(&mut self) -> Option<Viewpoint> {
        self.engine.step_frame();
        self.frames += 1;
        let pose = self.engine.rendered_pose(self.session_id)?;
        let view = self.viewpoint.update(pose);
        if self.frames % VIEWPOINT_LOG_EVERY == 0 {
            debug!(
                eye_x = view.eye.x,
                eye_y = view.eye.y,
                eye_z = view.eye.z,
                x = pose.position.x,
                z = pose.position.z,
                "Viewpoint"
            );
        }
        Some(view)
    }

    /// Sends a leave and closes the write side. Idempotent.
    pub async fn leave(&mut self) -> anyhow::Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.send(&NetMsg::Leave).await?;
            let _ = writer.shutdown().await;
            info!(session = %self.session_id, "Left room");
        }
        Ok(())
    }

    /// Runs the sample/frame/receive loop until `Quit` or the control
    /// channel closes. Losing the server does not end the loop.
    pub async fn run(
        &mut self,
        input: &dyn InputDevice,
        mut control: mpsc::Receiver<ClientControl>,
    ) -> anyhow::Result<()> {
        let mut sample = tokio::time::interval(self.cfg.sample_interval());
        sample.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut frame = tokio::time::interval(self.cfg.frame_interval());
        frame.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                ev = self.inbound.recv(), if self.state == ClientState::Joined => {
                    match ev {
                        Some(Inbound::Msg(msg)) => self.handle_message(msg),
                        Some(Inbound::Closed(reason)) => self.mark_disconnected(reason.as_deref()),
                        None => self.mark_disconnected(None),
                    }
                }
                _ = sample.tick() => {
                    self.sample_tick(input).await;
                }
                _ = frame.tick() => {
                    self.frame();
                }
                ctl = control.recv() => {
                    match ctl {
                        Some(ClientControl::Status(reply)) => {
                            let _ = reply.send(self.status());
                        }
                        Some(ClientControl::Quit) | None => break,
                    }
                }
            }
        }

        if let Err(e) = self.leave().await {
            debug!(error = %format!("{e:#}"), "Leave not delivered");
        }
        Ok(())
    }

    /// Human-readable status lines for the client console.
    pub fn status(&self) -> Vec<String> {
        let mut out = vec![
            format!("State: {:?}", self.state),
            format!("Session: {}", self.session_id),
            format!("Server: {}", self.server),
            format!("Players tracked: {}", self.engine.len()),
            format!("Snapshots applied: {}", self.snapshots_applied),
            format!("Intents sent: {}", self.intents_sent),
        ];
        if let Some(pose) = self.engine.rendered_pose(self.session_id) {
            out.push(format!(
                "Rendered: pos=({:.2}, {:.2}, {:.2}) facing={:.2}",
                pose.position.x,
                pose.position.y,
                pose.position.z,
                wrap_angle(pose.facing)
            ));
        }
        let view = self.viewpoint.current();
        out.push(format!(
            "Viewpoint: eye=({:.2}, {:.2}, {:.2})",
            view.eye.x, view.eye.y, view.eye.z
        ));
        out
    }

    fn mark_disconnected(&mut self, reason: Option<&str>) {
        if self.state == ClientState::Disconnected {
            return;
        }
        match reason {
            Some(reason) => warn!(session = %self.session_id, %reason, "Connection lost"),
            None => info!(session = %self.session_id, "Server closed the connection"),
        }
        self.state = ClientState::Disconnected;
        self.writer = None;
    }
}

impl<V: VisualBackend> Drop for GameClient<V> {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Key, SharedInput};
    use async_trait::async_trait;
    use room_shared::{config::EmitPolicy, player::Axis};

    #[derive(Default)]
    struct Collect(Vec<Intent>);

    #[async_trait]
    impl IntentSink for Collect {
        async fn send_intent(&mut self, intent: Intent) -> anyhow::Result<()> {
            self.0.push(intent);
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl IntentSink for Broken {
        async fn send_intent(&mut self, _intent: Intent) -> anyhow::Result<()> {
            anyhow::bail!("channel closed")
        }
    }

    #[tokio::test]
    async fn sampled_intents_reach_the_sink() -> anyhow::Result<()> {
        let input = SharedInput::new();
        let mut sampler = IntentSampler::new(EmitPolicy::RepeatWhileActive);
        let mut sink = Collect::default();

        send_sampled(&mut sampler, &input, &mut sink).await?;
        input.press(Key::Left);
        send_sampled(&mut sampler, &input, &mut sink).await?;
        send_sampled(&mut sampler, &input, &mut sink).await?;
        input.release(Key::Left);
        send_sampled(&mut sampler, &input, &mut sink).await?;
        send_sampled(&mut sampler, &input, &mut sink).await?;

        let left = Intent::new(Axis::Zero, Axis::Positive);
        assert_eq!(sink.0, vec![Intent::IDLE, left, left, Intent::IDLE]);
        Ok(())
    }

    #[tokio::test]
    async fn sink_failure_is_reported() {
        let input = SharedInput::new();
        let mut sampler = IntentSampler::new(EmitPolicy::OnChange);
        assert!(send_sampled(&mut sampler, &input, &mut Broken).await.is_err());
    }
}
