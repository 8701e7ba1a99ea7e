//! Server implementation.
//!
//! Hosts one named room. It supports:
//! - Join handshake with protocol and room-name checks
//! - Capacity-limited admission
//! - Per-connection intent intake
//! - Snapshot replication to every joined connection
//!
//! Each accepted connection gets a reader (this task) and a writer task.
//! The reader forwards intents to the room actor; the writer drains the
//! snapshot feed. Exactly one leave is issued per joined connection, on
//! whichever of EOF, read error or explicit `Leave` comes first.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use anyhow::Context;
use room_shared::{
    config::RoomConfig,
    net::{NetMsg, RejectReason, ReliableConn, ReliableListener, PROTOCOL_VERSION},
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    actor::{spawn_room, RoomHandle},
    room::{Room, RoomSettings},
};

/// How long a fresh connection may take to send its join request.
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Room server: listener plus the room actor it feeds.
pub struct RoomServer {
    pub cfg: RoomConfig,
    listener: ReliableListener,
    room: RoomHandle,
    room_task: JoinHandle<()>,
}

impl RoomServer {
    /// Binds the listener and starts the room.
    pub async fn bind(cfg: RoomConfig) -> anyhow::Result<Self> {
        cfg.validate().context("invalid config")?;
        let room = Room::new(RoomSettings::from(&cfg));
        Self::with_room(cfg, room).await
    }

    /// Binds with a caller-built room, e.g. one with a fixed spawn seed.
    pub async fn with_room(mut cfg: RoomConfig, room: Room) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        let listener = ReliableListener::bind(addr).await?;
        cfg.server_addr = listener.local_addr()?.to_string();

        let (room, room_task) = spawn_room(room);
        Ok(Self {
            cfg,
            listener,
            room,
            room_task,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn room(&self) -> &RoomHandle {
        &self.room
    }

    /// Accepts one connection and hands it to its own task.
    pub async fn accept_one(&self) -> anyhow::Result<JoinHandle<()>> {
        let conn = self.listener.accept().await?;
        let peer = conn.peer_addr();
        debug!(%peer, "Connection accepted");

        let room = self.room.clone();
        Ok(tokio::spawn(async move {
            if let Err(e) = serve_connection(conn, room).await {
                warn!(%peer, error = %format!("{e:#}"), "Connection ended with error");
            }
        }))
    }

    /// Accept loop. Runs until the listener fails permanently.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(addr = %self.cfg.server_addr, room = %self.room.name(), "Server accepting");
        loop {
            if let Err(e) = self.accept_one().await {
                warn!(error = %format!("{e:#}"), "Accept failed");
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }

    /// Stops the room actor. Connection tasks notice on their next command.
    pub fn shutdown(&self) {
        self.room_task.abort();
    }

    /// Executes a console command.
    pub async fn exec_console(&self, line: &str) -> anyhow::Result<Vec<String>> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(cmd) = tokens.first() else {
            return Ok(Vec::new());
        };

        match *cmd {
            "status" => {
                let mut out = vec![format!("Listening: {}", self.cfg.server_addr)];
                out.extend(self.room.status().await?);
                Ok(out)
            }
            "help" => Ok(vec![
                "status  - show room occupancy and players".to_string(),
                "quit    - shut down the server".to_string(),
            ]),
            other => Ok(vec![format!("Unknown command: {other}")]),
        }
    }
}

/// Handles one connection from handshake to leave.
pub async fn serve_connection(conn: ReliableConn, room: RoomHandle) -> anyhow::Result<()> {
    let peer = conn.peer_addr();
    let (mut reader, mut writer) = conn.into_split();

    let first = tokio::time::timeout(JOIN_TIMEOUT, reader.recv())
        .await
        .context("join timeout")??;

    let rejection = match first {
        None => {
            debug!(%peer, "Closed before joining");
            return Ok(());
        }
        Some(NetMsg::Join { protocol, .. }) if protocol != PROTOCOL_VERSION => {
            Some(RejectReason::ProtocolMismatch)
        }
        Some(NetMsg::Join { room: name, .. }) if name != room.name() => {
            Some(RejectReason::UnknownRoom)
        }
        Some(NetMsg::Join { .. }) => None,
        Some(other) => anyhow::bail!("expected join, got {other:?}"),
    };

    let joined = match rejection {
        Some(reason) => Err(reason),
        None => room.join().await?,
    };
    let session = match joined {
        Ok(id) => id,
        Err(reason) => {
            info!(%peer, %reason, "Join refused");
            writer.send(&NetMsg::JoinRejected { reason }).await?;
            let _ = writer.shutdown().await;
            return Ok(());
        }
    };

    if let Err(e) = writer.send(&NetMsg::Joined { session_id: session }).await {
        room.leave(session).await?;
        return Err(e.context("send joined"));
    }
    info!(%peer, %session, "Session started");

    let mut feed = room.subscribe();
    let writer_task = tokio::spawn(async move {
        while let Some(snapshot) = feed.next().await {
            if let Err(e) = writer.send(&NetMsg::Snapshot((*snapshot).clone())).await {
                debug!(%session, error = %e, "Snapshot writer stopped");
                break;
            }
        }
    });

    let reason = loop {
        match reader.recv().await {
            Ok(Some(NetMsg::Intent(payload))) => {
                if room.intent(session, payload.to_intent()).await.is_err() {
                    break "room closed";
                }
            }
            Ok(Some(NetMsg::Leave)) => break "leave",
            Ok(Some(other)) => {
                debug!(%session, msg = ?other, "Ignoring unexpected message");
            }
            Ok(None) => break "disconnect",
            Err(e) => {
                warn!(%session, error = %format!("{e:#}"), "Read failed");
                break "read error";
            }
        }
    };

    writer_task.abort();
    info!(%peer, %session, reason, "Session ended");
    room.leave(session).await
}

/// Helper for tests: bind to an ephemeral port on localhost.
pub async fn bind_ephemeral(cfg: RoomConfig) -> anyhow::Result<(RoomServer, RoomConfig)> {
    let cfg = RoomConfig {
        server_addr: format!("{}:{}", IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        ..cfg
    };
    let server = RoomServer::bind(cfg).await?;
    let cfg = server.cfg.clone();
    Ok((server, cfg))
}
