//! Networking primitives.
//!
//! Goals:
//! - Provide the tagged message envelope exchanged between client and room.
//! - Provide a reliable, per-connection ordered framed channel (TCP).
//! - Keep serialization explicit and tolerant of partial intent payloads.
//!
//! Frames are a 4-byte big-endian length followed by a JSON payload.

use std::{collections::BTreeMap, fmt, net::SocketAddr};

use anyhow::Context;
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
};
use tracing::{debug, trace};

use crate::player::{Axis, Intent, PlayerState, SessionId};

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted frame payload.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// High-level message envelope: `{"kind": ..., "payload": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum NetMsg {
    // ─── Session lifecycle ───
    /// Client -> server: request entry to a named room.
    Join { protocol: u32, room: String },
    /// Server -> client: join accepted.
    Joined { session_id: SessionId },
    /// Server -> client: join refused; no state was allocated.
    JoinRejected { reason: RejectReason },
    /// Client -> server: leaving. Closing the connection is equivalent.
    Leave,

    // ─── Gameplay ───
    /// Client -> server: movement request for one sampling tick.
    Intent(IntentPayload),
    /// Server -> client: full authoritative state.
    Snapshot(Snapshot),
}

/// Why a join was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    RoomFull,
    UnknownRoom,
    ProtocolMismatch,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::RoomFull => f.write_str("room is full"),
            RejectReason::UnknownRoom => f.write_str("no such room"),
            RejectReason::ProtocolMismatch => f.write_str("protocol version mismatch"),
        }
    }
}

/// Join failure as surfaced to the caller of a client connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    /// The room refused the join.
    Rejected(RejectReason),
    /// The server answered with something other than a join reply.
    UnexpectedReply(String),
}

impl JoinError {
    pub fn is_room_full(&self) -> bool {
        matches!(self, JoinError::Rejected(RejectReason::RoomFull))
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::Rejected(reason) => write!(f, "join rejected: {reason}"),
            JoinError::UnexpectedReply(msg) => write!(f, "unexpected join reply: {msg}"),
        }
    }
}

impl std::error::Error for JoinError {}

/// Wire form of an intent.
///
/// Each axis is optional and independent. A field that is missing or not a
/// number decodes as `None` and is a no-op; the rest of the message still
/// applies.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IntentPayload {
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub move_axis: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub turn_axis: Option<f64>,
}

fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(value.as_f64())
}

impl IntentPayload {
    /// Validated intent: numbers reduce to their sign, anything else is zero.
    pub fn to_intent(self) -> Intent {
        Intent {
            move_axis: self.move_axis.map(Axis::from_f64).unwrap_or_default(),
            turn_axis: self.turn_axis.map(Axis::from_f64).unwrap_or_default(),
        }
    }
}

impl From<Intent> for IntentPayload {
    fn from(intent: Intent) -> Self {
        Self {
            move_axis: Some(intent.move_axis.sign() as f64),
            turn_axis: Some(intent.turn_axis.sign() as f64),
        }
    }
}

/// Whole-room state. Keyed by session id, ordered for stable iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub players: BTreeMap<SessionId, PlayerState>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, id: SessionId) -> Option<&PlayerState> {
        self.players.get(&id)
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<NetMsg> {
    serde_json::from_slice(b).context("deserialize")
}

/// Read side of a framed connection.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Receives one message. `Ok(None)` means the peer closed cleanly between frames.
    pub async fn recv(&mut self) -> anyhow::Result<Option<NetMsg>> {
        match self.recv_frame().await? {
            Some(payload) => decode_from_bytes(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Receives one raw frame payload without decoding it. A payload that
    /// fails to decode leaves the stream aligned on the next frame.
    pub async fn recv_frame(&mut self) -> anyhow::Result<Option<Bytes>> {
        let mut len_buf = [0u8; 4];
        match self.inner.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e).context("read frame len"),
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        anyhow::ensure!(len <= MAX_FRAME_LEN, "frame of {len} bytes exceeds limit");

        let mut payload = vec![0u8; len];
        self.inner
            .read_exact(&mut payload)
            .await
            .context("read frame payload")?;
        trace!(len, "Frame received");
        Ok(Some(Bytes::from(payload)))
    }
}

/// Write side of a framed connection.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        let payload = encode_to_bytes(msg)?;
        anyhow::ensure!(
            payload.len() <= MAX_FRAME_LEN,
            "frame of {} bytes exceeds limit",
            payload.len()
        );
        let mut buf = BytesMut::with_capacity(4 + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.extend_from_slice(&payload);
        self.inner.write_all(&buf).await.context("write frame")?;
        self.inner.flush().await.context("flush frame")?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.inner.shutdown().await.context("shutdown")
    }
}

/// Reliable connection over TCP with length-prefixed frames.
#[derive(Debug)]
pub struct ReliableConn {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    peer: SocketAddr,
}

impl ReliableConn {
    pub fn new(stream: TcpStream) -> anyhow::Result<Self> {
        let peer = stream.peer_addr().context("peer addr")?;
        stream.set_nodelay(true).context("set nodelay")?;
        let (read, write) = stream.into_split();
        Ok(Self {
            reader: FrameReader::new(read),
            writer: FrameWriter::new(write),
            peer,
        })
    }

    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await.context("tcp connect")?;
        debug!(%addr, "Connected");
        Self::new(stream)
    }

    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        self.writer.send(msg).await
    }

    pub async fn recv(&mut self) -> anyhow::Result<Option<NetMsg>> {
        self.reader.recv().await
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Splits into independently owned halves, e.g. for a reader and a writer task.
    pub fn into_split(self) -> (FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>) {
        (self.reader, self.writer)
    }
}

/// TCP server listener.
pub struct ReliableListener {
    listener: TcpListener,
}

impl ReliableListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        debug!(%addr, "Listener bound");
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<ReliableConn> {
        let (stream, _addr) = self.listener.accept().await.context("tcp accept")?;
        ReliableConn::new(stream)
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Client -> server half of the synchronization channel.
///
/// Fire-and-forget: an implementation returns once the intent is handed to
/// the transport, never waiting for the room to apply it.
#[async_trait]
pub trait IntentSink: Send {
    async fn send_intent(&mut self, intent: Intent) -> anyhow::Result<()>;
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> IntentSink for FrameWriter<W> {
    async fn send_intent(&mut self, intent: Intent) -> anyhow::Result<()> {
        self.send(&NetMsg::Intent(intent.into())).await
    }
}

#[async_trait]
impl IntentSink for ReliableConn {
    async fn send_intent(&mut self, intent: Intent) -> anyhow::Result<()> {
        self.writer.send_intent(intent).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{math::Vec3, player::SessionId};

    #[test]
    fn netmsg_roundtrip_bytes() {
        let msg = NetMsg::Join {
            protocol: PROTOCOL_VERSION,
            room: "my_room".into(),
        };
        let bytes = encode_to_bytes(&msg).unwrap();
        let back = decode_from_bytes(&bytes).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn envelope_is_kind_and_payload() {
        let json = serde_json::to_value(NetMsg::Joined {
            session_id: SessionId(3),
        })
        .unwrap();
        assert_eq!(json["kind"], "joined");
        assert_eq!(json["payload"]["session_id"], 3);

        let leave = serde_json::to_value(NetMsg::Leave).unwrap();
        assert_eq!(leave["kind"], "leave");
    }

    #[test]
    fn intent_with_wrong_field_type_keeps_other_axis() {
        let raw = br#"{"kind":"intent","payload":{"move_axis":"fast","turn_axis":-0.4}}"#;
        let NetMsg::Intent(payload) = decode_from_bytes(raw).unwrap() else {
            panic!("expected intent");
        };
        assert_eq!(payload.move_axis, None);
        let intent = payload.to_intent();
        assert_eq!(intent.move_axis, Axis::Zero);
        assert_eq!(intent.turn_axis, Axis::Negative);
    }

    #[test]
    fn intent_with_missing_fields_is_idle() {
        let raw = br#"{"kind":"intent","payload":{"extra":true}}"#;
        let NetMsg::Intent(payload) = decode_from_bytes(raw).unwrap() else {
            panic!("expected intent");
        };
        assert!(payload.to_intent().is_idle());

        let raw = br#"{"kind":"intent","payload":{"move_axis":null,"turn_axis":[1]}}"#;
        let NetMsg::Intent(payload) = decode_from_bytes(raw).unwrap() else {
            panic!("expected intent");
        };
        assert!(payload.to_intent().is_idle());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(decode_from_bytes(br#"{"kind":"teleport","payload":{}}"#).is_err());
    }

    #[test]
    fn snapshot_keys_are_session_ids() {
        let mut snap = Snapshot::default();
        snap.players.insert(
            SessionId(7),
            PlayerState {
                position: Vec3::new(1.0, 0.0, -1.0),
                facing: 3.5,
                model_ref: "character-b.glb".into(),
            },
        );
        let msg = NetMsg::Snapshot(snap.clone());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["payload"]["players"]["7"]["model_ref"], "character-b.glb");

        // Payload-first ordering forces serde to buffer the content.
        let reordered = format!(
            r#"{{"payload":{},"kind":"snapshot"}}"#,
            serde_json::to_string(&json["payload"]).unwrap()
        );
        assert_eq!(decode_from_bytes(reordered.as_bytes()).unwrap(), msg);
    }

    #[tokio::test]
    async fn frames_survive_a_duplex_pipe() -> anyhow::Result<()> {
        let (a, b) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(a);
        let mut reader = FrameReader::new(b);

        writer.send_intent(Intent::new(Axis::Positive, Axis::Zero)).await?;
        writer.send(&NetMsg::Leave).await?;
        drop(writer);

        let first = reader.recv().await?.expect("intent frame");
        let NetMsg::Intent(payload) = first else {
            panic!("expected intent, got {first:?}");
        };
        assert_eq!(payload.to_intent(), Intent::new(Axis::Positive, Axis::Zero));
        assert_eq!(reader.recv().await?, Some(NetMsg::Leave));
        assert_eq!(reader.recv().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_frame_is_refused() {
        let (mut a, b) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(b);
        a.write_all(&((MAX_FRAME_LEN as u32) + 1).to_be_bytes())
            .await
            .unwrap();
        assert!(reader.recv().await.is_err());
    }
}
