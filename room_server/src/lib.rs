//! `room_server`
//!
//! Server-side systems:
//! - Authoritative room (session store, movement, admission)
//! - Room actor serializing all mutations
//! - Snapshot fan-out to connections
//! - TCP accept loop and per-connection tasks
//!
//! Networking model:
//! - One reliable, ordered TCP stream per client carries both the join
//!   handshake and gameplay traffic (intents in, snapshots out).

pub mod actor;
pub mod fanout;
pub mod room;
pub mod server;
pub mod store;

pub use actor::RoomHandle;
pub use room::{Room, RoomSettings};
pub use server::RoomServer;
