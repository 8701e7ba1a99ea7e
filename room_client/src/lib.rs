//! `room_client`
//!
//! Client-side systems:
//! - Connection management (join handshake, intent sending, snapshot intake)
//! - Input capture and intent sampling
//! - Reconciliation: easing every player toward the latest snapshot
//! - Chase viewpoint following the local player
//! - Text console for headless runs

pub mod client;
pub mod console;
pub mod input;
pub mod reconcile;
pub mod sampler;
pub mod viewpoint;

pub use client::GameClient;
