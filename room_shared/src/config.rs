//! Configuration system.
//!
//! Loads room configuration from JSON strings/files. Every field has a
//! default, so a partial file only overrides what it names.

use std::{path::Path, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::movement::MovementParams;

/// Largest spawn half-extent whose full width still fits in an `f32`.
pub const MAX_SPAWN_HALF_EXTENT: f32 = f32::MAX / 2.0;

/// How the intent sampler decides whether to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitPolicy {
    /// Emit only when the axis pair differs from the last emitted pair.
    OnChange,
    /// Emit while any axis is non-zero, plus once on the transition to idle.
    ///
    /// The room moves a player one fixed step per intent, so a held key only
    /// keeps moving the player if the intent keeps being sent.
    #[default]
    RepeatWhileActive,
}

/// Root configuration shared by client/server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Server listen / connect address, e.g. `127.0.0.1:2567`.
    pub server_addr: String,
    /// Name of the room instance clients ask to join.
    pub room_name: String,

    // ─── Room ───
    /// Maximum concurrent sessions.
    pub max_clients: usize,
    /// Spawn square half-extent around the origin.
    pub spawn_half_extent: f32,
    /// Facing given to every newly joined player.
    pub initial_facing: f32,
    pub move_speed: f32,
    pub turn_speed: f32,
    /// Model references handed out round-robin at join.
    pub model_catalog: Vec<String>,

    // ─── Client ───
    pub sample_interval_ms: u64,
    pub frame_interval_ms: u64,
    /// Per-frame smoothing factor for rendered poses and the viewpoint.
    pub smoothing: f32,
    pub emit_policy: EmitPolicy,
    pub camera_distance: f32,
    pub camera_height: f32,
    pub look_height: f32,
    /// Drag radius (pixels) that maps to full analog deflection.
    pub stick_radius: f32,
    pub stick_deadzone: f32,
}

fn default_catalog() -> Vec<String> {
    ('a'..='r')
        .map(|c| format!("character-{c}.glb"))
        .collect()
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:2567".to_string(),
            room_name: "my_room".to_string(),
            max_clients: 4,
            spawn_half_extent: 1.5,
            initial_facing: std::f32::consts::PI,
            move_speed: 0.5,
            turn_speed: std::f32::consts::PI / 16.0,
            model_catalog: default_catalog(),
            sample_interval_ms: 100,
            frame_interval_ms: 16,
            smoothing: 0.15,
            emit_policy: EmitPolicy::default(),
            camera_distance: 10.0,
            camera_height: 5.0,
            look_height: 1.0,
            stick_radius: 40.0,
            stick_deadzone: 0.2,
        }
    }
}

impl RoomConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg = Self::from_json_str(&text)
            .with_context(|| format!("parse config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects values the room or client cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.max_clients > 0, "max_clients must be at least 1");
        anyhow::ensure!(!self.model_catalog.is_empty(), "model_catalog is empty");
        anyhow::ensure!(
            (0.0..=MAX_SPAWN_HALF_EXTENT).contains(&self.spawn_half_extent),
            "spawn_half_extent must be in [0, {MAX_SPAWN_HALF_EXTENT}]"
        );
        anyhow::ensure!(self.move_speed.is_finite(), "move_speed must be finite");
        anyhow::ensure!(self.turn_speed.is_finite(), "turn_speed must be finite");
        anyhow::ensure!(self.initial_facing.is_finite(), "initial_facing must be finite");
        anyhow::ensure!(
            self.smoothing > 0.0 && self.smoothing <= 1.0,
            "smoothing must be in (0, 1]"
        );
        anyhow::ensure!(self.sample_interval_ms > 0, "sample_interval_ms must be positive");
        anyhow::ensure!(self.frame_interval_ms > 0, "frame_interval_ms must be positive");
        Ok(())
    }

    pub fn movement(&self) -> MovementParams {
        MovementParams {
            move_speed: self.move_speed,
            turn_speed: self.turn_speed,
        }
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}
