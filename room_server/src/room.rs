//! Authoritative room.
//!
//! The room is the sole writer of world state. It owns the session store,
//! applies the movement model to incoming intents and decides when the world
//! changed enough to broadcast.
//!
//! Determinism notes:
//! - Spawn positions come from a seedable RNG.
//! - Each intent is applied immediately and independently; there is no
//!   batching window, so arrival order is the only order that matters.

use rand::{rngs::StdRng, Rng, SeedableRng};
use room_shared::{
    config::{RoomConfig, MAX_SPAWN_HALF_EXTENT},
    math::{wrap_angle, Vec3},
    movement::{self, MovementParams},
    net::{RejectReason, Snapshot},
    player::{Intent, Player, Pose, SessionId},
};
use tracing::{debug, info};

use crate::store::SessionStore;

/// Fixed parameters of one room instance.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSettings {
    pub name: String,
    pub capacity: usize,
    pub spawn_half_extent: f32,
    pub initial_facing: f32,
    pub movement: MovementParams,
    pub catalog: Vec<String>,
}

impl From<&RoomConfig> for RoomSettings {
    fn from(cfg: &RoomConfig) -> Self {
        Self {
            name: cfg.room_name.clone(),
            capacity: cfg.max_clients,
            spawn_half_extent: cfg.spawn_half_extent,
            initial_facing: cfg.initial_facing,
            movement: cfg.movement(),
            catalog: cfg.model_catalog.clone(),
        }
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self::from(&RoomConfig::default())
    }
}

/// Result of handing an intent to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOutcome {
    /// The player's pose changed.
    Moved,
    /// Applied, but the pose is the same (idle intent).
    Unchanged,
    /// No such session (left, or never joined). Dropped.
    UnknownSession,
}

pub struct Room {
    settings: RoomSettings,
    store: SessionStore,
    next_id: u64,
    rng: StdRng,
}

impl Room {
    pub fn new(settings: RoomSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Room with reproducible spawn positions.
    pub fn with_seed(settings: RoomSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: RoomSettings, rng: StdRng) -> Self {
        Self {
            settings,
            store: SessionStore::new(),
            next_id: 1,
            rng,
        }
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn occupancy(&self) -> usize {
        self.store.len()
    }

    pub fn is_full(&self) -> bool {
        self.store.len() >= self.settings.capacity
    }

    pub fn player(&self, id: SessionId) -> Option<&Player> {
        self.store.get(id)
    }

    /// Admits a new session. A full room is refused before anything is allocated.
    pub fn join(&mut self) -> Result<SessionId, RejectReason> {
        if self.is_full() {
            info!(
                room = %self.settings.name,
                capacity = self.settings.capacity,
                "Join rejected, room full"
            );
            return Err(RejectReason::RoomFull);
        }

        let id = SessionId(self.next_id);
        self.next_id += 1;

        let model_ref = self.model_for_occupancy(self.store.len());
        let pose = Pose::new(self.spawn_position(), self.settings.initial_facing);
        let player = Player::new(id, pose, model_ref);

        info!(
            session = %id,
            x = pose.position.x,
            z = pose.position.z,
            model = %player.model_ref,
            "Player joined"
        );
        self.store.insert(player);
        Ok(id)
    }

    /// Removes a session. Returns whether it was present.
    pub fn leave(&mut self, id: SessionId) -> bool {
        match self.store.remove(id) {
            Some(_) => {
                info!(session = %id, remaining = self.store.len(), "Player left");
                true
            }
            None => false,
        }
    }

    pub fn apply_intent(&mut self, id: SessionId, intent: Intent) -> IntentOutcome {
        let params = self.settings.movement;
        let Some(player) = self.store.get_mut(id) else {
            debug!(session = %id, "Dropping intent for unknown session");
            return IntentOutcome::UnknownSession;
        };

        let next = movement::apply(player.pose, intent, &params);
        if next == player.pose {
            return IntentOutcome::Unchanged;
        }
        player.pose = next;
        IntentOutcome::Moved
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// Human-readable status lines for the server console.
    pub fn status(&self) -> Vec<String> {
        let mut out = Vec::new();
        out.push(format!("Room: {}", self.settings.name));
        out.push(format!(
            "Players: {}/{}",
            self.store.len(),
            self.settings.capacity
        ));
        if self.store.is_empty() {
            out.push("  (empty)".to_string());
        }
        for p in self.store.iter() {
            out.push(format!(
                "  {}: pos=({:.2}, {:.2}, {:.2}) facing={:.2} model={}",
                p.id,
                p.pose.position.x,
                p.pose.position.y,
                p.pose.position.z,
                wrap_angle(p.pose.facing),
                p.model_ref
            ));
        }
        out
    }

    fn model_for_occupancy(&self, occupancy: usize) -> String {
        let catalog = &self.settings.catalog;
        occupancy
            .checked_rem(catalog.len())
            .and_then(|i| catalog.get(i))
            .cloned()
            .unwrap_or_default()
    }

    fn spawn_position(&mut self) -> Vec3 {
        let h = self.settings.spawn_half_extent.min(MAX_SPAWN_HALF_EXTENT);
        if h.is_nan() || h <= 0.0 {
            return Vec3::ZERO;
        }
        Vec3::new(self.rng.gen_range(-h..h), 0.0, self.rng.gen_range(-h..h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use room_shared::player::Axis;

    fn room_with(capacity: usize) -> Room {
        Room::with_seed(
            RoomSettings {
                capacity,
                ..Default::default()
            },
            7,
        )
    }

    #[test]
    fn join_assigns_unique_ids_and_initial_facing() {
        let mut room = room_with(4);
        let a = room.join().unwrap();
        let b = room.join().unwrap();
        assert_ne!(a, b);
        let pa = room.player(a).unwrap();
        assert_eq!(pa.pose.facing, std::f32::consts::PI);
        assert_eq!(pa.pose.position.y, 0.0);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut room = room_with(1);
        let a = room.join().unwrap();
        assert!(room.leave(a));
        let b = room.join().unwrap();
        assert!(b > a);
    }

    #[test]
    fn full_room_rejects_without_allocating() {
        let mut room = room_with(2);
        room.join().unwrap();
        room.join().unwrap();
        assert_eq!(room.join(), Err(RejectReason::RoomFull));
        assert_eq!(room.occupancy(), 2);
        assert_eq!(room.snapshot().len(), 2);
    }

    #[test]
    fn thousand_joins_spawn_inside_bounds() {
        let mut room = room_with(4);
        let h = room.settings().spawn_half_extent;
        for _ in 0..1000 {
            let id = room.join().unwrap();
            let p = room.player(id).unwrap().pose.position;
            assert!(p.x >= -h && p.x < h, "x out of bounds: {}", p.x);
            assert!(p.z >= -h && p.z < h, "z out of bounds: {}", p.z);
            room.leave(id);
        }
    }

    #[test]
    fn models_are_round_robin_by_occupancy() {
        let catalog: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let mut room = Room::with_seed(
            RoomSettings {
                capacity: 10,
                catalog: catalog.clone(),
                ..Default::default()
            },
            1,
        );
        for k in 0..7 {
            let id = room.join().unwrap();
            assert_eq!(room.player(id).unwrap().model_ref, catalog[k % catalog.len()]);
        }
    }

    #[test]
    fn model_uses_occupancy_at_join_not_join_count() {
        let mut room = room_with(4);
        let a = room.join().unwrap();
        let _b = room.join().unwrap();
        room.leave(a);
        // Occupancy is back to 1, so the next join gets catalog[1] again.
        let c = room.join().unwrap();
        assert_eq!(room.player(c).unwrap().model_ref, "character-b.glb");
    }

    #[test]
    fn intent_for_departed_session_is_dropped() {
        let mut room = room_with(4);
        let a = room.join().unwrap();
        room.leave(a);
        let outcome = room.apply_intent(a, Intent::new(Axis::Positive, Axis::Zero));
        assert_eq!(outcome, IntentOutcome::UnknownSession);
        assert!(room.snapshot().is_empty());
    }

    #[test]
    fn idle_intent_is_unchanged() {
        let mut room = room_with(4);
        let a = room.join().unwrap();
        let before = room.player(a).unwrap().pose;
        for _ in 0..10 {
            assert_eq!(room.apply_intent(a, Intent::IDLE), IntentOutcome::Unchanged);
        }
        assert_eq!(room.player(a).unwrap().pose, before);
    }

    #[test]
    fn move_uses_own_facing_and_leaves_others_alone() {
        let mut room = room_with(4);
        let a = room.join().unwrap();
        let b = room.join().unwrap();
        let a0 = room.player(a).unwrap().pose;
        let b0 = room.player(b).unwrap().pose;

        let outcome = room.apply_intent(a, Intent::new(Axis::Positive, Axis::Zero));
        assert_eq!(outcome, IntentOutcome::Moved);

        let a1 = room.player(a).unwrap().pose;
        // Initial facing is PI: forward is -z.
        assert!((a1.position.z - (a0.position.z - 0.5)).abs() < 1e-4);
        assert!((a1.position.x - a0.position.x).abs() < 1e-4);
        assert_eq!(room.player(b).unwrap().pose, b0);
    }

    #[test]
    fn turn_ignores_magnitude() {
        use room_shared::net::IntentPayload;

        let mut room = room_with(4);
        let a = room.join().unwrap();
        let f0 = room.player(a).unwrap().pose.facing;

        let small = IntentPayload {
            move_axis: None,
            turn_axis: Some(0.01),
        };
        let large = IntentPayload {
            move_axis: None,
            turn_axis: Some(250.0),
        };
        room.apply_intent(a, small.to_intent());
        let f1 = room.player(a).unwrap().pose.facing;
        room.apply_intent(a, large.to_intent());
        let f2 = room.player(a).unwrap().pose.facing;

        let step = room.settings().movement.turn_speed;
        assert!((f1 - f0 - step).abs() < 1e-6);
        assert!((f2 - f1 - step).abs() < 1e-6);
    }

    #[test]
    fn status_lists_players() {
        let mut room = room_with(4);
        room.join().unwrap();
        let lines = room.status();
        assert_eq!(lines[0], "Room: my_room");
        assert_eq!(lines[1], "Players: 1/4");
        assert!(lines[2].contains("model=character-a.glb"));
    }

    #[test]
    fn status_marks_empty_room() {
        let room = room_with(4);
        assert_eq!(room.status(), vec!["Room: my_room", "Players: 0/4", "  (empty)"]);
    }

    #[test]
    fn oversized_spawn_extent_is_clamped() {
        let mut room = Room::with_seed(
            RoomSettings {
                spawn_half_extent: 3.0e38,
                ..Default::default()
            },
            11,
        );
        let id = room.join().unwrap();
        let pos = room.player(id).unwrap().pose.position;
        assert!(pos.is_finite());
        assert!(pos.x.abs() <= MAX_SPAWN_HALF_EXTENT && pos.z.abs() <= MAX_SPAWN_HALF_EXTENT);
    }

    #[test]
    fn nan_spawn_extent_spawns_at_origin() {
        let mut room = Room::with_seed(
            RoomSettings {
                spawn_half_extent: f32::NAN,
                ..Default::default()
            },
            3,
        );
        let id = room.join().unwrap();
        assert_eq!(room.player(id).unwrap().pose.position, Vec3::ZERO);
    }
}
