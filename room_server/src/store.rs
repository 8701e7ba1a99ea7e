//! Session store.
//!
//! Maps each joined session to its authoritative `Player`. Only the room
//! mutates it; iteration order is by session id so snapshots are stable.

use std::collections::BTreeMap;

use room_shared::{
    net::Snapshot,
    player::{Player, SessionId},
};

#[derive(Debug, Default)]
pub struct SessionStore {
    players: BTreeMap<SessionId, Player>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a player under its own id, replacing nothing: ids are unique.
    pub fn insert(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    pub fn remove(&mut self, id: SessionId) -> Option<Player> {
        self.players.remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Full-state copy for broadcasting.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            players: self
                .players
                .iter()
                .map(|(id, p)| (*id, p.state()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use room_shared::{math::Vec3, player::Pose};

    fn player(id: u64) -> Player {
        Player::new(
            SessionId(id),
            Pose::new(Vec3::new(id as f32, 0.0, 0.0), 0.0),
            format!("m{id}"),
        )
    }

    #[test]
    fn insert_get_remove() {
        let mut store = SessionStore::new();
        store.insert(player(1));
        store.insert(player(2));
        assert_eq!(store.len(), 2);
        assert!(store.contains(SessionId(1)));
        assert_eq!(store.get(SessionId(2)).unwrap().model_ref, "m2");

        assert!(store.remove(SessionId(1)).is_some());
        assert!(store.remove(SessionId(1)).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn snapshot_mirrors_store() {
        let mut store = SessionStore::new();
        store.insert(player(3));
        store.insert(player(1));
        let snap = store.snapshot();
        let ids: Vec<_> = snap.players.keys().copied().collect();
        assert_eq!(ids, vec![SessionId(1), SessionId(3)]);
        assert_eq!(snap.get(SessionId(3)).unwrap().position.x, 3.0);
    }
}
