//! Interpolation.
//!
//! The server sends full snapshots whenever the room changes. The client
//! renders at its own rate and eases every known player from its rendered
//! pose toward the last snapshot pose, one fixed smoothing step per frame.

use std::collections::BTreeMap;

use room_shared::{
    math::lerp_angle,
    net::Snapshot,
    player::{Pose, SessionId},
    render::{VisualBackend, VisualHandle},
};
use tracing::{debug, warn};

/// Client-side state for one player.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    /// Pose from the latest snapshot.
    pub target: Pose,
    /// Locally smoothed pose actually drawn.
    pub rendered: Pose,
    pub model_ref: String,
    /// `None` when the backend failed to spawn a visual.
    pub visual: Option<VisualHandle>,
}

impl RenderTarget {
    fn step(&mut self, alpha: f32) {
        self.rendered = Pose::new(
            self.rendered.position.lerp(self.target.position, alpha),
            lerp_angle(self.rendered.facing, self.target.facing, alpha),
        );
    }
}

pub struct ReconciliationEngine<V: VisualBackend> {
    visuals: V,
    smoothing: f32,
    targets: BTreeMap<SessionId, RenderTarget>,
}

impl<V: VisualBackend> ReconciliationEngine<V> {
    pub fn new(visuals: V, smoothing: f32) -> Self {
        Self {
            visuals,
            smoothing,
            targets: BTreeMap::new(),
        }
    }

    /// Brings the tracked set in line with `snapshot`.
    ///
    /// Departed ids are despawned first, new ids spawn at their snapshot
    /// pose, known ids only get a new target.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        let departed: Vec<SessionId> = self
            .targets
            .keys()
            .filter(|id| snapshot.get(**id).is_none())
            .copied()
            .collect();
        for id in departed {
            if let Some(gone) = self.targets.remove(&id) {
                if let Some(handle) = gone.visual {
                    self.visuals.despawn_visual(handle);
                }
                debug!(session = %id, "Player despawned");
            }
        }

        for (id, state) in &snapshot.players {
            let pose = state.pose();
            if let Some(existing) = self.targets.get_mut(id) {
                existing.target = pose;
                continue;
            }

            let visual = match self.visuals.spawn_visual(&state.model_ref, pose) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!(session = %id, model = %state.model_ref, error = %e, "Visual spawn failed");
                    None
                }
            };
            debug!(session = %id, model = %state.model_ref, "Player spawned");
            self.targets.insert(
                *id,
                RenderTarget {
                    target: pose,
                    rendered: pose,
                    model_ref: state.model_ref.clone(),
                    visual,
                },
            );
        }
    }

    /// One render frame: ease every rendered pose and push it to its visual.
    pub fn step_frame(&mut self) {
        for target in self.targets.values_mut() {
            target.step(self.smoothing);
            if let Some(handle) = target.visual {
                self.visuals.update_visual_pose(handle, target.rendered);
            }
        }
    }

    pub fn rendered_pose(&self, id: SessionId) -> Option<Pose> {
        self.targets.get(&id).map(|t| t.rendered)
    }

    pub fn target(&self, id: SessionId) -> Option<&RenderTarget> {
        self.targets.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.targets.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn visuals(&self) -> &V {
        &self.visuals
    }
}
