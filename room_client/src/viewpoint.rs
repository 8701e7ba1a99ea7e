//! Chase viewpoint.

use room_shared::{config::RoomConfig, math::Vec3, player::Pose};

/// Where the observer starts before the local player is known.
pub const INITIAL_EYE: Vec3 = Vec3::new(0.0, 10.0, 10.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewpointParams {
    /// Horizontal distance behind the player.
    pub distance: f32,
    /// Height above the player.
    pub height: f32,
    /// Height above the player's feet the observer looks at.
    pub look_height: f32,
    pub smoothing: f32,
}

impl From<&RoomConfig> for ViewpointParams {
    fn from(cfg: &RoomConfig) -> Self {
        Self {
            distance: cfg.camera_distance,
            height: cfg.camera_height,
            look_height: cfg.look_height,
            smoothing: cfg.smoothing,
        }
    }
}

impl Default for ViewpointParams {
    fn default() -> Self {
        Self::from(&RoomConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    pub eye: Vec3,
    pub look_at: Vec3,
}

#[derive(Debug, Clone)]
pub struct ViewpointFollower {
    params: ViewpointParams,
    current: Viewpoint,
}

impl ViewpointFollower {
    pub fn new(params: ViewpointParams) -> Self {
        Self {
            params,
            current: Viewpoint {
                eye: INITIAL_EYE,
                look_at: Vec3::ZERO,
            },
        }
    }

    pub fn current(&self) -> Viewpoint {
        self.current
    }

    /// The resting viewpoint behind `pose`.
    pub fn target_for(&self, pose: Pose) -> Viewpoint {
        let p = &self.params;
        Viewpoint {
            eye: pose.position - Vec3::forward(pose.facing) * p.distance
                + Vec3::new(0.0, p.height, 0.0),
            look_at: pose.position + Vec3::new(0.0, p.look_height, 0.0),
        }
    }

    /// Eases the eye toward the resting viewpoint; the look-at point snaps.
    pub fn update(&mut self, pose: Pose) -> Viewpoint {
        let target = self.target_for(pose);
        self.current = Viewpoint {
            eye: self.current.eye.lerp(target.eye, self.params.smoothing),
            look_at: target.look_at,
        };
        self.current
    }
}
